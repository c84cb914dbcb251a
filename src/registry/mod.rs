//! Client for the backend's document registry and question endpoints.

pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod schema;

pub use client::{HttpRegistry, RemoteRegistry};
pub use schema::{
    AnswerSnippet, DocumentAnswer, DocumentRecord, ListFilter, QueryResponse, QuestionRequest,
    ThemeItem, ThemeResponse, UploadResult, UploadStatus,
};
