//! View-side state: the document list, the shared selection and the question views.
//!
//! Components here never let an error escape. Failures become a [`Notice`]
//! that the surface renders as a banner, and loading flags always reset.

pub mod orchestrator;
pub mod presenter;
pub mod selection;

pub use orchestrator::{AnswerView, QueryOrchestrator, QuestionOrchestrator, ThemeOrchestrator};
pub use presenter::{
    Confirm, DeleteOutcome, DocumentCachePresenter, DocumentEntry, LocalAvailability,
    UploadSummary,
};
pub use selection::{SelectionAction, SelectionCoordinator, SelectionState, SharedSelection};

use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A user-visible message produced by a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub kind: Option<ErrorKind>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            kind: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
            kind: None,
        }
    }

    pub fn error(context: &str, err: &Error) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: format!("{context}: {}", err.user_message()),
            kind: Some(err.kind()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}
