//! Document previews backed by ephemeral object URIs.

pub mod object_url;
pub mod viewer;

pub use object_url::{ObjectUrl, ObjectUrlRegistry};
pub use viewer::{Key, PreviewSession, PreviewState, PreviewViewer};
