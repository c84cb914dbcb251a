use thiserror::Error;

/// Result type alias for doclens operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used when turning an error into display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure, timeout or non-2xx response from the backend.
    Transport,
    /// The referenced document is absent remotely or locally.
    NotFound,
    /// The local blob cache failed to read or write.
    Storage,
    /// Rejected before any request was issued.
    InvalidInput,
    /// Configuration could not be loaded.
    Config,
}

#[derive(Debug, Error)]
pub enum Error {
    /// HTTP transport error (connect, timeout, body decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-2xx status.
    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// Backend reported the document as absent.
    #[error("{detail}")]
    NotFound { detail: String },

    /// Neither an in-memory handle nor a cached blob exists for this id.
    #[error("Document {0} is not available locally")]
    DocumentNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported file kind: {0} (accepted: .pdf, .txt, .png, .jpg, .jpeg)")]
    UnsupportedFileKind(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::Api { .. } | Error::Json(_) => ErrorKind::Transport,
            Error::NotFound { .. } | Error::DocumentNotFound(_) => ErrorKind::NotFound,
            Error::Storage(_) | Error::Io(_) | Error::Join(_) => ErrorKind::Storage,
            Error::UnsupportedFileKind(_) | Error::InvalidFilename(_) => ErrorKind::InvalidInput,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Message suitable for a banner. Backend-provided details are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Error::Api { detail, .. } | Error::NotFound { detail } => detail.clone(),
            Error::Http(e) if e.is_timeout() => "The server took too long to respond.".to_string(),
            Error::Http(e) if e.is_connect() => "Could not reach the server.".to_string(),
            other => other.to_string(),
        }
    }
}
