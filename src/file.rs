//! Local file handles and the file kinds the service accepts.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Extensions the backend will ingest.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "txt", "png", "jpg", "jpeg"];

/// How a document is rendered in a preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Pdf,
    Image,
    Text,
    Other,
}

impl PreviewKind {
    pub fn from_mime(mime_type: &str) -> Self {
        match mime_type {
            "application/pdf" => PreviewKind::Pdf,
            t if t.starts_with("image/") => PreviewKind::Image,
            t if t.starts_with("text/") => PreviewKind::Text,
            _ => PreviewKind::Other,
        }
    }

    pub fn from_filename(filename: &str) -> Self {
        Self::from_mime(&guess_mime_type(filename))
    }
}

impl fmt::Display for PreviewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PreviewKind::Pdf => "pdf",
            PreviewKind::Image => "image",
            PreviewKind::Text => "text",
            PreviewKind::Other => "other",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for PreviewKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(PreviewKind::Pdf),
            "image" | "img" => Ok(PreviewKind::Image),
            "text" | "txt" => Ok(PreviewKind::Text),
            "other" => Ok(PreviewKind::Other),
            _ => Err(Error::UnsupportedFileKind(s.to_string())),
        }
    }
}

/// Lowercased extension without the dot, empty when there is none.
pub fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Guess MIME type from filename extension.
pub fn guess_mime_type(filename: &str) -> String {
    match extension(filename).as_str() {
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Backend rule: no empty names, no `..`, no absolute paths.
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() || filename.contains("..") || filename.starts_with('/') {
        return Err(Error::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

pub fn is_accepted_upload(filename: &str) -> bool {
    ACCEPTED_EXTENSIONS.contains(&extension(filename).as_str())
}

/// Decode a text document for rendering. Invalid UTF-8 is replaced, never rejected.
pub fn decode_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// A file picked by the user, held in memory for the lifetime of the session.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFile")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl LocalFile {
    /// Build a handle from bytes already in memory, enforcing the accepted kinds.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let filename = filename.into();
        validate_filename(&filename)?;
        if !is_accepted_upload(&filename) {
            return Err(Error::UnsupportedFileKind(filename));
        }
        let mime_type = guess_mime_type(&filename);
        Ok(Self {
            filename,
            mime_type,
            bytes: bytes.into(),
        })
    }

    /// Read a file from disk. Rejection happens before the bytes are read.
    pub async fn read(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidFilename(path.display().to_string()))?
            .to_string();
        validate_filename(&filename)?;
        if !is_accepted_upload(&filename) {
            return Err(Error::UnsupportedFileKind(filename));
        }
        let data = tokio::fs::read(path).await?;
        Self::new(filename, data)
    }

    pub fn kind(&self) -> PreviewKind {
        PreviewKind::from_mime(&self.mime_type)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
