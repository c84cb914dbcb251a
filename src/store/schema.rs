use chrono::{DateTime, Utc};
use std::fmt;

/// Original bytes of an uploaded document, keyed by the backend-assigned id.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalBlobEntry {
    pub doc_id: String,
    pub filename: String,
    pub blob: Vec<u8>,
    pub upload_date: DateTime<Utc>,
}

impl fmt::Debug for LocalBlobEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBlobEntry")
            .field("doc_id", &self.doc_id)
            .field("filename", &self.filename)
            .field("len", &self.blob.len())
            .field("upload_date", &self.upload_date)
            .finish()
    }
}
