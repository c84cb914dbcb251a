use super::object_url::{ObjectUrl, ObjectUrlRegistry};
use crate::error::{Error, ErrorKind, Result};
use crate::file::{decode_text, guess_mime_type, PreviewKind};
use crate::store::{BlobStore, LocalBlobEntry};
use crate::workspace::SharedSelection;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A live preview. Dropping it revokes its URI.
#[derive(Debug)]
pub struct PreviewSession {
    pub doc_id: String,
    pub filename: String,
    pub kind: PreviewKind,
    uri: ObjectUrl,
    text: Option<String>,
}

impl PreviewSession {
    pub fn uri(&self) -> &str {
        self.uri.as_str()
    }

    /// Decoded content, only present for text previews.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn data_uri(&self) -> Option<String> {
        self.uri.data_uri()
    }
}

#[derive(Debug)]
pub enum PreviewState {
    Closed,
    Opening {
        doc_id: String,
        kind: PreviewKind,
    },
    Ready(PreviewSession),
    Failed {
        doc_id: String,
        kind: PreviewKind,
        error_kind: ErrorKind,
        message: String,
    },
}

impl PreviewState {
    pub fn is_closed(&self) -> bool {
        matches!(self, PreviewState::Closed)
    }

    /// Document this state refers to, if any.
    pub fn doc_id(&self) -> Option<&str> {
        match self {
            PreviewState::Closed => None,
            PreviewState::Opening { doc_id, .. } | PreviewState::Failed { doc_id, .. } => {
                Some(doc_id.as_str())
            }
            PreviewState::Ready(session) => Some(session.doc_id.as_str()),
        }
    }

    pub fn session(&self) -> Option<&PreviewSession> {
        match self {
            PreviewState::Ready(session) => Some(session),
            _ => None,
        }
    }
}

/// Keys a preview surface forwards to its viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Char(char),
}

/// Opens previews and guarantees each one's URI is released on every exit.
pub struct PreviewViewer {
    store: Arc<dyn BlobStore>,
    selection: SharedSelection,
    urls: ObjectUrlRegistry,
    state: PreviewState,
    mounted: CancellationToken,
}

impl PreviewViewer {
    pub fn new(
        store: Arc<dyn BlobStore>,
        selection: SharedSelection,
        urls: ObjectUrlRegistry,
    ) -> Self {
        Self {
            store,
            selection,
            urls,
            state: PreviewState::Closed,
            mounted: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn lifetime(&self) -> CancellationToken {
        self.mounted.clone()
    }

    /// Open `doc_id` as `kind`. Reopening the preview that is already shown is a no-op;
    /// anything else tears the current session down first.
    pub async fn open(&mut self, doc_id: &str, kind: PreviewKind) -> &PreviewState {
        let already_open = matches!(
            &self.state,
            PreviewState::Ready(session) if session.doc_id == doc_id && session.kind == kind
        );
        if already_open {
            return &self.state;
        }

        self.teardown();
        self.state = PreviewState::Opening {
            doc_id: doc_id.to_string(),
            kind,
        };

        let resolved = self.resolve(doc_id).await;
        if self.mounted.is_cancelled() {
            debug!(doc_id = %doc_id, "preview resolved after teardown; discarding");
            self.state = PreviewState::Closed;
            return &self.state;
        }

        self.state = match resolved {
            Ok((filename, bytes)) => {
                let text = (kind == PreviewKind::Text).then(|| decode_text(&bytes));
                let uri = self.urls.mint(bytes, &guess_mime_type(&filename));
                info!(doc_id = %doc_id, %kind, uri = %uri.as_str(), "preview ready");
                PreviewState::Ready(PreviewSession {
                    doc_id: doc_id.to_string(),
                    filename,
                    kind,
                    uri,
                    text,
                })
            }
            Err(e) => {
                warn!(doc_id = %doc_id, error = %e, "preview failed");
                PreviewState::Failed {
                    doc_id: doc_id.to_string(),
                    kind,
                    error_kind: e.kind(),
                    message: e.user_message(),
                }
            }
        };
        &self.state
    }

    /// Open whichever document is selected, if exactly one is.
    pub async fn open_selected(&mut self, kind: Option<PreviewKind>) -> Option<&PreviewState> {
        let doc_id = self.selection.lock().single_selected()?;
        let kind = match kind {
            Some(kind) => kind,
            None => self.infer_kind(&doc_id).await,
        };
        Some(self.open(&doc_id, kind).await)
    }

    async fn infer_kind(&self, doc_id: &str) -> PreviewKind {
        let handle = self.selection.lock().file(doc_id);
        if let Some(file) = handle {
            return file.kind();
        }
        match self.store.get(doc_id).await {
            Ok(Some(entry)) => PreviewKind::from_filename(&entry.filename),
            _ => PreviewKind::Other,
        }
    }

    pub fn close(&mut self) {
        if !self.state.is_closed() {
            debug!("closing preview");
        }
        self.teardown();
    }

    /// Close the preview if it shows `doc_id`. Called once the document is deleted.
    pub fn forget(&mut self, doc_id: &str) -> bool {
        if self.state.doc_id() != Some(doc_id) {
            return false;
        }
        debug!(doc_id = %doc_id, "closing preview of deleted document");
        self.teardown();
        true
    }

    /// Escape dismisses the preview exactly like closing it.
    pub fn handle_key(&mut self, key: Key) -> bool {
        if key == Key::Escape {
            self.close();
            return true;
        }
        false
    }

    /// Tear down for good. Anything still resolving is discarded.
    pub fn unmount(&mut self) {
        self.mounted.cancel();
        self.teardown();
    }

    // Replacing the state drops any session, which revokes its URI and
    // clears the text buffer and error with it.
    fn teardown(&mut self) {
        self.state = PreviewState::Closed;
    }

    /// In-memory handle first, then the blob cache.
    async fn resolve(&self, doc_id: &str) -> Result<(String, Arc<[u8]>)> {
        let handle = self.selection.lock().file(doc_id);
        if let Some(file) = handle {
            self.backfill(doc_id, &file.filename, &file.bytes).await;
            return Ok((file.filename, file.bytes));
        }

        match self.store.get(doc_id).await? {
            Some(entry) => Ok((entry.filename, Arc::from(entry.blob))),
            None => Err(Error::DocumentNotFound(doc_id.to_string())),
        }
    }

    async fn backfill(&self, doc_id: &str, filename: &str, bytes: &[u8]) {
        match self.store.contains(doc_id).await {
            Ok(true) => {}
            Ok(false) => {
                let entry = LocalBlobEntry {
                    doc_id: doc_id.to_string(),
                    filename: filename.to_string(),
                    blob: bytes.to_vec(),
                    upload_date: Utc::now(),
                };
                if let Err(e) = self.store.put(entry).await {
                    warn!(doc_id = %doc_id, error = %e, "could not backfill blob cache");
                }
            }
            Err(e) => warn!(doc_id = %doc_id, error = %e, "blob cache lookup failed"),
        }
    }
}

impl Drop for PreviewViewer {
    fn drop(&mut self) {
        self.teardown();
    }
}
