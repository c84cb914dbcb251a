use super::selection::{SelectionAction, SharedSelection};
use super::Notice;
use crate::error::{Error, ErrorKind, Result};
use crate::file::{extension, LocalFile};
use crate::registry::{DocumentRecord, ListFilter, RemoteRegistry, UploadResult, UploadStatus};
use crate::store::{BlobStore, LocalBlobEntry};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where the bytes of a listed document can be found on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAvailability {
    /// Uploaded during this session; the file handle is still held.
    InMemory,
    Cached,
    Missing,
}

/// A row of the visible document list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub record: DocumentRecord,
    /// Derived from an upload response and not yet confirmed by a list refetch.
    pub provisional: bool,
    pub local: LocalAvailability,
}

/// Asks the user before a destructive call is issued.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The user declined; nothing was touched.
    Declined,
    Failed {
        kind: ErrorKind,
        message: String,
    },
    /// The view was torn down before the call settled.
    Discarded,
}

/// Per-file outcome of one upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub results: Vec<UploadResult>,
}

impl UploadSummary {
    fn count(&self, status: UploadStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn indexed(&self) -> usize {
        self.count(UploadStatus::Indexed)
    }

    pub fn failed(&self) -> usize {
        self.count(UploadStatus::Error)
    }

    pub fn skipped(&self) -> usize {
        self.count(UploadStatus::Skipped)
    }

    /// Some files indexed and some did not.
    pub fn is_partial(&self) -> bool {
        self.indexed() > 0 && self.indexed() < self.results.len()
    }

    pub fn describe(&self) -> String {
        format!(
            "{} indexed, {} failed, {} skipped",
            self.indexed(),
            self.failed(),
            self.skipped()
        )
    }
}

/// Keeps the visible document list in step with the backend registry and the
/// local blob cache.
///
/// The backend list is ground truth: every mutation ends with a refetch, and
/// entries derived locally are only provisional until then.
pub struct DocumentCachePresenter {
    registry: Arc<dyn RemoteRegistry>,
    store: Arc<dyn BlobStore>,
    selection: SharedSelection,
    filter: ListFilter,
    documents: Vec<DocumentEntry>,
    loading: bool,
    notice: Option<Notice>,
    mounted: CancellationToken,
}

impl DocumentCachePresenter {
    pub fn new(
        registry: Arc<dyn RemoteRegistry>,
        store: Arc<dyn BlobStore>,
        selection: SharedSelection,
    ) -> Self {
        Self {
            registry,
            store,
            selection,
            filter: ListFilter::default(),
            documents: Vec::new(),
            loading: false,
            notice: None,
            mounted: CancellationToken::new(),
        }
    }

    pub fn documents(&self) -> &[DocumentEntry] {
        &self.documents
    }

    pub fn document(&self, doc_id: &str) -> Option<&DocumentEntry> {
        self.documents.iter().find(|d| d.record.doc_id == doc_id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn selection(&self) -> &SharedSelection {
        &self.selection
    }

    pub fn set_filter(&mut self, filter: ListFilter) {
        self.filter = filter;
    }

    /// Token cancelled when the view goes away. Results settling afterwards are dropped.
    pub fn lifetime(&self) -> CancellationToken {
        self.mounted.clone()
    }

    pub fn unmount(&self) {
        self.mounted.cancel();
    }

    fn is_unmounted(&self) -> bool {
        self.mounted.is_cancelled()
    }

    /// Fetch the canonical list and replace the visible one with it.
    pub async fn load(&mut self) {
        self.loading = true;
        let result = self.registry.list(&self.filter).await;
        self.loading = false;
        if self.is_unmounted() {
            debug!("discarding document list for unmounted view");
            return;
        }

        match result {
            Ok(records) => self.apply_canonical(records).await,
            Err(e) => {
                warn!(error = %e, "failed to load document list");
                self.notice = Some(Notice::error("Failed to load documents", &e));
            }
        }
    }

    async fn apply_canonical(&mut self, records: Vec<DocumentRecord>) {
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let local = self.availability(&record.doc_id).await;
            entries.push(DocumentEntry {
                record,
                provisional: false,
                local,
            });
        }
        if self.is_unmounted() {
            return;
        }
        debug!(count = entries.len(), "reconciled document list");
        self.documents = entries;
        self.selection.lock().dispatch(SelectionAction::ListChanged);
    }

    async fn availability(&self, doc_id: &str) -> LocalAvailability {
        if self.selection.lock().file(doc_id).is_some() {
            return LocalAvailability::InMemory;
        }
        match self.store.contains(doc_id).await {
            Ok(true) => LocalAvailability::Cached,
            Ok(false) => LocalAvailability::Missing,
            Err(e) => {
                warn!(doc_id = %doc_id, error = %e, "blob cache lookup failed");
                LocalAvailability::Missing
            }
        }
    }

    /// Submit files to the backend and fold the results into the cache and list.
    pub async fn upload(&mut self, files: Vec<LocalFile>) -> Option<UploadSummary> {
        if files.is_empty() {
            self.notice = Some(Notice::info("No files selected."));
            return None;
        }

        self.loading = true;
        let result = self.registry.upload(&files).await;
        self.loading = false;
        if self.is_unmounted() {
            debug!("discarding upload results for unmounted view");
            return None;
        }

        match result {
            Ok(results) => Some(self.handle_upload_complete(&files, results).await),
            Err(e) => {
                warn!(error = %e, "upload failed");
                self.notice = Some(Notice::error("Upload failed", &e));
                None
            }
        }
    }

    /// Cache every indexed file under the id the backend assigned, show it
    /// immediately, then reconcile against the canonical list.
    pub async fn handle_upload_complete(
        &mut self,
        files: &[LocalFile],
        results: Vec<UploadResult>,
    ) -> UploadSummary {
        let mut storage_error: Option<Error> = None;

        for (idx, result) in results.iter().enumerate() {
            if result.status != UploadStatus::Indexed {
                debug!(filename = %result.filename, status = ?result.status, "not caching upload");
                continue;
            }
            let Some(doc_id) = result.doc_id.as_deref() else {
                continue;
            };
            // Results are order-preserving; fall back to a name match if counts drifted.
            let file = files
                .get(idx)
                .filter(|f| f.filename == result.filename)
                .or_else(|| files.iter().find(|f| f.filename == result.filename));
            let Some(file) = file else {
                warn!(doc_id = %doc_id, filename = %result.filename, "no local file for upload result");
                continue;
            };

            let upload_date = Utc::now();
            let entry = LocalBlobEntry {
                doc_id: doc_id.to_string(),
                filename: file.filename.clone(),
                blob: file.bytes.to_vec(),
                upload_date,
            };
            if let Err(e) = self.store.put(entry).await {
                warn!(doc_id = %doc_id, error = %e, "failed to cache uploaded bytes");
                storage_error.get_or_insert(e);
            }

            self.selection.lock().dispatch(SelectionAction::AttachFile {
                doc_id: doc_id.to_string(),
                file: file.clone(),
            });

            if self.document(doc_id).is_none() {
                self.documents.push(DocumentEntry {
                    record: DocumentRecord {
                        doc_id: doc_id.to_string(),
                        filename: file.filename.clone(),
                        doc_type: extension(&file.filename),
                        author: None,
                        doc_date: None,
                        upload_date,
                    },
                    provisional: true,
                    local: LocalAvailability::InMemory,
                });
            }
        }
        self.selection.lock().dispatch(SelectionAction::ListChanged);

        let summary = UploadSummary { results };
        info!(summary = %summary.describe(), "upload complete");
        self.notice = Some(match &storage_error {
            Some(e) => Notice::error("Uploaded, but the local cache could not be written", e),
            None if summary.indexed() == 0 => Notice {
                level: super::NoticeLevel::Error,
                message: format!("No files were indexed ({})", summary.describe()),
                kind: None,
            },
            None => Notice::success(format!("Upload finished: {}", summary.describe())),
        });

        self.load().await;
        summary
    }

    /// Delete a document remotely and locally, after the user confirms.
    pub async fn handle_delete(&mut self, doc_id: &str, confirm: &dyn Confirm) -> DeleteOutcome {
        let name = self
            .document(doc_id)
            .map(|d| d.record.filename.clone())
            .unwrap_or_else(|| doc_id.to_string());
        let prompt = format!("Delete \"{name}\" from the server and the local cache?");
        if !confirm.confirm(&prompt) {
            debug!(doc_id = %doc_id, "delete declined");
            return DeleteOutcome::Declined;
        }

        self.loading = true;
        let result = self.registry.delete(doc_id).await;
        self.loading = false;

        // Once the backend no longer knows the id, the local copy must go too,
        // whether or not the view is still around to show it.
        let gone_remotely = match &result {
            Ok(()) => true,
            Err(e) => e.kind() == ErrorKind::NotFound,
        };
        let eviction = if gone_remotely {
            self.evict(doc_id).await
        } else {
            Ok(())
        };

        if self.is_unmounted() {
            debug!(doc_id = %doc_id, "discarding delete result for unmounted view");
            return DeleteOutcome::Discarded;
        }

        if let Err(e) = result {
            warn!(doc_id = %doc_id, error = %e, "delete failed");
            let outcome = DeleteOutcome::Failed {
                kind: e.kind(),
                message: e.user_message(),
            };
            self.notice = Some(Notice::error("Delete failed", &e));
            if gone_remotely && self.document(doc_id).is_some() {
                self.documents.retain(|d| d.record.doc_id != doc_id);
                self.selection.lock().dispatch(SelectionAction::ListChanged);
            }
            return outcome;
        }

        self.notice = Some(match &eviction {
            Ok(()) => Notice::success(format!("Deleted {name}.")),
            Err(e) => Notice::error("Deleted, but the local cache could not be cleared", e),
        });
        self.selection.lock().dispatch(SelectionAction::ListChanged);
        self.documents.retain(|d| d.record.doc_id != doc_id);
        info!(doc_id = %doc_id, "document deleted");

        self.load().await;
        DeleteOutcome::Deleted
    }

    /// Drop the cached bytes and the in-memory handle for a document the backend no longer has.
    async fn evict(&self, doc_id: &str) -> Result<()> {
        self.selection
            .lock()
            .dispatch(SelectionAction::DetachFile(doc_id.to_string()));
        self.store.delete(doc_id).await.inspect_err(|e| {
            warn!(doc_id = %doc_id, error = %e, "failed to evict cached bytes");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fake::FakeRegistry;
    use crate::store::SqliteBlobStore;
    use crate::workspace::selection::SelectionCoordinator;
    use crate::workspace::NoticeLevel;
    use std::sync::atomic::Ordering;

    struct Harness {
        registry: Arc<FakeRegistry>,
        store: Arc<SqliteBlobStore>,
        selection: SharedSelection,
        presenter: DocumentCachePresenter,
    }

    fn harness(registry: FakeRegistry) -> Harness {
        let registry = Arc::new(registry);
        let store = Arc::new(SqliteBlobStore::open_in_memory().unwrap());
        let selection = SelectionCoordinator::shared();
        let presenter = DocumentCachePresenter::new(
            registry.clone(),
            store.clone(),
            selection.clone(),
        );
        Harness {
            registry,
            store,
            selection,
            presenter,
        }
    }

    fn file(name: &str, bytes: &[u8]) -> LocalFile {
        LocalFile::new(name, bytes.to_vec()).unwrap()
    }

    fn yes(_: &str) -> bool {
        true
    }

    fn no(_: &str) -> bool {
        false
    }

    fn visible_ids(p: &DocumentCachePresenter) -> Vec<String> {
        p.documents().iter().map(|d| d.record.doc_id.clone()).collect()
    }

    #[tokio::test]
    async fn upload_caches_bytes_under_assigned_id() {
        let mut h = harness(FakeRegistry::default());

        let summary = h
            .presenter
            .upload(vec![file("a.pdf", b"%PDF-1.7 body")])
            .await
            .unwrap();

        assert_eq!(summary.results[0].doc_id.as_deref(), Some("d1"));
        let cached = h.store.get("d1").await.unwrap().unwrap();
        assert_eq!(cached.blob, b"%PDF-1.7 body");
        assert_eq!(cached.filename, "a.pdf");

        let docs = h.presenter.documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].record.filename, "a.pdf");
        assert!(!docs[0].provisional);
        assert_eq!(docs[0].local, LocalAvailability::InMemory);
        assert!(!h.presenter.is_loading());
    }

    #[tokio::test]
    async fn partial_batch_caches_only_successes() {
        let mut h = harness(FakeRegistry::default());

        let summary = h
            .presenter
            .upload(vec![
                file("a.pdf", b"one"),
                file("reject.txt", b"two"),
                file("c.png", b"three"),
            ])
            .await
            .unwrap();

        assert_eq!(summary.results.len(), 3);
        assert!(summary.is_partial());
        assert_eq!(summary.indexed(), 2);
        assert_eq!(summary.failed(), 1);

        assert!(h.store.contains("d1").await.unwrap());
        assert!(h.store.contains("d2").await.unwrap());
        assert_eq!(visible_ids(&h.presenter), vec!["d1", "d2"]);
        assert!(h
            .presenter
            .documents()
            .iter()
            .all(|d| d.record.filename != "reject.txt"));
        assert_eq!(h.presenter.notice().unwrap().level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn failed_result_with_doc_id_is_not_cached() {
        let mut h = harness(FakeRegistry::default());
        let files = vec![file("a.pdf", b"x")];
        let results = vec![UploadResult {
            doc_id: Some("doc_dead".into()),
            filename: "a.pdf".into(),
            status: UploadStatus::Error,
            detail: Some("Indexing error".into()),
        }];

        let summary = h.presenter.handle_upload_complete(&files, results).await;

        assert_eq!(summary.indexed(), 0);
        assert!(!h.store.contains("doc_dead").await.unwrap());
        assert!(h.presenter.documents().is_empty());
        assert!(h.presenter.notice().unwrap().is_error());
    }

    #[tokio::test]
    async fn upload_then_delete_leaves_no_orphan() {
        let mut h = harness(FakeRegistry::default());
        h.presenter.upload(vec![file("a.pdf", b"bytes")]).await;
        assert!(h.store.contains("d1").await.unwrap());

        let outcome = h.presenter.handle_delete("d1", &yes).await;

        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(h.presenter.documents().is_empty());
        assert!(!h.store.contains("d1").await.unwrap());
        assert!(h.selection.lock().file("d1").is_none());
    }

    #[tokio::test]
    async fn declined_delete_changes_nothing() {
        let mut h = harness(FakeRegistry::default());
        h.presenter.upload(vec![file("a.pdf", b"bytes")]).await;
        h.selection.lock().toggle("d1");

        let outcome = h.presenter.handle_delete("d1", &no).await;

        assert_eq!(outcome, DeleteOutcome::Declined);
        assert_eq!(h.registry.delete_calls.load(Ordering::SeqCst), 0);
        assert_eq!(visible_ids(&h.presenter), vec!["d1"]);
        assert!(h.store.contains("d1").await.unwrap());
        assert!(h.selection.lock().state().is_selected("d1"));
    }

    async fn cache(store: &SqliteBlobStore, doc_id: &str, filename: &str, blob: &[u8]) {
        store
            .put(LocalBlobEntry {
                doc_id: doc_id.into(),
                filename: filename.into(),
                blob: blob.to_vec(),
                upload_date: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_of_missing_document_reports_detail_and_evicts_local_copy() {
        let mut h = harness(FakeRegistry::default());
        cache(&h.store, "gone", "x.txt", b"stale").await;
        cache(&h.store, "d7", "y.txt", b"keep").await;
        h.selection.lock().dispatch(SelectionAction::AttachFile {
            doc_id: "gone".into(),
            file: file("x.txt", b"stale"),
        });

        let outcome = h.presenter.handle_delete("gone", &yes).await;

        assert_eq!(
            outcome,
            DeleteOutcome::Failed {
                kind: ErrorKind::NotFound,
                message: "Document gone not found.".into(),
            }
        );
        let notice = h.presenter.notice().unwrap();
        assert!(notice.message.ends_with("Document gone not found."));
        assert!(!h.store.contains("gone").await.unwrap());
        assert!(h.selection.lock().file("gone").is_none());
        assert!(h.store.contains("d7").await.unwrap());
        assert!(!h.presenter.is_loading());

        let again = h.presenter.handle_delete("gone", &yes).await;
        assert!(matches!(again, DeleteOutcome::Failed { kind: ErrorKind::NotFound, .. }));
        assert!(!h.store.contains("gone").await.unwrap());
    }

    #[tokio::test]
    async fn unmount_during_delete_still_evicts_cached_bytes() {
        let registry = FakeRegistry::with_docs(vec![FakeRegistry::record("d1", "a.txt")]);
        let mut h = harness(registry);
        h.presenter.load().await;
        cache(&h.store, "d1", "a.txt", b"secret").await;
        *h.registry.cancel_during_delete.lock() = Some(h.presenter.lifetime());

        let outcome = h.presenter.handle_delete("d1", &yes).await;

        assert_eq!(outcome, DeleteOutcome::Discarded);
        assert!(h.registry.doc_ids().is_empty());
        assert!(!h.store.contains("d1").await.unwrap());
        assert!(h.selection.lock().file("d1").is_none());
        assert_eq!(visible_ids(&h.presenter), vec!["d1"]);
    }

    #[tokio::test]
    async fn failed_remote_delete_keeps_local_state() {
        let registry = FakeRegistry::with_docs(vec![FakeRegistry::record("d1", "a.txt")]);
        registry.fail_delete.store(true, Ordering::SeqCst);
        let mut h = harness(registry);
        h.presenter.load().await;
        h.store
            .put(LocalBlobEntry {
                doc_id: "d1".into(),
                filename: "a.txt".into(),
                blob: b"x".to_vec(),
                upload_date: Utc::now(),
            })
            .await
            .unwrap();

        let outcome = h.presenter.handle_delete("d1", &yes).await;

        assert!(matches!(outcome, DeleteOutcome::Failed { kind: ErrorKind::Transport, .. }));
        assert_eq!(visible_ids(&h.presenter), vec!["d1"]);
        assert!(h.store.contains("d1").await.unwrap());
    }

    #[tokio::test]
    async fn every_list_change_empties_selection() {
        let registry = FakeRegistry::with_docs(vec![
            FakeRegistry::record("d1", "a.txt"),
            FakeRegistry::record("d2", "b.txt"),
        ]);
        registry.next_id.store(10, Ordering::SeqCst);
        let mut h = harness(registry);

        h.selection.lock().set_selected(vec!["stale".into()]);
        h.presenter.load().await;
        assert!(h.selection.lock().state().is_empty());

        h.selection.lock().set_selected(vec!["d1".into()]);
        h.presenter.upload(vec![file("c.pdf", b"c")]).await;
        assert!(h.selection.lock().state().is_empty());

        h.selection.lock().set_selected(vec!["d2".into()]);
        h.presenter.handle_delete("d2", &yes).await;
        assert!(h.selection.lock().state().is_empty());
    }

    #[tokio::test]
    async fn load_reports_local_availability() {
        let registry = FakeRegistry::with_docs(vec![
            FakeRegistry::record("d1", "a.txt"),
            FakeRegistry::record("d2", "b.txt"),
        ]);
        let mut h = harness(registry);
        h.store
            .put(LocalBlobEntry {
                doc_id: "d1".into(),
                filename: "a.txt".into(),
                blob: b"x".to_vec(),
                upload_date: Utc::now(),
            })
            .await
            .unwrap();

        h.presenter.load().await;

        let local: Vec<_> = h.presenter.documents().iter().map(|d| d.local).collect();
        assert_eq!(local, vec![LocalAvailability::Cached, LocalAvailability::Missing]);
    }

    #[tokio::test]
    async fn failed_load_surfaces_notice_and_resets_loading() {
        let registry = FakeRegistry::default();
        registry.fail_list.store(true, Ordering::SeqCst);
        let mut h = harness(registry);

        h.presenter.load().await;

        assert!(!h.presenter.is_loading());
        let notice = h.presenter.notice().unwrap();
        assert_eq!(notice.kind, Some(ErrorKind::Transport));
        assert!(notice.message.contains("Service unavailable"));
    }

    #[tokio::test]
    async fn failed_reconcile_keeps_provisional_entries() {
        let mut h = harness(FakeRegistry::default());
        h.registry.fail_list.store(true, Ordering::SeqCst);

        h.presenter.upload(vec![file("a.pdf", b"x")]).await;

        let docs = h.presenter.documents();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].provisional);
        assert!(h.presenter.notice().unwrap().is_error());
    }

    #[tokio::test]
    async fn results_after_unmount_are_discarded() {
        let registry = FakeRegistry::with_docs(vec![FakeRegistry::record("d1", "a.txt")]);
        let mut h = harness(registry);
        *h.registry.cancel_during_list.lock() = Some(h.presenter.lifetime());
        h.selection.lock().toggle("d1");

        h.presenter.load().await;

        assert!(h.presenter.documents().is_empty());
        assert!(h.presenter.notice().is_none());
        assert!(h.selection.lock().state().is_selected("d1"));
    }

    #[tokio::test]
    async fn empty_upload_issues_no_request() {
        let mut h = harness(FakeRegistry::default());
        assert!(h.presenter.upload(Vec::new()).await.is_none());
        assert_eq!(h.registry.upload_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.presenter.notice().unwrap().level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn upload_list_preview_close_share_one_selection() {
        use crate::file::PreviewKind;
        use crate::preview::{ObjectUrlRegistry, PreviewState, PreviewViewer};

        let mut h = harness(FakeRegistry::default());
        let urls = ObjectUrlRegistry::new();
        let mut viewer = PreviewViewer::new(h.store.clone(), h.selection.clone(), urls.clone());

        h.presenter.upload(vec![file("a.pdf", b"%PDF-1.4 report")]).await;

        let cached = h.store.get("d1").await.unwrap().unwrap();
        assert_eq!(cached.filename, "a.pdf");
        assert_eq!(cached.blob, b"%PDF-1.4 report");

        let docs = h.presenter.documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].record.doc_id, "d1");
        assert_eq!(docs[0].record.filename, "a.pdf");

        let uri = match viewer.open("d1", PreviewKind::Pdf).await {
            PreviewState::Ready(session) => {
                assert_eq!(session.kind, PreviewKind::Pdf);
                assert_eq!(session.filename, "a.pdf");
                session.uri().to_string()
            }
            other => panic!("expected a ready preview, got {other:?}"),
        };
        let (mime, bytes) = urls.resolve(&uri).unwrap();
        assert_eq!(mime, "application/pdf");
        assert_eq!(&*bytes, b"%PDF-1.4 report");

        viewer.close();

        assert!(viewer.state().is_closed());
        assert!(!urls.is_live(&uri));
        assert_eq!(urls.minted(), 1);
        assert_eq!(urls.revoked(), 1);
    }
}
