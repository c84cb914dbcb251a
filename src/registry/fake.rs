//! In-process registry used by unit tests.

use super::client::RemoteRegistry;
use super::schema::{
    AnswerSnippet, DocumentAnswer, DocumentRecord, ListFilter, QueryResponse, QuestionRequest,
    ThemeItem, ThemeResponse, UploadResult, UploadStatus,
};
use crate::error::{Error, Result};
use crate::file::{extension, LocalFile};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Files whose name contains this marker are rejected with `status: error`.
pub(crate) const REJECT_MARKER: &str = "reject";

#[derive(Default)]
pub(crate) struct FakeRegistry {
    pub docs: Mutex<Vec<DocumentRecord>>,
    pub next_id: AtomicUsize,
    pub fail_list: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_questions: AtomicBool,
    pub list_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub theme_calls: AtomicUsize,
    pub last_question: Mutex<Option<QuestionRequest>>,
    /// Cancelled while a `list` call is in flight.
    pub cancel_during_list: Mutex<Option<CancellationToken>>,
    /// Cancelled while a `delete` call is in flight.
    pub cancel_during_delete: Mutex<Option<CancellationToken>>,
}

impl FakeRegistry {
    pub fn with_docs(docs: Vec<DocumentRecord>) -> Self {
        let fake = Self::default();
        *fake.docs.lock() = docs;
        fake
    }

    pub fn record(doc_id: &str, filename: &str) -> DocumentRecord {
        DocumentRecord {
            doc_id: doc_id.into(),
            filename: filename.into(),
            doc_type: extension(filename),
            author: None,
            doc_date: None,
            upload_date: Utc::now(),
        }
    }

    pub fn doc_ids(&self) -> Vec<String> {
        self.docs.lock().iter().map(|d| d.doc_id.clone()).collect()
    }

    fn unavailable() -> Error {
        Error::Api {
            status: 503,
            detail: "Service unavailable".into(),
        }
    }
}

#[async_trait]
impl RemoteRegistry for FakeRegistry {
    async fn list(&self, _filter: &ListFilter) -> Result<Vec<DocumentRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let token = self.cancel_during_list.lock().clone();
        if let Some(token) = token {
            token.cancel();
        }
        tokio::task::yield_now().await;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.docs.lock().clone())
    }

    async fn upload(&self, files: &[LocalFile]) -> Result<Vec<UploadResult>> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            if file.filename.contains(REJECT_MARKER) {
                results.push(UploadResult {
                    doc_id: None,
                    filename: file.filename.clone(),
                    status: UploadStatus::Error,
                    detail: Some(format!("Extraction error for {}", file.filename)),
                });
                continue;
            }
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let doc_id = format!("d{n}");
            self.docs.lock().push(Self::record(&doc_id, &file.filename));
            results.push(UploadResult {
                doc_id: Some(doc_id),
                filename: file.filename.clone(),
                status: UploadStatus::Indexed,
                detail: Some("3 chunks indexed.".into()),
            });
        }
        Ok(results)
    }

    async fn delete(&self, doc_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let token = self.cancel_during_delete.lock().clone();
        if let Some(token) = token {
            token.cancel();
        }
        tokio::task::yield_now().await;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 500,
                detail: "Failed to delete embeddings from vector store.".into(),
            });
        }
        let mut docs = self.docs.lock();
        let before = docs.len();
        docs.retain(|d| d.doc_id != doc_id);
        if docs.len() == before {
            return Err(Error::NotFound {
                detail: format!("Document {doc_id} not found."),
            });
        }
        Ok(())
    }

    async fn query(&self, request: &QuestionRequest) -> Result<QueryResponse> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_question.lock() = Some(request.clone());
        tokio::task::yield_now().await;
        if self.fail_questions.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let scope = request.doc_ids.clone().unwrap_or_else(|| self.doc_ids());
        let individual_answers = scope
            .into_iter()
            .map(|doc_id| DocumentAnswer {
                answers: vec![AnswerSnippet {
                    text: format!("answer from {doc_id}"),
                    citation: format!("DocID: {doc_id}, Page: 1, Para: 1"),
                }],
                doc_id,
            })
            .collect();
        Ok(QueryResponse { individual_answers })
    }

    async fn theme(&self, request: &QuestionRequest) -> Result<ThemeResponse> {
        self.theme_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_question.lock() = Some(request.clone());
        tokio::task::yield_now().await;
        if self.fail_questions.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(ThemeResponse {
            themes: vec![ThemeItem {
                theme_name: "Theme 1 - Regulatory Non-Compliance".into(),
                summary: "Several documents report missed filings.".into(),
                citations: self.doc_ids().iter().map(|id| format!("{id}, Page 1")).collect(),
            }],
        })
    }
}
