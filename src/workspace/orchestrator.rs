use crate::error::Result;
use crate::registry::{QueryResponse, QuestionRequest, RemoteRegistry, ThemeResponse};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What a question view renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerView<T> {
    Idle,
    Loading,
    Ready(T),
    /// Uniform placeholder; details go to the log.
    Failed(String),
}

/// A backend endpoint that answers a question.
#[async_trait]
pub trait QuestionEndpoint: Send + Sync + 'static {
    type Output: Clone + Send + 'static;

    /// Placeholder shown when the request fails for any reason.
    const FAILURE: &'static str;

    async fn ask(registry: &dyn RemoteRegistry, request: &QuestionRequest) -> Result<Self::Output>;
}

pub struct Query;
pub struct Theme;

#[async_trait]
impl QuestionEndpoint for Query {
    type Output = QueryResponse;
    const FAILURE: &'static str = "Error fetching answers.";

    async fn ask(registry: &dyn RemoteRegistry, request: &QuestionRequest) -> Result<QueryResponse> {
        registry.query(request).await
    }
}

#[async_trait]
impl QuestionEndpoint for Theme {
    type Output = ThemeResponse;
    const FAILURE: &'static str = "Error generating themes.";

    async fn ask(registry: &dyn RemoteRegistry, request: &QuestionRequest) -> Result<ThemeResponse> {
        registry.theme(request).await
    }
}

/// One question in flight at a time. Nothing is cached and nothing is retried.
pub struct QuestionOrchestrator<E: QuestionEndpoint> {
    registry: Arc<dyn RemoteRegistry>,
    top_k_per_doc: u32,
    input: String,
    loading: bool,
    view: AnswerView<E::Output>,
    mounted: CancellationToken,
    _endpoint: PhantomData<E>,
}

pub type QueryOrchestrator = QuestionOrchestrator<Query>;
pub type ThemeOrchestrator = QuestionOrchestrator<Theme>;

impl<E: QuestionEndpoint> QuestionOrchestrator<E> {
    pub fn new(registry: Arc<dyn RemoteRegistry>, top_k_per_doc: u32) -> Self {
        Self {
            registry,
            top_k_per_doc,
            input: String::new(),
            loading: false,
            view: AnswerView::Idle,
            mounted: CancellationToken::new(),
            _endpoint: PhantomData,
        }
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn view(&self) -> &AnswerView<E::Output> {
        &self.view
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> bool {
        !self.loading && !self.input.trim().is_empty()
    }

    pub fn lifetime(&self) -> CancellationToken {
        self.mounted.clone()
    }

    /// Send the current input. The input is drained before the request goes out.
    ///
    /// `doc_ids` scopes the question; `None` asks across every document.
    pub async fn submit(&mut self, doc_ids: Option<Vec<String>>) -> &AnswerView<E::Output> {
        if !self.can_submit() {
            debug!(loading = self.loading, "submit ignored");
            return &self.view;
        }

        let question = std::mem::take(&mut self.input).trim().to_string();
        let request = QuestionRequest {
            question,
            top_k_per_doc: self.top_k_per_doc,
            doc_ids: doc_ids.filter(|ids| !ids.is_empty()),
        };

        self.loading = true;
        self.view = AnswerView::Loading;
        let result = E::ask(self.registry.as_ref(), &request).await;
        self.loading = false;

        if self.mounted.is_cancelled() {
            debug!("discarding answer for unmounted view");
            self.view = AnswerView::Idle;
            return &self.view;
        }

        self.view = match result {
            Ok(output) => AnswerView::Ready(output),
            Err(e) => {
                warn!(error = %e, question = %request.question, "question failed");
                AnswerView::Failed(E::FAILURE.to_string())
            }
        };
        &self.view
    }
}
