use super::schema::{
    DocumentRecord, ErrorBody, HealthResponse, ListFilter, QueryResponse, QuestionRequest,
    ThemeResponse, UploadResponse, UploadResult,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::file::LocalFile;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Authoritative document registry on the backend.
///
/// Every call is a single request bounded by the client timeout. Nothing here retries.
#[async_trait]
pub trait RemoteRegistry: Send + Sync {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<DocumentRecord>>;

    /// One result per submitted file, in submission order. A batch where some
    /// files failed is still `Ok`.
    async fn upload(&self, files: &[LocalFile]) -> Result<Vec<UploadResult>>;

    /// Fails with [`Error::NotFound`] when the document is already gone.
    async fn delete(&self, doc_id: &str) -> Result<()>;

    async fn query(&self, request: &QuestionRequest) -> Result<QueryResponse>;

    async fn theme(&self, request: &QuestionRequest) -> Result<ThemeResponse>;
}

/// `reqwest`-based registry client.
#[derive(Clone)]
pub struct HttpRegistry {
    client: Client,
    base_url: String,
    api_url: String,
}

impl HttpRegistry {
    pub fn new(base_url: &str, api_prefix: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let prefix = api_prefix.trim_matches('/');
        let api_url = if prefix.is_empty() {
            base_url.clone()
        } else {
            format!("{base_url}/{prefix}")
        };
        Ok(Self {
            client,
            base_url,
            api_url,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_url, &config.api_prefix, config.timeout())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    /// `GET /health` at the server root.
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

#[async_trait]
impl RemoteRegistry for HttpRegistry {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<DocumentRecord>> {
        let response = self
            .client
            .get(self.endpoint("docs/"))
            .query(filter)
            .send()
            .await?;
        let docs: Vec<DocumentRecord> = check(response).await?.json().await?;
        debug!(count = docs.len(), "fetched document list");
        Ok(docs)
    }

    async fn upload(&self, files: &[LocalFile]) -> Result<Vec<UploadResult>> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes.to_vec())
                .file_name(file.filename.clone())
                .mime_str(&file.mime_type)?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(self.endpoint("upload/"))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = check(response).await?.json().await?;

        if body.upload_results.len() != files.len() {
            warn!(
                submitted = files.len(),
                returned = body.upload_results.len(),
                "upload result count does not match submitted files"
            );
        }
        info!(files = files.len(), "upload batch settled");
        Ok(body.upload_results)
    }

    async fn delete(&self, doc_id: &str) -> Result<()> {
        let url = self.endpoint(&format!("docs/{}", urlencoding::encode(doc_id)));
        let response = self.client.delete(url).send().await?;
        check(response).await?;
        info!(doc_id = %doc_id, "deleted remote document");
        Ok(())
    }

    async fn query(&self, request: &QuestionRequest) -> Result<QueryResponse> {
        let response = self
            .client
            .post(self.endpoint("query/"))
            .json(request)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn theme(&self, request: &QuestionRequest) -> Result<ThemeResponse> {
        let response = self
            .client
            .post(self.endpoint("theme/"))
            .json(request)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Turn a non-2xx response into an error carrying the backend's `detail`.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if !body.trim().is_empty() => body,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };

    warn!(status = status.as_u16(), %detail, "backend rejected request");
    if status == StatusCode::NOT_FOUND {
        Err(Error::NotFound { detail })
    } else {
        Err(Error::Api {
            status: status.as_u16(),
            detail,
        })
    }
}
