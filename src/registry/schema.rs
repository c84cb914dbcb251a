use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Canonical document metadata as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub filename: String,
    pub doc_type: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub doc_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "timestamp")]
    pub upload_date: DateTime<Utc>,
}

/// Optional filters accepted by `GET /docs/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Inclusive ISO date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    /// Inclusive ISO date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

impl ListFilter {
    pub fn is_empty(&self) -> bool {
        self == &ListFilter::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Indexed,
    Error,
    Skipped,
}

/// One per submitted file, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    #[serde(default)]
    pub doc_id: Option<String>,
    pub filename: String,
    pub status: UploadStatus,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UploadResponse {
    pub upload_results: Vec<UploadResult>,
}

/// Body of `POST /query/` and `POST /theme/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionRequest {
    pub question: String,
    pub top_k_per_doc: u32,
    /// Restrict the question to these documents; all documents when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSnippet {
    pub text: String,
    pub citation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnswer {
    pub doc_id: String,
    pub answers: Vec<AnswerSnippet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    pub individual_answers: Vec<DocumentAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeItem {
    pub theme_name: String,
    pub summary: String,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThemeResponse {
    pub themes: Vec<ThemeItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// FastAPI error body.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

// The backend emits RFC 3339 when the column carries a zone, and a naive
// timestamp (assumed UTC) when SQLite dropped it.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .map(|n| n.and_utc())
        })
}

fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
    }
}
