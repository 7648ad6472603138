use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============= Domain Types =============

/// A source document. Immutable once stored; re-ingestion under a new id
/// supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source_uri: String,
    pub title: String,
    pub raw_text: String,
    pub ingested_at: DateTime<Utc>,
}

/// Text and position of one chunk. The chunk's vector lives in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub document_id: String,
    pub sequence_index: u32,
    pub text: String,
    #[serde(default)]
    pub header: Option<String>,
}

/// A retrieved passage with everything needed to cite it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub score: f32,
    pub text_span: String,
    pub source_uri: String,
    pub document_id: String,
    pub document_title: String,
    pub header: Option<String>,
    pub sequence_index: u32,
    pub ingested_at: DateTime<Utc>,
}

/// A synthesized answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Distinct source URIs of the passages placed in the prompt, in order
    /// of first appearance.
    pub citations: Vec<String>,
    /// Mean score of the included passages, clamped to [0, 1].
    pub confidence: f32,
    /// False when no passage was available and the provider was not called.
    pub grounded: bool,
    pub passages_used: usize,
}

/// Description of a stored backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub snapshot_id: String,
    pub created_at: DateTime<Utc>,
    pub entry_count: usize,
    pub document_count: usize,
    pub chunk_count: usize,
    pub dimensions: usize,
    pub metric: String,
    pub format_version: u32,
    /// SHA-256 of the archive, lowercase hex.
    pub checksum: String,
}

/// Reader verdict on an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackTag {
    Good,
    Wrong,
    Biased,
    Unhelpful,
}

impl std::str::FromStr for FeedbackTag {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "good" => Ok(Self::Good),
            "wrong" => Ok(Self::Wrong),
            "biased" => Ok(Self::Biased),
            "unhelpful" => Ok(Self::Unhelpful),
            other => Err(AppError::Validation(format!(
                "unknown feedback tag '{}' (expected good, wrong, biased or unhelpful)",
                other
            ))),
        }
    }
}

/// Feedback on one question and answer, stored one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<FeedbackTag>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Completion model that produced the answer.
    pub model: String,
}

// ============= API Request/Response Types =============

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
    /// Restrict retrieval to these documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: Answer,
    pub passages: Vec<RetrievalResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub source_uri: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Replace an existing document with the same id.
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub document_id: String,
    pub chunk_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub document_id: String,
    pub deleted_chunks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub question: String,
    pub answer: String,
    /// Documents the question was restricted to, if any.
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BackupRequest {
    #[serde(default)]
    pub snapshot_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RestoreResponse {
    pub snapshot_id: String,
    pub restored: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub documents: usize,
    pub chunks: usize,
    pub index_entries: usize,
    pub dimensions: usize,
    pub metric: String,
    pub backup_state: String,
    pub query_cache_hits: u64,
    pub query_cache_misses: u64,
    pub reranker: String,
    pub model: String,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Conflict: {0}")]
    DuplicateKey(String),

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Synthesis provider error: {0}")]
    SynthesisProvider(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Restore failed: {0}")]
    RestoreFailure(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Provider failures are worth another attempt; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingProvider(_) | AppError::SynthesisProvider(_)
        )
    }
}

impl From<oceanrag_vector::Error> for AppError {
    fn from(err: oceanrag_vector::Error) -> Self {
        use oceanrag_vector::Error as E;
        match err {
            E::DimensionMismatch { expected, actual } => {
                AppError::DimensionMismatch { expected, actual }
            }
            E::DuplicateKey(id) => AppError::DuplicateKey(format!("chunk '{}' already indexed", id)),
            E::InvalidVector(msg) => AppError::Validation(msg),
            E::CorruptSnapshot(msg) => AppError::CorruptSnapshot(msg),
            E::Configuration(msg) => AppError::Configuration(msg),
            E::Persistence(msg) => AppError::Storage(msg),
            E::Io(e) => AppError::Storage(e.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::Validation(_) | AppError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
            AppError::DuplicateKey(_) | AppError::Busy(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CorruptSnapshot(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::EmbeddingProvider(_) | AppError::SynthesisProvider(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::RestoreFailure(_)
            | AppError::Configuration(_)
            | AppError::Storage(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
