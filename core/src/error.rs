use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, persisting, or loading indexes.
///
/// An empty ranking is not an error; see [`crate::rank::EmptyReason`].
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// A document in a build batch was missing or not text. The whole call is rejected.
    #[error("malformed document '{doc_id}': {reason}")]
    Data { doc_id: String, reason: String },

    #[error("index not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("cannot decode audio '{source_name}': {reason}")]
    AudioDecode { source_name: String, reason: String },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("not enough frames to fit {clusters} clusters: got {frames}")]
    InsufficientFrames { frames: usize, clusters: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unsupported index version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },

    /// Persisted structures disagree with each other.
    #[error("inconsistent index: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Codec(#[from] bincode::Error),
}

impl RetrievalError {
    pub(crate) fn data(doc_id: impl Into<String>, reason: impl Into<String>) -> Self {
        RetrievalError::Data { doc_id: doc_id.into(), reason: reason.into() }
    }

    pub(crate) fn decode(source_name: impl Into<String>, reason: impl ToString) -> Self {
        RetrievalError::AudioDecode { source_name: source_name.into(), reason: reason.to_string() }
    }

    /// True for the lookup failures (`NotFound`, `TableNotFound`).
    pub fn is_not_found(&self) -> bool {
        matches!(self, RetrievalError::NotFound(_) | RetrievalError::TableNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
