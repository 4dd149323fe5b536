//! Error types for codelens-index.

use std::num::TryFromIntError;

use crate::vector_store::VectorStoreError;

/// Errors that can occur during indexing and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error outside per-file reads (those are skipped, not raised).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The scan root cannot be walked at all.
    #[error("cannot scan {path}: {message}")]
    Scan { path: String, message: String },

    /// Embedding, generation or reranking backend failure.
    #[error("LLM error: {0}")]
    Llm(#[from] codelens_llm::LlmError),

    /// Vector backend failure.
    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    /// `SQLite` database error while opening the local store.
    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// Schema migration failure.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Qdrant client construction failure.
    #[error("Qdrant error: {0}")]
    Qdrant(#[from] Box<qdrant_client::QdrantError>),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Vectors of different lengths within one collection.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A blocking stage exceeded its deadline.
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    /// Background indexing job ended unsuccessfully.
    #[error("indexing job failed: {0}")]
    JobFailed(String),

    /// Background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Integer conversion error.
    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] TryFromIntError),
}

/// Coarse category of an [`IndexError`], for callers that branch on failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Walking or reading the source tree.
    Scan,
    /// Embedding, generation or reranking backend.
    Provider,
    /// Vector storage unavailable or query failure.
    Index,
    /// Job orchestration.
    Job,
}

impl IndexError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Scan { .. } => ErrorKind::Scan,
            Self::Llm(_) | Self::Timeout { .. } => ErrorKind::Provider,
            Self::VectorStore(_)
            | Self::Sqlite(_)
            | Self::Migration(_)
            | Self::Qdrant(_)
            | Self::Json(_)
            | Self::DimensionMismatch { .. }
            | Self::IntConversion(_) => ErrorKind::Index,
            Self::JobFailed(_) | Self::Join(_) => ErrorKind::Job,
        }
    }
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_failure_class() {
        let provider = IndexError::Llm(codelens_llm::LlmError::RateLimited);
        assert_eq!(provider.kind(), ErrorKind::Provider);

        let store = IndexError::VectorStore(VectorStoreError::Connection("refused".into()));
        assert_eq!(store.kind(), ErrorKind::Index);

        let scan = IndexError::Scan {
            path: "/nope".into(),
            message: "not a directory".into(),
        };
        assert_eq!(scan.kind(), ErrorKind::Scan);

        assert_eq!(IndexError::JobFailed("x".into()).kind(), ErrorKind::Job);
    }

    #[test]
    fn dimension_mismatch_message() {
        let err = IndexError::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch: expected 768, got 384"
        );
    }
}
