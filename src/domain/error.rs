use thiserror::Error;

/// Errors surfaced by the document manager and the layers beneath it.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid metadata for document '{id}': {reason}")]
    InvalidMetadata { id: String, reason: String },

    #[error("Duplicate id in upsert request: '{0}'")]
    DuplicateId(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Collection '{collection}' holds {expected}-dimensional vectors but the embedder produces {actual}")]
    DimensionMismatch {
        collection: String,
        expected: u64,
        actual: u64,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<tokio::task::JoinError> for DocumentStoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        DocumentStoreError::Embedding(format!("embedding task did not complete: {}", err))
    }
}

pub type Result<T, E = DocumentStoreError> = std::result::Result<T, E>;
