use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index `{name}`: {reason}")]
    Index { name: String, reason: String },

    #[error("Index `{name}` is not ready: index a corpus or load an existing index first")]
    NotReady { name: String },

    #[error("Vector/metadata count mismatch: {vectors} vectors, {metadata} metadata entries")]
    CountMismatch { vectors: usize, metadata: usize },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create an index error with the index name for caller context
    pub fn index(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Index {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
