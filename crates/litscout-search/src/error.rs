//! Error types for litscout-search

use thiserror::Error;

/// Errors that can occur in litscout-search operations
#[derive(Error, Debug)]
pub enum SearchError {
    /// Request rejected before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    /// Qdrant client error
    #[error("Qdrant error: {0}")]
    Qdrant(String),

    /// Connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Embedding error
    #[error("Embedding error: {0}")]
    Embedding(String),

    // =========================================================================
    // Provider errors
    // =========================================================================
    /// Embedding or rerank provider unavailable
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Embedding dimension mismatch
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Provider rejected the credentials
    #[error("Provider authentication failed: {0}")]
    ProviderAuth(String),

    /// Provider rate limited
    #[error("Provider rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Rerank request failed
    #[error("Rerank error: {0}")]
    Rerank(String),

    // =========================================================================
    // Storage errors
    // =========================================================================
    /// SQLite error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Blocking storage task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    StorageTask(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] litscout_config::ConfigError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SearchError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error was raised by request validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<qdrant_client::QdrantError> for SearchError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        SearchError::Qdrant(err.to_string())
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::ProviderUnavailable(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SearchError {
    fn from(err: tokio::task::JoinError) -> Self {
        SearchError::StorageTask(err.to_string())
    }
}

/// Result type for litscout-search operations
pub type Result<T> = std::result::Result<T, SearchError>;
