//! Error types for shard store operations.

use thiserror::Error;

/// Errors from shard store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No value is stored under the key.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The key cannot be mapped onto a file name.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns true if this error is a cache miss rather than a malfunction.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result alias for shard store operations.
pub type StoreResult<T> = Result<T, StoreError>;
