//! Errors from cache and fetch operations.

use layerstore_shard::StoreError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors from cache lookups and the fetch pipeline.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Nothing is cached under the key. Callers fetch on this.
    #[error("not found in cache: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered with a non-success status.
    #[error("GET {url} failed with status {status}")]
    Network { url: String, status: StatusCode },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A stored record could not be decoded.
    #[error("failed to decode record {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Store contents contradict what was written or enumerated.
    #[error("store corrupted: {0}")]
    Corrupt(String),

    #[error("Download too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Fetch timeout")]
    Timeout,

    #[error("Fetch cancelled")]
    Cancelled,
}

impl CacheError {
    /// Returns true if this error is a cache miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => CacheError::NotFound(key),
            other => CacheError::Store(other),
        }
    }
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
