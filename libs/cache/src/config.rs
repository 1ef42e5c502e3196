//! Configuration for the cache and fetch pipeline.

use std::path::PathBuf;
use std::time::Duration;

use layerstore_shard::ShardStoreConfig;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Base directory holding the remote, object and download stores.
    pub base_dir: PathBuf,

    /// Read cache budget per store, in bytes.
    pub read_cache_bytes: u64,

    /// Upper bound on a whole fetch (request, body, promotion).
    pub fetch_timeout: Option<Duration>,

    /// Largest body accepted from the network.
    pub max_download_bytes: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/var/lib/layerstore"),
            read_cache_bytes: ShardStoreConfig::default().cache_size_bytes,
            fetch_timeout: Some(Duration::from_secs(1800)), // 30 minutes
            max_download_bytes: None,
            log_level: "info".to_string(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_dir = std::env::var("LAYERSTORE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.base_dir);

        let read_cache_bytes = std::env::var("LAYERSTORE_READ_CACHE_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.read_cache_bytes);

        // 0 disables the timeout
        let fetch_timeout = match std::env::var("LAYERSTORE_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.fetch_timeout,
        };

        let max_download_bytes = std::env::var("LAYERSTORE_MAX_DOWNLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(defaults.max_download_bytes);

        let log_level =
            std::env::var("LAYERSTORE_LOG_LEVEL").unwrap_or_else(|_| defaults.log_level);

        Self {
            base_dir,
            read_cache_bytes,
            fetch_timeout,
            max_download_bytes,
            log_level,
        }
    }

    /// Shard store settings derived from this configuration.
    pub fn shard_config(&self) -> ShardStoreConfig {
        ShardStoreConfig {
            cache_size_bytes: self.read_cache_bytes,
        }
    }
}
