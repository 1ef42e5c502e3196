//! The fetch pipeline: network → landing entry → object store → remote record.
//!
//! A fetch for one remote runs these steps while holding that remote's lock:
//!
//! 1. GET the remote's first mirror
//! 2. Tee the body into a SHA-256 accumulator and a staged landing entry
//! 3. Commit the landing entry under the remote's key
//! 4. Stream it into the object store under its content hash, re-hashing
//!    to make sure the landed bytes are the ones that were downloaded
//! 5. Erase the landing entry
//! 6. Record the content hash in the remote and persist it
//!
//! Nothing is retried. A failure before step 3 leaves no landing entry; a
//! failure after it leaves the committed landing entry in place for an
//! operator to inspect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::record::{Record, StoreKind};
use crate::remote::Remote;
use crate::stores::Stores;
use crate::tee::{HashSink, HashingReader, Tee};

/// Options for the fetch pipeline.
#[derive(Debug, Clone, Default)]
pub struct FetcherConfig {
    /// Upper bound on one fetch, excluding the wait for the remote's lock.
    pub fetch_timeout: Option<Duration>,

    /// Largest body accepted from the network.
    pub max_download_bytes: Option<u64>,
}

impl From<&CacheConfig> for FetcherConfig {
    fn from(config: &CacheConfig) -> Self {
        Self {
            fetch_timeout: config.fetch_timeout,
            max_download_bytes: config.max_download_bytes,
        }
    }
}

/// Resolves remotes into the object store.
///
/// At most one fetch per remote is in flight across every fetcher sharing
/// the same [`Stores`].
pub struct Fetcher {
    stores: Arc<Stores>,
    client: Client,
    config: FetcherConfig,
}

impl Fetcher {
    /// Create a fetcher with a default HTTP client.
    pub fn new(stores: Arc<Stores>, config: FetcherConfig) -> CacheResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(stores, client, config))
    }

    /// Create a fetcher around an existing HTTP client.
    pub fn with_client(stores: Arc<Stores>, client: Client, config: FetcherConfig) -> Self {
        Self {
            stores,
            client,
            config,
        }
    }

    pub fn stores(&self) -> &Arc<Stores> {
        &self.stores
    }

    /// Cache lookup only; never touches the network.
    ///
    /// See [`Stores::get`].
    pub async fn get(&self, remote: &mut Remote) -> CacheResult<()> {
        self.stores.get(remote).await
    }

    /// Fetch `remote` unconditionally and return it with `file` set.
    pub async fn download(&self, remote: Remote) -> CacheResult<Remote> {
        self.run(remote, never_cancelled(), false).await
    }

    /// Like [`Fetcher::download`], aborting with [`CacheError::Cancelled`]
    /// as soon as `shutdown` turns true.
    pub async fn download_with_shutdown(
        &self,
        remote: Remote,
        shutdown: watch::Receiver<bool>,
    ) -> CacheResult<Remote> {
        self.run(remote, shutdown, false).await
    }

    /// Return the cached remote if it is resolved, fetching it otherwise.
    ///
    /// Concurrent calls for the same name fetch once; later callers find
    /// the record written by the first.
    pub async fn resolve(&self, remote: Remote) -> CacheResult<Remote> {
        if let Some(cached) = self.cached(&remote).await? {
            debug!(name = %cached.name, file = %cached.file, "Remote cache hit");
            return Ok(cached);
        }
        self.run(remote, never_cancelled(), true).await
    }

    /// The resolved record for `remote`, if one is stored.
    async fn cached(&self, remote: &Remote) -> CacheResult<Option<Remote>> {
        let mut lookup = remote.clone();
        match self.stores.get(&mut lookup).await {
            Ok(()) if lookup.is_resolved() => Ok(Some(lookup)),
            Ok(()) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn run(
        &self,
        remote: Remote,
        shutdown: watch::Receiver<bool>,
        recheck: bool,
    ) -> CacheResult<Remote> {
        let key = remote.key();
        let name = remote.name.clone();

        let pipeline = async {
            let _guard = self.stores.locks().acquire(&key).await;

            // Another task may have finished the fetch while we waited
            if recheck {
                if let Some(cached) = self.cached(&remote).await? {
                    debug!(name = %cached.name, "Remote resolved by concurrent fetch");
                    return Ok(cached);
                }
            }

            match self.config.fetch_timeout {
                Some(limit) => tokio::time::timeout(limit, self.fetch_locked(remote))
                    .await
                    .map_err(|_| CacheError::Timeout)?,
                None => self.fetch_locked(remote).await,
            }
        };

        tokio::select! {
            result = pipeline => {
                if let Err(e) = &result {
                    warn!(name = %name, error = %e, "Fetch failed");
                }
                result
            }
            () = shutdown_requested(shutdown) => {
                warn!(name = %name, "Fetch cancelled");
                Err(CacheError::Cancelled)
            }
        }
    }

    async fn fetch_locked(&self, mut remote: Remote) -> CacheResult<Remote> {
        let start = Instant::now();
        let key = remote.key();
        let url = remote.fetch_url().to_string();

        info!(name = %remote.name, url = %url, key = %key, "Fetching remote");

        // 1. Request
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::Network { url, status });
        }

        if let (Some(limit), Some(size)) = (self.config.max_download_bytes, response.content_length())
        {
            if size > limit {
                return Err(CacheError::TooLarge { size, limit });
            }
        }

        // 2. Hash and land the body
        let downloads = self.stores.shard(StoreKind::Download);
        let mut landing = downloads.stage(&key).await?;
        let mut tee = Tee::new(HashSink::default(), &mut landing);

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            tee.write_chunk(&chunk).await?;

            if let Some(limit) = self.config.max_download_bytes {
                if tee.bytes_written() > limit {
                    return Err(CacheError::TooLarge {
                        size: tee.bytes_written(),
                        limit,
                    });
                }
            }
        }

        let size = tee.bytes_written();
        let (hash, _) = tee.into_inner();
        let content_hash = hash.finalize_hex();

        // 3. Commit the landing entry
        landing.commit(true).await?;
        debug!(key = %key, size_bytes = size, "Landing entry committed");

        // 4. Promote into the object store
        self.promote(&key, &content_hash).await?;

        // 5. Landing entries never outlive a successful fetch
        downloads.erase(&key).await?;

        // 6. Record the mapping
        remote.file = content_hash;
        self.stores.store(&remote).await?;

        info!(
            name = %remote.name,
            file = %remote.file,
            size_bytes = size,
            duration_ms = start.elapsed().as_millis() as u64,
            "Remote fetched"
        );

        Ok(remote)
    }

    async fn promote(&self, landing_key: &str, content_hash: &str) -> CacheResult<()> {
        let objects = self.stores.shard(StoreKind::Object);
        if objects.contains(content_hash).await? {
            debug!(file = %content_hash, "Object already present, rewriting identical bytes");
        }

        let landed = self
            .stores
            .shard(StoreKind::Download)
            .read_stream(landing_key)
            .await?;
        let mut reader = HashingReader::new(landed);

        let mut staged = objects.stage(content_hash).await?;
        tokio::io::copy(&mut reader, &mut staged).await?;

        let landed_hash = reader.finalize_hex();
        if landed_hash != content_hash {
            return Err(CacheError::Corrupt(format!(
                "landing entry {landing_key} hashes to {landed_hash}, downloaded {content_hash}"
            )));
        }

        staged.commit(true).await?;
        Ok(())
    }
}

/// A shutdown receiver whose sender is already gone, so it never fires.
fn never_cancelled() -> watch::Receiver<bool> {
    watch::channel(false).1
}

/// Resolves once `shutdown` reads true. Never resolves if the sender is
/// dropped without signalling.
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
