//! The store bundle: one shard store per [`StoreKind`].

use std::path::{Path, PathBuf};

use bytes::Bytes;
use layerstore_shard::{ShardStore, ShardStoreConfig};
use tokio::fs::File;
use tracing::{debug, info, warn};

use crate::error::{CacheError, CacheResult};
use crate::lock::KeyLocks;
use crate::record::{Record, StoreKind};
use crate::remote::Remote;

/// Handles to the remote, object and download stores under one base
/// directory.
///
/// Every instance is independent; tests open one per temp directory.
#[derive(Debug)]
pub struct Stores {
    base_dir: PathBuf,
    /// Indexed by [`StoreKind::index`].
    stores: Vec<ShardStore>,
    /// Fetch locks, shared by every fetcher over this bundle.
    locks: KeyLocks,
}

impl Stores {
    /// Open every store kind under `base_dir`.
    pub async fn open(base_dir: impl Into<PathBuf>, config: ShardStoreConfig) -> CacheResult<Self> {
        let base_dir = base_dir.into();

        let mut stores = Vec::with_capacity(StoreKind::ALL.len());
        for kind in StoreKind::ALL {
            stores.push(ShardStore::open(base_dir.join(kind.as_str()), config.clone()).await?);
        }

        info!(base_dir = %base_dir.display(), "Opened cache stores");
        Ok(Self {
            base_dir,
            stores,
            locks: KeyLocks::default(),
        })
    }

    /// Release the store handles.
    pub fn close(self) {
        debug!(base_dir = %self.base_dir.display(), "Closed cache stores");
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub(crate) fn locks(&self) -> &KeyLocks {
        &self.locks
    }

    /// The shard store backing `kind`.
    pub fn shard(&self, kind: StoreKind) -> &ShardStore {
        &self.stores[kind.index()]
    }

    /// Persist a record into the store for its kind, replacing any previous
    /// record with the same key.
    pub async fn store<R: Record>(&self, record: &R) -> CacheResult<()> {
        let key = record.key();
        let bytes = record.encode()?;
        self.shard(R::KIND).write(&key, &bytes).await?;
        debug!(kind = %R::KIND, key = %key, "Stored record");
        Ok(())
    }

    /// Replace `record` with the stored record sharing its key.
    ///
    /// On a miss this returns [`CacheError::NotFound`] and leaves `record`
    /// untouched. A stored record with the same key but a different identity
    /// is a miss as well.
    pub async fn get<R: Record>(&self, record: &mut R) -> CacheResult<()> {
        let key = record.key();
        let stored: R = self.load(&key).await?;
        if !record.same_identity(&stored) {
            warn!(kind = %R::KIND, key = %key, "Stored record has a colliding key");
            return Err(CacheError::NotFound(key));
        }
        *record = stored;
        Ok(())
    }

    /// Load the record stored under `key`.
    pub async fn load<R: Record>(&self, key: &str) -> CacheResult<R> {
        let bytes = self.shard(R::KIND).read(key).await?;
        R::decode(key, &bytes)
    }

    /// Look up a remote by name without touching the network.
    pub async fn get_remote(&self, name: &str) -> CacheResult<Remote> {
        let mut remote = Remote::new(name);
        self.get(&mut remote).await?;
        Ok(remote)
    }

    /// Open an object for streaming by content hash.
    pub async fn object_stream(&self, content_hash: &str) -> CacheResult<File> {
        Ok(self.shard(StoreKind::Object).read_stream(content_hash).await?)
    }

    /// Read a whole object by content hash.
    pub async fn read_object(&self, content_hash: &str) -> CacheResult<Bytes> {
        Ok(self.shard(StoreKind::Object).read(content_hash).await?)
    }
}
