//! Filesystem-backed shard store.
//!
//! Layout on disk:
//!
//! ```text
//! <root>/
//! ├── .tmp/            staged writes, renamed into place on commit
//! ├── ab/abcdef...     one file per key, sharded by key prefix
//! └── cd/cd0123...
//! ```
//!
//! Every value becomes visible through a single `rename`, so readers observe
//! either the previous value or the complete new one.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use tempfile::TempPath;
use tokio::fs::{self, File, ReadDir};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::cache::ReadCache;
use crate::error::{StoreError, StoreResult};

/// Directory holding staged writes. Shard names never start with a dot, so
/// it can not collide with a shard.
const TMP_DIR: &str = ".tmp";

/// Number of leading key characters used as the shard directory name.
const SHARD_PREFIX_LEN: usize = 2;

/// Longest key accepted (the usual file name limit).
const MAX_KEY_LEN: usize = 255;

/// Configuration for a shard store.
#[derive(Debug, Clone)]
pub struct ShardStoreConfig {
    /// Upper bound on bytes held by the in-memory read cache.
    pub cache_size_bytes: u64,
}

impl Default for ShardStoreConfig {
    fn default() -> Self {
        Self {
            cache_size_bytes: 1024 * 1024, // 1 MiB
        }
    }
}

/// Durable key → bytes store with directory sharding and a bounded read
/// cache.
pub struct ShardStore {
    root: PathBuf,
    tmp_dir: PathBuf,
    cache: Mutex<ReadCache>,
    /// Bumped on every mutation; readers only populate the cache when no
    /// mutation happened while they were reading from disk.
    generation: AtomicU64,
}

impl ShardStore {
    /// Open (creating if necessary) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>, config: ShardStoreConfig) -> StoreResult<Self> {
        let root = root.into();
        let tmp_dir = root.join(TMP_DIR);
        fs::create_dir_all(&tmp_dir).await?;

        debug!(
            root = %root.display(),
            cache_size_bytes = config.cache_size_bytes,
            "Opened shard store"
        );

        Ok(Self {
            root,
            tmp_dir,
            cache: Mutex::new(ReadCache::new(config.cache_size_bytes)),
            generation: AtomicU64::new(0),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`.
    pub fn entry_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(shard_of(key)).join(key))
    }

    /// Create or overwrite the value under `key`.
    pub async fn write(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut staged = self.stage(key).await?;
        staged.write_all(value).await?;
        staged.commit(true).await?;
        Ok(())
    }

    /// Stream `reader` into the value under `key` without buffering it.
    ///
    /// On a read failure the key keeps its previous state. When `overwrite`
    /// is false and a value already exists, the existing value is kept and
    /// `Ok(false)` is returned.
    pub async fn write_stream<R>(&self, key: &str, reader: &mut R, overwrite: bool) -> StoreResult<bool>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut staged = self.stage(key).await?;
        tokio::io::copy(reader, &mut staged).await?;
        staged.commit(overwrite).await
    }

    /// Begin a staged write for `key`.
    ///
    /// Nothing is visible under the key until [`StagedWrite::commit`];
    /// dropping the staged write discards its bytes.
    pub async fn stage(&self, key: &str) -> StoreResult<StagedWrite<'_>> {
        let dest = self.entry_path(key)?;
        let named = tempfile::Builder::new()
            .prefix(".stage-")
            .tempfile_in(&self.tmp_dir)?;
        let (file, temp) = named.into_parts();

        Ok(StagedWrite {
            store: self,
            key: key.to_string(),
            dest,
            file: File::from_std(file),
            temp,
            written: 0,
        })
    }

    /// Read the full value under `key`.
    pub async fn read(&self, key: &str) -> StoreResult<Bytes> {
        let path = self.entry_path(key)?;

        if let Some(hit) = self.cache.lock().await.get(key) {
            trace!(key = %key, "Read cache hit");
            return Ok(hit);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let value = Bytes::from(fs::read(&path).await.map_err(|e| not_found(e, key))?);

        let mut cache = self.cache.lock().await;
        if self.generation.load(Ordering::Acquire) == generation {
            cache.insert(key, value.clone());
        }

        Ok(value)
    }

    /// Open the value under `key` for streaming reads.
    ///
    /// The returned handle keeps reading the value that was current when it
    /// was opened, even if the key is overwritten meanwhile.
    pub async fn read_stream(&self, key: &str) -> StoreResult<File> {
        let path = self.entry_path(key)?;
        File::open(&path).await.map_err(|e| not_found(e, key))
    }

    /// Check whether a value exists under `key`.
    pub async fn contains(&self, key: &str) -> StoreResult<bool> {
        let path = self.entry_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Remove the value under `key`. Erasing an absent key is a no-op.
    pub async fn erase(&self, key: &str) -> StoreResult<()> {
        let path = self.entry_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => debug!(key = %key, "Erased entry"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.invalidate(key).await;
        Ok(())
    }

    /// Lazily enumerate every key in the store.
    ///
    /// Keys written or erased while the stream is being consumed may or may
    /// not be observed.
    pub fn keys(&self) -> BoxStream<'static, StoreResult<String>> {
        let walk = KeyWalk {
            root: self.root.clone(),
            shards: None,
            current: None,
            done: false,
        };

        stream::try_unfold(walk, |mut walk| async move {
            let key = walk.next_key().await?;
            Ok::<_, StoreError>(key.map(|key| (key, walk)))
        })
        .boxed()
    }

    /// Bytes currently held by the read cache.
    pub async fn cached_bytes(&self) -> u64 {
        self.cache.lock().await.size_bytes()
    }

    async fn invalidate(&self, key: &str) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.lock().await.remove(key);
    }
}

impl std::fmt::Debug for ShardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardStore")
            .field("root", &self.root)
            .finish()
    }
}

/// A write in progress, staged in the store's temp directory.
pub struct StagedWrite<'a> {
    store: &'a ShardStore,
    key: String,
    dest: PathBuf,
    file: File,
    temp: TempPath,
    written: u64,
}

impl StagedWrite<'_> {
    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Make the staged bytes visible under the key.
    ///
    /// Returns `Ok(false)` when `overwrite` is false and the key already
    /// holds a value; the staged bytes are then discarded.
    pub async fn commit(self, overwrite: bool) -> StoreResult<bool> {
        let StagedWrite {
            store,
            key,
            dest,
            mut file,
            temp,
            written,
        } = self;

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let persisted = if overwrite {
            temp.persist(&dest)
        } else {
            temp.persist_noclobber(&dest)
        };

        match persisted {
            Ok(()) => {}
            Err(e) if !overwrite && e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(key = %key, "Entry exists, keeping current value");
                return Ok(false);
            }
            Err(e) => return Err(StoreError::Io(e.error)),
        }

        store.invalidate(&key).await;
        debug!(key = %key, bytes = written, "Committed entry");
        Ok(true)
    }
}

impl AsyncWrite for StagedWrite<'_> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.file).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            self.written += n as u64;
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

/// Iterative walk over `<root>/<shard>/<key>`.
struct KeyWalk {
    root: PathBuf,
    shards: Option<ReadDir>,
    current: Option<ReadDir>,
    done: bool,
}

impl KeyWalk {
    async fn next_key(&mut self) -> StoreResult<Option<String>> {
        loop {
            if let Some(dir) = self.current.as_mut() {
                match dir.next_entry().await? {
                    Some(entry) => {
                        if !entry.file_type().await?.is_file() {
                            continue;
                        }
                        match entry.file_name().into_string() {
                            Ok(name) if !name.starts_with('.') => return Ok(Some(name)),
                            _ => continue,
                        }
                    }
                    None => self.current = None,
                }
            }

            if self.done {
                return Ok(None);
            }

            let mut shards = match self.shards.take() {
                Some(shards) => shards,
                None => match fs::read_dir(&self.root).await {
                    Ok(shards) => shards,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        self.done = true;
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                },
            };

            let next = shards.next_entry().await?;
            self.shards = Some(shards);
            let Some(entry) = next else {
                self.done = true;
                continue;
            };

            let is_shard = entry.file_type().await?.is_dir()
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_shard {
                continue;
            }

            match fs::read_dir(entry.path()).await {
                Ok(dir) => self.current = Some(dir),
                // Shard removed while walking
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Reject keys that can not be used verbatim as a file name.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Shard directory name for a key: its first two characters.
///
/// Keys are validated ASCII, so slicing on a byte index is safe.
pub fn shard_of(key: &str) -> &str {
    &key[..key.len().min(SHARD_PREFIX_LEN)]
}

fn not_found(err: io::Error, key: &str) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io(err)
    }
}
