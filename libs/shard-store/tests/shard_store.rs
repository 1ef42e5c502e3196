//! Integration tests for the filesystem shard store.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::TryStreamExt;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};

use layerstore_shard::{ShardStore, ShardStoreConfig, StoreError};

async fn open_store(temp_dir: &TempDir) -> ShardStore {
    ShardStore::open(temp_dir.path().join("store"), ShardStoreConfig::default())
        .await
        .unwrap()
}

/// Yields `data`, then fails instead of reporting EOF.
struct FailingReader {
    data: Vec<u8>,
    pos: usize,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pos >= self.data.len() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "stream reset",
            )));
        }
        let n = buf.remaining().min(self.data.len() - self.pos);
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_write_and_read() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    store.write("abc123", b"hello").await.unwrap();
    let value = store.read("abc123").await.unwrap();
    assert_eq!(&value[..], b"hello");

    // Stored under its shard directory
    let path = temp_dir.path().join("store").join("ab").join("abc123");
    assert!(path.exists());
}

#[tokio::test]
async fn test_read_missing_key() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    let err = store.read("missing").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(ref k) if k == "missing"));

    let err = store.read_stream("missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_overwrite_invalidates_read_cache() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    store.write("key1", b"first").await.unwrap();
    assert_eq!(&store.read("key1").await.unwrap()[..], b"first");
    assert_eq!(store.cached_bytes().await, 5);

    store.write("key1", b"second value").await.unwrap();
    assert_eq!(&store.read("key1").await.unwrap()[..], b"second value");
}

#[tokio::test]
async fn test_read_cache_respects_budget() {
    let temp_dir = TempDir::new().unwrap();
    let store = ShardStore::open(
        temp_dir.path().join("store"),
        ShardStoreConfig {
            cache_size_bytes: 8,
        },
    )
    .await
    .unwrap();

    store.write("small", b"1234").await.unwrap();
    store.write("large", b"0123456789").await.unwrap();

    store.read("small").await.unwrap();
    store.read("large").await.unwrap();
    assert_eq!(store.cached_bytes().await, 4);
}

#[tokio::test]
async fn test_erase_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    store.write("gone", b"bytes").await.unwrap();
    store.read("gone").await.unwrap();

    store.erase("gone").await.unwrap();
    assert!(store.read("gone").await.unwrap_err().is_not_found());
    assert!(!store.contains("gone").await.unwrap());

    // Second erase of an absent key is a no-op
    store.erase("gone").await.unwrap();
    store.erase("never-written").await.unwrap();
}

#[tokio::test]
async fn test_write_stream_and_read_stream() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    let payload = vec![7u8; 256 * 1024];
    let mut reader = &payload[..];
    let written = store.write_stream("blob", &mut reader, true).await.unwrap();
    assert!(written);

    let mut file = store.read_stream("blob").await.unwrap();
    let mut read_back = Vec::new();
    file.read_to_end(&mut read_back).await.unwrap();
    assert_eq!(read_back, payload);
}

#[tokio::test]
async fn test_failed_stream_keeps_previous_value() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    store.write("layer", b"old value").await.unwrap();

    let mut reader = FailingReader {
        data: b"partial new".to_vec(),
        pos: 0,
    };
    let err = store
        .write_stream("layer", &mut reader, true)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Io(_)));

    assert_eq!(&store.read("layer").await.unwrap()[..], b"old value");
}

#[tokio::test]
async fn test_failed_stream_leaves_no_entry() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    let mut reader = FailingReader {
        data: b"partial".to_vec(),
        pos: 0,
    };
    assert!(store.write_stream("fresh", &mut reader, true).await.is_err());
    assert!(!store.contains("fresh").await.unwrap());

    // The staged temp file is cleaned up as well
    let tmp_entries = std::fs::read_dir(temp_dir.path().join("store").join(".tmp"))
        .unwrap()
        .count();
    assert_eq!(tmp_entries, 0);
}

#[tokio::test]
async fn test_write_stream_without_overwrite_keeps_existing() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    store.write("obj", b"original").await.unwrap();

    let mut reader = &b"replacement"[..];
    let written = store.write_stream("obj", &mut reader, false).await.unwrap();
    assert!(!written);
    assert_eq!(&store.read("obj").await.unwrap()[..], b"original");
}

#[tokio::test]
async fn test_uncommitted_stage_is_invisible() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    let mut staged = store.stage("pending").await.unwrap();
    staged.write_all(b"in flight").await.unwrap();
    assert_eq!(staged.bytes_written(), 9);
    assert!(!store.contains("pending").await.unwrap());

    drop(staged);
    assert!(!store.contains("pending").await.unwrap());
}

#[tokio::test]
async fn test_keys_enumerates_all_shards() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    for key in ["aa01", "aa02", "bb01", "c"] {
        store.write(key, key.as_bytes()).await.unwrap();
    }

    let mut keys: Vec<String> = store.keys().try_collect().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["aa01", "aa02", "bb01", "c"]);
}

#[tokio::test]
async fn test_keys_on_empty_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    let keys: Vec<String> = store.keys().try_collect().await.unwrap();
    assert!(keys.is_empty());
}

#[tokio::test]
async fn test_invalid_key_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir).await;

    let err = store.write("../escape", b"x").await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidKey(_)));
}

#[tokio::test]
async fn test_concurrent_readers_never_see_torn_values() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(&temp_dir).await);

    let old = vec![b'a'; 64 * 1024];
    let new = vec![b'b'; 64 * 1024];
    store.write("hot", &old).await.unwrap();

    let writer = {
        let store = Arc::clone(&store);
        let (old, new) = (old.clone(), new.clone());
        tokio::spawn(async move {
            for i in 0..20 {
                let value = if i % 2 == 0 { &new } else { &old };
                store.write("hot", value).await.unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        let (old, new) = (old.clone(), new.clone());
        readers.push(tokio::spawn(async move {
            for _ in 0..20 {
                let value = store.read("hot").await.unwrap();
                assert!(value[..] == old[..] || value[..] == new[..]);
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}
