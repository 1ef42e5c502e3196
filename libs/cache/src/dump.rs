//! Read-only inspection of every store.

use std::io::Write;

use futures_util::TryStreamExt;
use layerstore_shard::ShardStore;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::record::StoreKind;
use crate::stores::Stores;

/// Options for [`dump`].
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Print previews hex-encoded instead of as escaped text.
    pub hex: bool,
    /// Number of leading value bytes shown per entry.
    pub preview_len: usize,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            hex: false,
            preview_len: 64,
        }
    }
}

/// Entry count and size of one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub kind: String,
    pub entries: u64,
    pub total_bytes: u64,
}

/// Write one line per entry of every store to `out`:
///
/// ```text
/// <kind> <key> <length> <preview>
/// ```
///
/// Stores are listed in [`StoreKind::ALL`] order, keys sorted within each.
/// Returns the number of entries written. A key that is listed but has no
/// value is reported as corruption.
pub async fn dump<W: Write>(stores: &Stores, options: &DumpOptions, out: &mut W) -> CacheResult<u64> {
    let mut total = 0;

    for kind in StoreKind::ALL {
        let shard = stores.shard(kind);
        let mut keys: Vec<String> = shard.keys().try_collect().await?;
        keys.sort();

        for key in &keys {
            dump_entry(shard, kind, key, options, out).await?;
            total += 1;
        }
    }

    debug!(entries = total, "Dumped stores");
    Ok(total)
}

/// Write the line for one listed key.
async fn dump_entry<W: Write>(
    shard: &ShardStore,
    kind: StoreKind,
    key: &str,
    options: &DumpOptions,
    out: &mut W,
) -> CacheResult<()> {
    let mut file = match shard.read_stream(key).await {
        Ok(file) => file,
        Err(e) if e.is_not_found() => {
            return Err(CacheError::Corrupt(format!(
                "{kind} store lists key {key} but holds no value for it"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata().await?.len();
    // Sized by what `take` yields, never by the requested length
    let mut preview = Vec::new();
    (&mut file)
        .take(options.preview_len as u64)
        .read_to_end(&mut preview)
        .await?;

    let preview = if options.hex {
        hex::encode(&preview)
    } else {
        String::from_utf8_lossy(&preview).escape_debug().to_string()
    };

    writeln!(out, "{kind} {key} {len} {preview}")?;
    Ok(())
}

/// Count entries and bytes per store.
///
/// Entries erased while counting are skipped.
pub async fn summarize(stores: &Stores) -> CacheResult<Vec<StoreSummary>> {
    let mut summaries = Vec::with_capacity(StoreKind::ALL.len());

    for kind in StoreKind::ALL {
        let shard = stores.shard(kind);
        let mut keys = shard.keys();
        let mut summary = StoreSummary {
            kind: kind.to_string(),
            entries: 0,
            total_bytes: 0,
        };

        while let Some(key) = keys.try_next().await? {
            let path = shard.entry_path(&key)?;
            match tokio::fs::metadata(&path).await {
                Ok(meta) => {
                    summary.entries += 1;
                    summary.total_bytes += meta.len();
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        summaries.push(summary);
    }

    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::remote::Remote;
    use layerstore_shard::ShardStoreConfig;
    use tempfile::TempDir;

    async fn open(temp_dir: &TempDir) -> Stores {
        Stores::open(temp_dir.path(), ShardStoreConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_dump_empty_stores() {
        let temp_dir = TempDir::new().unwrap();
        let stores = open(&temp_dir).await;

        let mut out = Vec::new();
        let count = dump(&stores, &DumpOptions::default(), &mut out).await.unwrap();
        assert_eq!(count, 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_dump_lists_every_store() {
        let temp_dir = TempDir::new().unwrap();
        let stores = open(&temp_dir).await;

        let mut remote = Remote::new("http://x/a.tar");
        remote.file = "aa11".to_string();
        stores.store(&remote).await.unwrap();
        stores
            .shard(StoreKind::Object)
            .write("aa11", b"hello")
            .await
            .unwrap();
        stores
            .shard(StoreKind::Download)
            .write("bb22", b"partial\n")
            .await
            .unwrap();

        let mut out = Vec::new();
        let count = dump(&stores, &DumpOptions::default(), &mut out).await.unwrap();
        assert_eq!(count, 3);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with(&format!("remote {} ", remote.key())));
        assert_eq!(lines[1], "object aa11 5 hello");
        assert_eq!(lines[2], "download bb22 8 partial\\n");
    }

    #[tokio::test]
    async fn test_dump_hex_preview_is_truncated() {
        let temp_dir = TempDir::new().unwrap();
        let stores = open(&temp_dir).await;

        stores
            .shard(StoreKind::Object)
            .write("cc33", b"hello world")
            .await
            .unwrap();

        let options = DumpOptions {
            hex: true,
            preview_len: 5,
        };
        let mut out = Vec::new();
        dump(&stores, &options, &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "object cc33 11 68656c6c6f\n");
    }

    #[tokio::test]
    async fn test_dump_unbounded_preview_prints_whole_value() {
        let temp_dir = TempDir::new().unwrap();
        let stores = open(&temp_dir).await;

        stores
            .shard(StoreKind::Object)
            .write("cc33", b"hello")
            .await
            .unwrap();

        let options = DumpOptions {
            hex: false,
            preview_len: usize::MAX,
        };
        let mut out = Vec::new();
        dump(&stores, &options, &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "object cc33 5 hello\n");
    }

    #[tokio::test]
    async fn test_listed_key_without_value_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let stores = open(&temp_dir).await;

        let mut out = Vec::new();
        let err = dump_entry(
            stores.shard(StoreKind::Object),
            StoreKind::Object,
            "ab00",
            &DumpOptions::default(),
            &mut out,
        )
        .await
        .unwrap_err();

        match err {
            CacheError::Corrupt(msg) => assert!(msg.contains("ab00"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_dump_does_not_modify_stores() {
        let temp_dir = TempDir::new().unwrap();
        let stores = open(&temp_dir).await;

        stores
            .shard(StoreKind::Object)
            .write("dd44", b"payload")
            .await
            .unwrap();
        let before = summarize(&stores).await.unwrap();

        let mut out = Vec::new();
        dump(&stores, &DumpOptions::default(), &mut out).await.unwrap();

        assert_eq!(summarize(&stores).await.unwrap(), before);
        assert_eq!(stores.shard(StoreKind::Object).cached_bytes().await, 0);
    }

    #[tokio::test]
    async fn test_summarize_counts_entries() {
        let temp_dir = TempDir::new().unwrap();
        let stores = open(&temp_dir).await;

        let objects = stores.shard(StoreKind::Object);
        objects.write("ee01", b"12345").await.unwrap();
        objects.write("ff02", b"123").await.unwrap();

        let summaries = summarize(&stores).await.unwrap();
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].entries, 0);
        assert_eq!(
            summaries[1],
            StoreSummary {
                kind: "object".to_string(),
                entries: 2,
                total_bytes: 8,
            }
        );
        assert_eq!(summaries[2].entries, 0);
    }
}
