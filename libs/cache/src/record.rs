//! Typed records persisted through the store bundle.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CacheError, CacheResult};

/// Which backing store an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKind {
    /// Name → content mappings.
    Remote,
    /// Payloads keyed by content hash.
    Object,
    /// Transient landing area for in-flight fetches.
    Download,
}

impl StoreKind {
    /// Every kind, in the order stores are opened and dumped.
    pub const ALL: [StoreKind; 3] = [StoreKind::Remote, StoreKind::Object, StoreKind::Download];

    /// Subdirectory of the base directory backing this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Object => "object",
            Self::Download => "download",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Remote => 0,
            Self::Object => 1,
            Self::Download => 2,
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record type that can be stored in, and loaded from, a [`crate::Stores`]
/// bundle.
///
/// The default encoding is JSON; implementors only choose a kind and an
/// identity key.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Store the record is routed to.
    const KIND: StoreKind;

    /// Identity key within the store.
    fn key(&self) -> String;

    /// Whether `stored`, loaded under this record's key, is the same record.
    ///
    /// Records whose key is a hash of their identity override this to compare
    /// the identity itself.
    fn same_identity(&self, _stored: &Self) -> bool {
        true
    }

    fn encode(&self) -> CacheResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|source| CacheError::Encode {
            key: self.key(),
            source,
        })
    }

    fn decode(key: &str, bytes: &[u8]) -> CacheResult<Self> {
        serde_json::from_slice(bytes).map_err(|source| CacheError::Decode {
            key: key.to_string(),
            source,
        })
    }
}
