//! Remote records: a fetchable name and, once resolved, its content hash.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::record::{Record, StoreKind};

/// A named reference to a fetchable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    /// Canonical URL; the record's identity.
    pub name: String,

    /// Fallback URLs. Only the first entry is ever fetched.
    #[serde(default)]
    pub mirrors: Vec<String>,

    /// Reserved for conditional fetches; never sent.
    #[serde(default)]
    pub etag: String,

    /// Content hash of the fetched payload, empty until resolved.
    #[serde(default)]
    pub file: String,
}

impl Remote {
    /// Create an unresolved remote whose only mirror is its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            mirrors: vec![name.clone()],
            name,
            etag: String::new(),
            file: String::new(),
        }
    }

    /// Stable, non-cryptographic hash of `name`, used as the store key.
    pub fn key_for(name: &str) -> String {
        format!("{:016x}", xxh3_64(name.as_bytes()))
    }

    /// URL the fetch pipeline requests.
    pub fn fetch_url(&self) -> &str {
        self.mirrors.first().map(String::as_str).unwrap_or(&self.name)
    }

    /// Whether the remote has been fetched into the object store.
    pub fn is_resolved(&self) -> bool {
        !self.file.is_empty()
    }
}

impl Record for Remote {
    const KIND: StoreKind = StoreKind::Remote;

    fn key(&self) -> String {
        Self::key_for(&self.name)
    }

    /// Distinct names can share a 64-bit key.
    fn same_identity(&self, stored: &Self) -> bool {
        self.name == stored.name
    }
}
