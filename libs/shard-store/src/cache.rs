//! Bounded in-memory read cache.
//!
//! Values are evicted least-recently-used first once the total payload size
//! exceeds the configured byte budget.

use bytes::Bytes;
use lru::LruCache;

/// LRU cache bounded by total value bytes rather than entry count.
#[derive(Debug)]
pub(crate) struct ReadCache {
    entries: LruCache<String, Bytes>,
    size_bytes: u64,
    max_size_bytes: u64,
}

impl ReadCache {
    pub(crate) fn new(max_size_bytes: u64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            size_bytes: 0,
            max_size_bytes,
        }
    }

    pub(crate) fn get(&mut self, key: &str) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    /// Insert a value, evicting older entries as needed.
    ///
    /// Values larger than the whole budget are never cached.
    pub(crate) fn insert(&mut self, key: &str, value: Bytes) {
        let len = value.len() as u64;
        if len > self.max_size_bytes {
            self.remove(key);
            return;
        }

        if let Some(old) = self.entries.put(key.to_string(), value) {
            self.size_bytes -= old.len() as u64;
        }
        self.size_bytes += len;

        while self.size_bytes > self.max_size_bytes {
            match self.entries.pop_lru() {
                Some((_, evicted)) => self.size_bytes -= evicted.len() as u64,
                None => break,
            }
        }
    }

    pub(crate) fn remove(&mut self, key: &str) {
        if let Some(old) = self.entries.pop(key) {
            self.size_bytes -= old.len() as u64;
        }
    }

    pub(crate) fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = ReadCache::new(10);
        cache.insert("a", Bytes::from_static(b"aaaa"));
        cache.insert("b", Bytes::from_static(b"bbbb"));

        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").is_some());
        cache.insert("c", Bytes::from_static(b"cccc"));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.size_bytes(), 8);
    }

    #[test]
    fn test_oversized_value_not_cached() {
        let mut cache = ReadCache::new(4);
        cache.insert("big", Bytes::from_static(b"too large"));
        assert!(cache.get("big").is_none());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_replace_tracks_size() {
        let mut cache = ReadCache::new(100);
        cache.insert("k", Bytes::from_static(b"12345"));
        cache.insert("k", Bytes::from_static(b"12"));
        assert_eq!(cache.size_bytes(), 2);
        assert_eq!(cache.len(), 1);

        cache.remove("k");
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_oversized_replacement_drops_stale_value() {
        let mut cache = ReadCache::new(4);
        cache.insert("k", Bytes::from_static(b"abc"));
        cache.insert("k", Bytes::from_static(b"abcdefgh"));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.size_bytes(), 0);
    }
}
