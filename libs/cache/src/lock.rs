//! Per-key mutual exclusion for the fetch pipeline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock table keyed by remote identity.
///
/// Holders of different keys never contend. Entries are dropped from the
/// table once no task holds or waits on them.
#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    /// Wait for exclusive access to `key`.
    pub(crate) async fn acquire(&self, key: &str) -> KeyGuard<'_> {
        let lock = self
            .table()
            .entry(key.to_string())
            .or_default()
            .clone();

        let guard = lock.lock_owned().await;
        KeyGuard {
            locks: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        // The map is never left half-updated, so a poisoned lock is still usable
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive access to one key; released on drop.
pub(crate) struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Release before pruning so the strong count reflects other users only
        drop(self.guard.take());

        let mut table = self.locks.table();
        if let Some(lock) = table.get(&self.key) {
            if Arc::strong_count(lock) == 1 {
                table.remove(&self.key);
            }
        }
    }
}
