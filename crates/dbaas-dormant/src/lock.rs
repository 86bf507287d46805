//! Per-key exclusion for the reconcile entrypoints
//!
//! kube-runtime's controller already runs at most one reconcile per object,
//! but the archive and resurrection paths are driven by watches on different
//! kinds that share a (namespace, name) key. `KeyedLocks` serialises them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Key = (String, String);

/// Async mutexes indexed by (namespace, name)
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<Key, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a key; released when the guard drops
    pub async fn lock(&self, namespace: &str, name: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the DashMap shard is not held across the await
        let mutex = self
            .locks
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .clone();
        mutex.lock_owned().await
    }

    /// Drop entries nobody holds or waits on
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True if no keys are tracked
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
