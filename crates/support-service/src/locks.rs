//! Keyed async locks
//!
//! One `tokio::sync::Mutex` per key, created on first use and dropped again once nobody
//! holds or waits on it. Different keys never contend.

use std::sync::Arc;

use dashmap::DashMap;
use support_core::Snowflake;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created per-key mutexes
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<Snowflake, Arc<Mutex<()>>>,
}

/// Held lock for one key; releasing it prunes the entry when no other task wants it
#[derive(Debug)]
pub struct KeyedGuard<'a> {
    key: Snowflake,
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a KeyedLocks,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: Snowflake) -> KeyedGuard<'_> {
        // Clone out of the map so the shard lock is not held across the await
        let mutex = self.locks.entry(key).or_default().clone();
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            key,
            guard: Some(guard),
            locks: self,
        }
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map still references the mutex: no holder, no waiter
        self.locks
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
