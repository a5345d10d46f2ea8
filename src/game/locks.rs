//! Per-account mutual exclusion for profile read-modify-write sequences.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entries above this count trigger a sweep of idle locks.
const PRUNE_THRESHOLD: usize = 256;

/// Hands out one async mutex per account key.
///
/// Holding the returned guard is the only sanctioned way to load, mutate and
/// store a profile. Guards for different keys never contend.
#[derive(Default)]
pub struct AccountLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

pub type AccountGuard = OwnedMutexGuard<()>;

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> AccountGuard {
        let cell = {
            let mut map = match self.inner.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if map.len() >= PRUNE_THRESHOLD {
                // Only the map holds an idle entry.
                map.retain(|_, cell| Arc::strong_count(cell) > 1);
            }
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        cell.lock_owned().await
    }

    /// Number of keys currently tracked (held or idle).
    pub fn tracked(&self) -> usize {
        match self.inner.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
