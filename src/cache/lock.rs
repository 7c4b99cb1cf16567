use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use tracing::warn;

/// Acquire a std mutex, recovering from poisoning.
///
/// The memory tier is a strict performance optimization; a panic in another
/// thread must not turn every later cache access into a panic too.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                hint = "state may be stale after panic in another thread",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

/// Per-key async mutexes serializing read-modify-write cycles.
///
/// Two concurrent appends to the same chat key would otherwise race: both
/// read the same envelope, both write, one append is lost. Holding the
/// key's guard across the whole cycle removes the interleaving.
pub struct KeyLocks {
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the guard for `key`, waiting if another task holds it.
    pub async fn acquire(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Number of keys that have ever been locked (ledger size).
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new()
    }
}
