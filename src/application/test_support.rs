//! Shared fixtures for domain cache tests.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::cache::{DiskCache, HybridCache, KeyLocks};
use crate::infra::store::MemoryStore;

pub(crate) fn new_hybrid() -> Arc<HybridCache> {
    let disk = Arc::new(DiskCache::new(
        Arc::new(MemoryStore::new()),
        24 * 60 * 60 * 1000,
    ));
    Arc::new(HybridCache::new(
        disk,
        NonZeroUsize::new(100).unwrap(),
        60 * 60 * 1000,
    ))
}

pub(crate) fn new_locks() -> Arc<KeyLocks> {
    Arc::new(KeyLocks::new())
}
