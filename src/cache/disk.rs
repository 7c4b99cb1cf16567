//! Disk tier: TTL-aware wrapper over a [`PersistentStore`].
//!
//! Expiry is lazy: an expired entry is deleted as a side effect of the read
//! that discovers it, so no background sweep is required for correctness —
//! `cleanup` exists only to reclaim space. Every storage or serialization
//! failure is caught here and turned into a cache miss or a silent no-op
//! write; the cache is a performance optimization, never a correctness
//! dependency for reads.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::infra::store::PersistentStore;
use crate::util::clock::now_millis;

use super::entry::CacheEntry;
use super::keys::{DAILY_CLEANUP_KEY, is_namespaced, namespace_of};

const SOURCE: &str = "cache::disk";

const METRIC_DISK_HIT: &str = "strati_cache_disk_hit_total";
const METRIC_DISK_MISS: &str = "strati_cache_disk_miss_total";
const METRIC_DISK_EXPIRED: &str = "strati_cache_disk_expired_total";

/// Disk-tier statistics for debugging; never used for policy decisions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskCacheStats {
    pub entries: usize,
    pub estimated_bytes: u64,
    pub by_namespace: HashMap<String, usize>,
}

pub struct DiskCache {
    store: Arc<dyn PersistentStore>,
    cleanup_interval_ms: i64,
}

impl DiskCache {
    pub fn new(store: Arc<dyn PersistentStore>, cleanup_interval_ms: i64) -> Self {
        Self {
            store,
            cleanup_interval_ms,
        }
    }

    /// Persist `{data, timestamp: now, ttl}` under `key`; idempotent
    /// overwrite. Failures are logged and swallowed.
    pub async fn set<T: Serialize>(&self, key: &str, data: &T, ttl: i64) {
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, source = SOURCE, "Failed to serialize cache payload");
                return;
            }
        };
        self.write_entry(key, &CacheEntry::new(value, ttl)).await;
    }

    /// Persist a pre-built envelope, preserving its timestamp. Used by the
    /// hybrid tier's background write-through.
    pub(crate) async fn write_entry(&self, key: &str, entry: &CacheEntry<serde_json::Value>) {
        let serialized = match serde_json::to_string(entry) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(key, error = %err, source = SOURCE, "Failed to serialize cache entry");
                return;
            }
        };
        if let Err(err) = self.store.set_item(key, &serialized).await {
            warn!(key, error = %err, source = SOURCE, "Disk cache write failed");
        }
    }

    /// Read and deserialize; expired entries are deleted and reported as a
    /// miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read_entry(key).await?.decode(key)
    }

    /// Like [`DiskCache::get`], returning the whole envelope with its
    /// timestamp and TTL.
    pub async fn get_with_meta<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let raw = self.read_entry(key).await?;
        let data = raw.decode(key)?;
        Some(CacheEntry::with_timestamp(data, raw.timestamp, raw.ttl))
    }

    pub(crate) async fn read_entry(&self, key: &str) -> Option<CacheEntry<serde_json::Value>> {
        let serialized = match self.store.get_item(key).await {
            Ok(Some(serialized)) => serialized,
            Ok(None) => {
                counter!(METRIC_DISK_MISS).increment(1);
                return None;
            }
            Err(err) => {
                warn!(key, error = %err, source = SOURCE, "Disk cache read failed");
                counter!(METRIC_DISK_MISS).increment(1);
                return None;
            }
        };

        let entry: CacheEntry<serde_json::Value> = match serde_json::from_str(&serialized) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key, error = %err, source = SOURCE, "Dropping undecodable cache entry");
                self.delete(key).await;
                counter!(METRIC_DISK_MISS).increment(1);
                return None;
            }
        };

        if entry.is_expired() {
            counter!(METRIC_DISK_EXPIRED).increment(1);
            self.delete(key).await;
            return None;
        }

        counter!(METRIC_DISK_HIT).increment(1);
        Some(entry)
    }

    pub async fn delete(&self, key: &str) {
        if let Err(err) = self.store.remove_item(key).await {
            warn!(key, error = %err, source = SOURCE, "Disk cache delete failed");
        }
    }

    /// Remove every entry under this crate's namespaces.
    pub async fn clear_all(&self) {
        let keys = match self.store.all_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, source = SOURCE, "Disk cache clear failed to list keys");
                return;
            }
        };
        let owned: Vec<String> = keys.into_iter().filter(|key| is_namespaced(key)).collect();
        if let Err(err) = self.store.remove_many(&owned).await {
            warn!(error = %err, source = SOURCE, "Disk cache clear failed");
        }
    }

    /// Sweep all namespaced keys and drop the expired ones. Returns the
    /// number of entries removed.
    pub async fn cleanup(&self) -> usize {
        let keys = match self.store.all_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, source = SOURCE, "Disk cache cleanup failed to list keys");
                return 0;
            }
        };

        let now = now_millis();
        let mut removed = 0usize;
        for key in keys.into_iter().filter(|key| is_namespaced(key)) {
            let serialized = match self.store.get_item(&key).await {
                Ok(Some(serialized)) => serialized,
                Ok(None) => continue,
                Err(err) => {
                    warn!(key, error = %err, source = SOURCE, "Cleanup read failed");
                    continue;
                }
            };
            let drop_entry = match serde_json::from_str::<CacheEntry<serde_json::Value>>(&serialized)
            {
                Ok(entry) => entry.is_expired_at(now),
                // An undecodable entry can never be served again.
                Err(_) => true,
            };
            if drop_entry {
                self.delete(&key).await;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, source = SOURCE, "Disk cache cleanup removed expired entries");
        }
        removed
    }

    /// Run [`DiskCache::cleanup`] at most once per rolling interval, tracked
    /// via the reserved housekeeping key. Returns whether a sweep ran.
    pub async fn perform_daily_cleanup(&self) -> bool {
        let now = now_millis();
        if let Some(last) = self.get::<i64>(DAILY_CLEANUP_KEY).await
            && now - last < self.cleanup_interval_ms
        {
            debug!(source = SOURCE, "Daily cleanup skipped: ran recently");
            return false;
        }

        let removed = self.cleanup().await;
        self.set(DAILY_CLEANUP_KEY, &now, 0).await;
        info!(removed, source = SOURCE, "Daily cleanup complete");
        true
    }

    /// Count, estimated size (key length + serialized payload length), and
    /// per-namespace breakdown of everything on disk.
    pub async fn stats(&self) -> DiskCacheStats {
        let keys = match self.store.all_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, source = SOURCE, "Disk cache stats failed to list keys");
                return DiskCacheStats::default();
            }
        };

        let mut stats = DiskCacheStats::default();
        for key in keys.into_iter().filter(|key| is_namespaced(key)) {
            let Ok(Some(serialized)) = self.store.get_item(&key).await else {
                continue;
            };
            stats.entries += 1;
            stats.estimated_bytes += (key.len() + serialized.len()) as u64;
            if let Some(namespace) = namespace_of(&key) {
                *stats.by_namespace.entry(namespace.to_string()).or_default() += 1;
            }
        }
        stats
    }
}
