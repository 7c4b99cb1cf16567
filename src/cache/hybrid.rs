//! Memory tier: a bounded LRU in front of the disk cache.
//!
//! The LRU is global across all key namespaces and capped by
//! `memory_capacity` entries, not bytes. Writes land in memory synchronously
//! and flow to disk on a detached task, so a `set` followed immediately by a
//! `get` on the same task always hits memory. Disk repopulation after a
//! memory miss uses a shortened TTL so a record evicted long ago cannot
//! reappear with its original lifetime.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::util::clock::now_millis;

use super::disk::DiskCache;
use super::entry::CacheEntry;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::hybrid";

const METRIC_MEMORY_HIT: &str = "strati_cache_memory_hit_total";
const METRIC_MEMORY_MISS: &str = "strati_cache_memory_miss_total";
const METRIC_MEMORY_EVICT: &str = "strati_cache_memory_evict_total";

struct MemoryEntry {
    entry: CacheEntry<serde_json::Value>,
    access_count: u64,
    last_accessed: i64,
}

/// Per-key access summary surfaced by [`HybridCacheStats`].
#[derive(Debug, Clone, PartialEq)]
pub struct HotKey {
    pub key: String,
    pub access_count: u64,
    pub last_accessed: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridCacheStats {
    pub entries: usize,
    pub estimated_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub most_accessed: Vec<HotKey>,
}

impl HybridCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct HybridCache {
    entries: Mutex<LruCache<String, MemoryEntry>>,
    disk: Arc<DiskCache>,
    repopulate_ttl_ms: i64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HybridCache {
    pub fn new(disk: Arc<DiskCache>, capacity: NonZeroUsize, repopulate_ttl_ms: i64) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            disk,
            repopulate_ttl_ms,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn disk(&self) -> &Arc<DiskCache> {
        &self.disk
    }

    /// Insert into memory now and schedule the disk write. At most one entry
    /// is evicted per insert.
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: i64) {
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, source = SOURCE, "Failed to serialize cache payload");
                return;
            }
        };
        let entry = CacheEntry::new(value, ttl);

        self.insert_memory(key, &entry);

        let disk = self.disk.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            disk.write_entry(&key, &entry).await;
        });
    }

    fn insert_memory(&self, key: &str, entry: &CacheEntry<serde_json::Value>) {
        let mut entries = mutex_lock(&self.entries, SOURCE, "insert");
        let evicted = entries.push(
            key.to_string(),
            MemoryEntry {
                entry: entry.clone(),
                access_count: 0,
                last_accessed: now_millis(),
            },
        );
        // push returns the displaced pair; same-key replacement is not an
        // eviction.
        if let Some((old_key, _)) = evicted
            && old_key != key
        {
            counter!(METRIC_MEMORY_EVICT).increment(1);
        }
    }

    /// Memory first, disk on miss. A disk hit repopulates memory with the
    /// shortened repopulation TTL.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = now_millis();

        enum Memory {
            Hit(CacheEntry<serde_json::Value>),
            Expired,
            Miss,
        }

        let memory = {
            let mut entries = mutex_lock(&self.entries, SOURCE, "get");
            match entries.get_mut(key) {
                Some(held) if held.entry.is_expired_at(now) => {
                    entries.pop(key);
                    Memory::Expired
                }
                Some(held) => {
                    held.access_count += 1;
                    held.last_accessed = now;
                    Memory::Hit(held.entry.clone())
                }
                None => Memory::Miss,
            }
        };

        match memory {
            Memory::Hit(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                counter!(METRIC_MEMORY_HIT).increment(1);
                return entry.decode(key);
            }
            Memory::Expired => {
                // The disk copy carries the same timestamp, drop it too.
                self.disk.delete(key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                counter!(METRIC_MEMORY_MISS).increment(1);
                return None;
            }
            Memory::Miss => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                counter!(METRIC_MEMORY_MISS).increment(1);
            }
        }

        let from_disk = self.disk.read_entry(key).await?;
        let repopulated = CacheEntry::new(from_disk.data.clone(), self.repopulate_ttl_ms);
        self.insert_memory(key, &repopulated);
        from_disk.decode(key)
    }

    /// Remove from both tiers.
    pub async fn delete(&self, key: &str) {
        {
            let mut entries = mutex_lock(&self.entries, SOURCE, "delete");
            entries.pop(key);
        }
        self.disk.delete(key).await;
    }

    /// Drop every memory entry and clear the disk namespaces.
    pub async fn clear_all(&self) {
        {
            let mut entries = mutex_lock(&self.entries, SOURCE, "clear_all");
            entries.clear();
        }
        self.disk.clear_all().await;
    }

    /// Evict expired memory entries without touching disk. Returns how many
    /// were dropped.
    pub fn prune_expired(&self) -> usize {
        let now = now_millis();
        let mut entries = mutex_lock(&self.entries, SOURCE, "prune_expired");
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, held)| held.entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn stats(&self) -> HybridCacheStats {
        let entries = mutex_lock(&self.entries, SOURCE, "stats");

        let mut estimated_bytes = 0u64;
        let mut hot: Vec<HotKey> = Vec::with_capacity(entries.len());
        for (key, held) in entries.iter() {
            let payload = serde_json::to_string(&held.entry)
                .map(|serialized| serialized.len())
                .unwrap_or(0);
            estimated_bytes += (key.len() + payload) as u64;
            hot.push(HotKey {
                key: key.clone(),
                access_count: held.access_count,
                last_accessed: held.last_accessed,
            });
        }
        hot.sort_by(|a, b| b.access_count.cmp(&a.access_count));
        hot.truncate(5);

        HybridCacheStats {
            entries: entries.len(),
            estimated_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            most_accessed: hot,
        }
    }
}
