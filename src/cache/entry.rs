//! The serialized envelope shared by both cache tiers.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::util::clock::now_millis;

/// A cached value with its write timestamp and time-to-live.
///
/// `ttl == 0` means the entry never expires; otherwise it is stale once
/// `now - timestamp > ttl`. Stored identically in memory and on disk,
/// though the two tiers may disagree transiently because memory is
/// refreshed independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Epoch milliseconds at write time.
    pub timestamp: i64,
    /// Milliseconds; 0 disables expiry.
    pub ttl: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: i64) -> Self {
        Self {
            data,
            timestamp: now_millis(),
            ttl,
        }
    }

    pub fn with_timestamp(data: T, timestamp: i64, ttl: i64) -> Self {
        Self {
            data,
            timestamp,
            ttl,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.ttl > 0 && now - self.timestamp > self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }
}

impl CacheEntry<serde_json::Value> {
    /// Deserialize the payload into a concrete type, logging and returning
    /// `None` on shape mismatch (treated as a miss, never an error).
    pub fn decode<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match serde_json::from_value(self.data.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "Cached payload did not match expected shape");
                None
            }
        }
    }
}
