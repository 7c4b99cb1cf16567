//! Strati Cache System
//!
//! Provides two-tier caching for client data:
//!
//! - **Memory tier**: a bounded LRU shared across all key namespaces
//! - **Disk tier**: TTL-stamped JSON envelopes in a persistent key-value
//!   store
//!
//! Invalidation is event driven: write paths publish [`CacheEvent`]s, the
//! [`CacheConsumer`] merges them into an [`InvalidationPlan`] and deletes the
//! affected keys from both tiers.
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `strati.toml`:
//!
//! ```toml
//! [cache]
//! memory_capacity = 100
//! profile_ttl_ms = 300000
//! # ... see config for all options
//! ```

mod consumer;
mod disk;
mod entry;
mod events;
mod hybrid;
mod keys;
mod lock;
mod planner;
mod trigger;

pub use consumer::CacheConsumer;
pub use disk::{DiskCache, DiskCacheStats};
pub use entry::CacheEntry;
pub use events::{CacheEvent, Epoch, EventKind, EventQueue};
pub use hybrid::{HotKey, HybridCache, HybridCacheStats};
pub use keys::{CacheKey, DAILY_CLEANUP_KEY, NAMESPACE_PREFIXES, is_namespaced, namespace_of};
pub use lock::KeyLocks;
pub use planner::InvalidationPlan;
pub use trigger::CacheTrigger;
