//! Delta-sync envelope and merge primitives.
//!
//! A cached collection is stored as a [`SyncEnvelope`]: the items, the
//! frontier timestamp of the newest item already held, and a snapshot of
//! the exclusion set the items were fetched under. A later sync fetches
//! only records at or past the frontier; because the boundary record comes
//! back again, merges deduplicate by record id rather than by timestamp.
//! If the exclusion set changed since the snapshot, the envelope is
//! untrusted and the caller falls back to a full fetch.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted collection plus the state needed to sync it incrementally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncEnvelope<T> {
    pub items: Vec<T>,
    /// Timestamp (epoch ms) of the newest item, 0 when empty.
    pub frontier_ms: i64,
    /// Exclusion set at fetch time; order is not significant.
    #[serde(default)]
    pub excluded_users: Vec<Uuid>,
}

impl<T> SyncEnvelope<T> {
    pub fn new(items: Vec<T>, frontier_ms: i64, excluded_users: Vec<Uuid>) -> Self {
        Self {
            items,
            frontier_ms,
            excluded_users,
        }
    }
}

/// Order-independent comparison of exclusion sets.
pub fn same_exclusions(a: &[Uuid], b: &[Uuid]) -> bool {
    let a: HashSet<&Uuid> = a.iter().collect();
    let b: HashSet<&Uuid> = b.iter().collect();
    a == b
}

/// Frontier of a collection given its per-item timestamp.
pub fn frontier_of<T>(items: &[T], timestamp_of: impl Fn(&T) -> i64) -> i64 {
    items.iter().map(&timestamp_of).max().unwrap_or(0)
}

/// Merge a delta into a newest-first collection.
///
/// Delta items take precedence over cached items with the same id, the
/// result is re-sorted newest first and truncated to `retain`. Returns the
/// merged items and whether any genuinely new record arrived.
pub fn merge_newest_first<T: Clone>(
    cached: &[T],
    delta: Vec<T>,
    retain: usize,
    id_of: impl Fn(&T) -> Uuid,
    timestamp_of: impl Fn(&T) -> i64,
) -> (Vec<T>, bool) {
    let known: HashSet<Uuid> = cached.iter().map(&id_of).collect();
    let has_new = delta.iter().any(|item| !known.contains(&id_of(item)));

    let mut seen = HashSet::new();
    let mut merged: Vec<T> = delta
        .into_iter()
        .chain(cached.iter().cloned())
        .filter(|item| seen.insert(id_of(item)))
        .collect();
    merged.sort_by_key(|item| std::cmp::Reverse(timestamp_of(item)));
    merged.truncate(retain);
    (merged, has_new)
}

/// Merge a delta into an oldest-first collection, trimming the oldest
/// entries once `retain` is exceeded.
pub fn merge_oldest_first<T: Clone>(
    cached: &[T],
    delta: Vec<T>,
    retain: usize,
    id_of: impl Fn(&T) -> Uuid,
    timestamp_of: impl Fn(&T) -> i64,
) -> (Vec<T>, bool) {
    let known: HashSet<Uuid> = cached.iter().map(&id_of).collect();
    let has_new = delta.iter().any(|item| !known.contains(&id_of(item)));

    let mut seen = HashSet::new();
    let mut merged: Vec<T> = cached
        .iter()
        .cloned()
        .chain(delta)
        .filter(|item| seen.insert(id_of(item)))
        .collect();
    merged.sort_by_key(&timestamp_of);
    if merged.len() > retain {
        merged.drain(..merged.len() - retain);
    }
    (merged, has_new)
}
