//! Invalidation plan generation.
//!
//! Merges a batch of cache events into a deduplicated set of keys to
//! delete, so the consumer touches each key at most once per batch.

use std::collections::HashSet;
use std::fmt;

use super::events::{CacheEvent, EventKind};
use super::keys::CacheKey;

/// Actions to execute for cache consistency.
#[derive(Debug, Default)]
pub struct InvalidationPlan {
    /// Keys to delete from both tiers.
    pub delete_keys: HashSet<CacheKey>,
    /// Whether every cache namespace should be wiped (logout).
    pub clear_all: bool,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InvalidationPlan {{ delete: {}, clear_all: {} }}",
            self.delete_keys.len(),
            self.clear_all,
        )
    }
}

impl InvalidationPlan {
    /// Merge multiple events into a plan.
    ///
    /// - Deduplicates by event ID
    /// - Maps each event kind to its affected keys
    /// - A logout collapses the plan into a full clear
    pub fn from_events(events: Vec<CacheEvent>) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            match event.kind {
                EventKind::ProfileEdited { user_id } => {
                    // The edit shows up in the user's own profile card, in
                    // feeds rendering their items, and in their story reel.
                    plan.delete_keys.insert(CacheKey::Profile(user_id));
                    plan.delete_keys.insert(CacheKey::Feed(user_id));
                    plan.delete_keys.insert(CacheKey::UserStories(user_id));
                }
                EventKind::UserBlocked { actor_id, .. }
                | EventKind::UserUnblocked { actor_id, .. } => {
                    // Only the actor's view changes; the target is unaware.
                    plan.delete_keys.insert(CacheKey::BlockedUsers(actor_id));
                    plan.delete_keys.insert(CacheKey::Feed(actor_id));
                    plan.delete_keys.insert(CacheKey::Inbox(actor_id));
                }
                EventKind::MessageSent {
                    chat_id,
                    sender_id,
                    recipient_id,
                } => {
                    plan.delete_keys.insert(CacheKey::ChatHistory(chat_id));
                    plan.delete_keys.insert(CacheKey::Inbox(sender_id));
                    plan.delete_keys.insert(CacheKey::Inbox(recipient_id));
                }
                EventKind::ChatRead { user_id, .. } => {
                    // Unread counts live in the inbox snapshot.
                    plan.delete_keys.insert(CacheKey::Inbox(user_id));
                }
                EventKind::MatchCreated { user_a, user_b } => {
                    plan.delete_keys.insert(CacheKey::Notifications(user_a));
                    plan.delete_keys.insert(CacheKey::Notifications(user_b));
                }
                EventKind::StoryPosted { user_id } => {
                    plan.delete_keys.insert(CacheKey::UserStories(user_id));
                }
                EventKind::Logout { .. } => {
                    plan.clear_all = true;
                }
            }
        }

        if plan.clear_all {
            // Per-key deletes are redundant under a full clear.
            plan.delete_keys.clear();
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.delete_keys.is_empty() && !self.clear_all
    }
}
