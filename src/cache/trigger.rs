//! Cache trigger service.
//!
//! Provides a high-level API for publishing cache events and consuming
//! them immediately, so write paths stay one call.

use std::sync::Arc;

use uuid::Uuid;

use super::consumer::CacheConsumer;
use super::events::{EventKind, EventQueue};

/// Cache trigger for publishing cache events.
///
/// Wraps the event queue and consumer, providing convenience methods for
/// triggering invalidation from write operations.
pub struct CacheTrigger {
    queue: Arc<EventQueue>,
    consumer: Arc<CacheConsumer>,
}

impl CacheTrigger {
    pub fn new(queue: Arc<EventQueue>, consumer: Arc<CacheConsumer>) -> Self {
        Self { queue, consumer }
    }

    /// Publish an event and optionally consume immediately.
    ///
    /// With `consume_now` false, events wait for the next explicit
    /// consumption pass.
    pub async fn trigger(&self, kind: EventKind, consume_now: bool) {
        self.queue.publish(kind);

        if consume_now {
            self.consumer.consume().await;
        }
    }

    pub async fn profile_edited(&self, user_id: Uuid) {
        self.trigger(EventKind::ProfileEdited { user_id }, true).await;
    }

    pub async fn user_blocked(&self, actor_id: Uuid, target_id: Uuid) {
        self.trigger(
            EventKind::UserBlocked {
                actor_id,
                target_id,
            },
            true,
        )
        .await;
    }

    pub async fn user_unblocked(&self, actor_id: Uuid, target_id: Uuid) {
        self.trigger(
            EventKind::UserUnblocked {
                actor_id,
                target_id,
            },
            true,
        )
        .await;
    }

    pub async fn message_sent(&self, chat_id: Uuid, sender_id: Uuid, recipient_id: Uuid) {
        self.trigger(
            EventKind::MessageSent {
                chat_id,
                sender_id,
                recipient_id,
            },
            true,
        )
        .await;
    }

    pub async fn chat_read(&self, user_id: Uuid, chat_id: Uuid) {
        self.trigger(EventKind::ChatRead { user_id, chat_id }, true)
            .await;
    }

    pub async fn match_created(&self, user_a: Uuid, user_b: Uuid) {
        self.trigger(EventKind::MatchCreated { user_a, user_b }, true)
            .await;
    }

    pub async fn story_posted(&self, user_id: Uuid) {
        self.trigger(EventKind::StoryPosted { user_id }, true).await;
    }

    pub async fn logout(&self, user_id: Uuid) {
        self.trigger(EventKind::Logout { user_id }, true).await;
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use crate::cache::disk::DiskCache;
    use crate::cache::hybrid::HybridCache;
    use crate::cache::keys::CacheKey;
    use crate::infra::store::MemoryStore;

    use super::*;

    fn trigger() -> (Arc<HybridCache>, CacheTrigger) {
        let store = Arc::new(MemoryStore::new());
        let disk = Arc::new(DiskCache::new(store, 24 * 60 * 60 * 1000));
        let cache = Arc::new(HybridCache::new(
            disk,
            NonZeroUsize::new(100).unwrap(),
            60 * 60 * 1000,
        ));
        let queue = Arc::new(EventQueue::new());
        let consumer = Arc::new(CacheConsumer::new(cache.clone(), queue.clone(), 50));
        (cache, CacheTrigger::new(queue, consumer))
    }

    #[tokio::test]
    async fn convenience_method_invalidates_immediately() {
        let (cache, trigger) = trigger();
        let user = Uuid::new_v4();
        let key = CacheKey::UserStories(user).to_string();
        cache.set(&key, &"reel", 0);

        trigger.story_posted(user).await;

        assert!(cache.get::<String>(&key).await.is_none());
    }

    #[tokio::test]
    async fn deferred_trigger_waits_for_consumer() {
        let (cache, trigger) = trigger();
        let user = Uuid::new_v4();
        let key = CacheKey::UserStories(user).to_string();
        cache.set(&key, &"reel", 0);

        trigger
            .trigger(EventKind::StoryPosted { user_id: user }, false)
            .await;

        // Not consumed yet.
        assert_eq!(cache.get::<String>(&key).await.as_deref(), Some("reel"));
    }
}
