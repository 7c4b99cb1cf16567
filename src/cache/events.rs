//! Cache event system.
//!
//! Defines invalidation events and an in-memory queue connecting write
//! paths to the cache consumer.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::gauge;
use tracing::info;
use uuid::Uuid;

use crate::util::clock::now_millis;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";

const METRIC_QUEUE_LEN: &str = "strati_cache_event_queue_len";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

/// Cache event with idempotency and ordering support.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    /// Monotonic epoch for ordering within this process.
    pub epoch: Epoch,
    /// The type of cache event.
    pub kind: EventKind,
    /// When the event was created, in epoch milliseconds.
    pub timestamp: i64,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: now_millis(),
        }
    }
}

/// Domain mutations that require cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    // Profiles
    /// A user edited their own profile.
    ProfileEdited { user_id: Uuid },

    // Blocking
    /// `actor_id` blocked `target_id`.
    UserBlocked { actor_id: Uuid, target_id: Uuid },
    /// `actor_id` unblocked `target_id`.
    UserUnblocked { actor_id: Uuid, target_id: Uuid },

    // Messaging
    /// A message landed in `chat_id`.
    MessageSent {
        chat_id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
    },
    /// `user_id` opened `chat_id` and read its messages.
    ChatRead { user_id: Uuid, chat_id: Uuid },

    // Matching
    /// Two users matched.
    MatchCreated { user_a: Uuid, user_b: Uuid },

    // Stories
    /// `user_id` posted a new story.
    StoryPosted { user_id: Uuid },

    // Session
    /// The user signed out; every cache namespace must go.
    Logout { user_id: Uuid },
}

/// In-memory event queue for cache invalidation.
///
/// Events are published by write operations and consumed by the cache
/// consumer. The queue uses a mutex for simplicity since contention is
/// expected to be low.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    /// Get the next epoch number.
    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish an event to the queue.
    ///
    /// The event is logged for observability.
    pub fn publish(&self, kind: EventKind) {
        let epoch = self.next_epoch();
        let event = CacheEvent::new(kind.clone(), epoch);

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?kind,
            source = SOURCE,
            "Cache event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        queue.push_back(event);
        gauge!(METRIC_QUEUE_LEN).set(queue.len() as f64);
    }

    /// Drain up to `limit` events from the queue, in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let drained = queue.drain(..count).collect();
        gauge!(METRIC_QUEUE_LEN).set(queue.len() as f64);
        drained
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.queue, SOURCE, "clear").clear();
        gauge!(METRIC_QUEUE_LEN).set(0.0);
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
