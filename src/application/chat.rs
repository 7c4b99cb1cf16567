//! Chat history cache.
//!
//! Message history never expires (TTL 0); it only grows via delta sync and
//! local appends, bounded to the most recent messages. All read-modify-write
//! cycles run under the per-key lock so two concurrent appends cannot lose
//! each other.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::cache::{CacheKey, HybridCache, KeyLocks};
use crate::domain::entities::{ChatMessage, SyncOutcome};
use crate::domain::types::SyncSource;
use crate::remote::{ChatsRemote, MessageRow};

use super::sync::{SyncEnvelope, frontier_of, merge_oldest_first};

const SOURCE: &str = "application::chat";

/// History is pinned in the cache, not expired.
const CHAT_TTL_MS: i64 = 0;

pub struct ChatCache {
    cache: Arc<HybridCache>,
    remote: Arc<dyn ChatsRemote>,
    locks: Arc<KeyLocks>,
    page_limit: usize,
    retain: usize,
}

impl ChatCache {
    pub fn new(
        cache: Arc<HybridCache>,
        remote: Arc<dyn ChatsRemote>,
        locks: Arc<KeyLocks>,
        page_limit: usize,
        retain: usize,
    ) -> Self {
        Self {
            cache,
            remote,
            locks,
            page_limit,
            retain,
        }
    }

    fn to_message(row: MessageRow) -> ChatMessage {
        ChatMessage {
            id: row.id,
            sender_id: row.sender_id,
            body: row.body,
            sent_at_ms: row.sent_at_ms,
            read: row.read,
        }
    }

    /// Messages for a chat, oldest first, synced incrementally.
    ///
    /// With no cached envelope this is a full page fetch; with one, only
    /// messages at or past the frontier are requested and merged. A remote
    /// failure returns the last known messages, or an empty outcome if
    /// there are none.
    pub async fn chat_messages_with_sync(&self, chat_id: Uuid) -> SyncOutcome<ChatMessage> {
        let key = CacheKey::ChatHistory(chat_id).to_string();
        let _guard = self.locks.acquire(&key).await;

        let cached = self.cache.get::<SyncEnvelope<ChatMessage>>(&key).await;

        let Some(envelope) = cached else {
            return match self.remote.messages_page(chat_id, self.page_limit).await {
                Ok(rows) => {
                    let messages: Vec<ChatMessage> =
                        rows.into_iter().map(Self::to_message).collect();
                    self.store(&key, messages.clone());
                    SyncOutcome {
                        has_new_items: !messages.is_empty(),
                        items: messages,
                        source: SyncSource::Fresh,
                    }
                }
                Err(err) => {
                    warn!(%chat_id, error = %err, source = SOURCE, "Chat fetch failed");
                    SyncOutcome::empty()
                }
            };
        };

        let delta = match self
            .remote
            .messages_since(chat_id, envelope.frontier_ms, self.page_limit)
            .await
        {
            Ok(rows) => rows.into_iter().map(Self::to_message).collect::<Vec<_>>(),
            Err(err) => {
                warn!(%chat_id, error = %err, source = SOURCE, "Chat delta failed, serving cache");
                return SyncOutcome {
                    items: envelope.items,
                    has_new_items: false,
                    source: SyncSource::Cache,
                };
            }
        };

        if delta.is_empty() {
            return SyncOutcome {
                items: envelope.items,
                has_new_items: false,
                source: SyncSource::Cache,
            };
        }

        let (merged, has_new) = merge_oldest_first(
            &envelope.items,
            delta,
            self.retain,
            |m| m.id,
            |m| m.sent_at_ms,
        );
        if !has_new {
            // The delta only re-delivered the boundary message.
            return SyncOutcome {
                items: envelope.items,
                has_new_items: false,
                source: SyncSource::Cache,
            };
        }
        self.store(&key, merged.clone());
        SyncOutcome {
            items: merged,
            has_new_items: true,
            source: SyncSource::CacheFresh,
        }
    }

    fn store(&self, key: &str, messages: Vec<ChatMessage>) {
        let frontier = frontier_of(&messages, |m| m.sent_at_ms);
        let envelope = SyncEnvelope::new(messages, frontier, Vec::new());
        self.cache.set(key, &envelope, CHAT_TTL_MS);
    }

    /// Append a locally-sent message without waiting for the next sync.
    pub async fn add_message(&self, chat_id: Uuid, message: ChatMessage) {
        let key = CacheKey::ChatHistory(chat_id).to_string();
        let _guard = self.locks.acquire(&key).await;

        let existing = self
            .cache
            .get::<SyncEnvelope<ChatMessage>>(&key)
            .await
            .map(|envelope| envelope.items)
            .unwrap_or_default();
        let (merged, _) = merge_oldest_first(
            &existing,
            vec![message],
            self.retain,
            |m| m.id,
            |m| m.sent_at_ms,
        );
        self.store(&key, merged);
    }

    /// Replace the cached history outright.
    pub async fn set_chat_messages(&self, chat_id: Uuid, messages: Vec<ChatMessage>) {
        let key = CacheKey::ChatHistory(chat_id).to_string();
        let _guard = self.locks.acquire(&key).await;
        self.store(&key, messages);
    }

    /// Flip the read flag on one cached message. Missing chat or message is
    /// a no-op.
    pub async fn mark_message_read(&self, chat_id: Uuid, message_id: Uuid) {
        let key = CacheKey::ChatHistory(chat_id).to_string();
        let _guard = self.locks.acquire(&key).await;

        let Some(mut envelope) = self.cache.get::<SyncEnvelope<ChatMessage>>(&key).await else {
            return;
        };
        let Some(message) = envelope.items.iter_mut().find(|m| m.id == message_id) else {
            return;
        };
        message.read = true;
        self.cache.set(&key, &envelope, CHAT_TTL_MS);
    }

    pub async fn invalidate_chat(&self, chat_id: Uuid) {
        self.cache
            .delete(&CacheKey::ChatHistory(chat_id).to_string())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::application::test_support::{new_hybrid, new_locks};
    use crate::remote::RemoteError;

    use super::*;

    #[derive(Default)]
    struct FakeChats {
        rows: Mutex<Vec<MessageRow>>,
        fail: AtomicBool,
        full_calls: AtomicUsize,
        delta_calls: AtomicUsize,
    }

    impl FakeChats {
        fn push(&self, chat_id: Uuid, sent_at_ms: i64) -> MessageRow {
            let row = MessageRow {
                id: Uuid::new_v4(),
                chat_id,
                sender_id: Uuid::new_v4(),
                body: format!("message at {sent_at_ms}"),
                sent_at_ms,
                read: false,
            };
            self.rows.lock().unwrap().push(row.clone());
            row
        }
    }

    #[async_trait]
    impl ChatsRemote for FakeChats {
        async fn messages_page(
            &self,
            chat_id: Uuid,
            limit: usize,
        ) -> Result<Vec<MessageRow>, RemoteError> {
            self.full_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(RemoteError::unavailable("offline"));
            }
            let mut rows: Vec<MessageRow> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.chat_id == chat_id)
                .cloned()
                .collect();
            rows.sort_by_key(|r| r.sent_at_ms);
            if rows.len() > limit {
                rows.drain(..rows.len() - limit);
            }
            Ok(rows)
        }

        async fn messages_since(
            &self,
            chat_id: Uuid,
            frontier_ms: i64,
            limit: usize,
        ) -> Result<Vec<MessageRow>, RemoteError> {
            self.delta_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(RemoteError::unavailable("offline"));
            }
            let mut rows: Vec<MessageRow> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.chat_id == chat_id && r.sent_at_ms >= frontier_ms)
                .cloned()
                .collect();
            rows.sort_by_key(|r| r.sent_at_ms);
            rows.truncate(limit);
            Ok(rows)
        }
    }

    fn chats(remote: Arc<FakeChats>) -> ChatCache {
        ChatCache::new(new_hybrid(), remote, new_locks(), 100, 100)
    }

    #[tokio::test]
    async fn first_read_is_a_full_fetch() {
        let remote = Arc::new(FakeChats::default());
        let chat = Uuid::new_v4();
        remote.push(chat, 10);
        remote.push(chat, 20);
        let cache = chats(remote.clone());

        let outcome = cache.chat_messages_with_sync(chat).await;

        assert_eq!(outcome.source, SyncSource::Fresh);
        assert!(outcome.has_new_items);
        assert_eq!(outcome.items.len(), 2);
        assert!(outcome.items[0].sent_at_ms < outcome.items[1].sent_at_ms);
    }

    #[tokio::test]
    async fn unchanged_history_is_served_from_cache() {
        let remote = Arc::new(FakeChats::default());
        let chat = Uuid::new_v4();
        remote.push(chat, 10);
        let cache = chats(remote.clone());

        cache.chat_messages_with_sync(chat).await;
        let outcome = cache.chat_messages_with_sync(chat).await;

        // The boundary message comes back from the delta but is not new,
        // so the read still counts as cache-served.
        assert_eq!(outcome.source, SyncSource::Cache);
        assert!(!outcome.has_new_items);
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(remote.full_calls.load(Ordering::SeqCst), 1);
        assert_eq!(remote.delta_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn new_messages_arrive_via_delta() {
        let remote = Arc::new(FakeChats::default());
        let chat = Uuid::new_v4();
        remote.push(chat, 10);
        let cache = chats(remote.clone());
        cache.chat_messages_with_sync(chat).await;

        remote.push(chat, 30);
        let outcome = cache.chat_messages_with_sync(chat).await;

        assert_eq!(outcome.source, SyncSource::CacheFresh);
        assert!(outcome.has_new_items);
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.items.last().unwrap().sent_at_ms, 30);
    }

    #[tokio::test]
    async fn delta_failure_serves_last_known_history() {
        let remote = Arc::new(FakeChats::default());
        let chat = Uuid::new_v4();
        remote.push(chat, 10);
        let cache = chats(remote.clone());
        cache.chat_messages_with_sync(chat).await;

        remote.fail.store(true, Ordering::SeqCst);
        let outcome = cache.chat_messages_with_sync(chat).await;

        assert_eq!(outcome.source, SyncSource::Cache);
        assert_eq!(outcome.items.len(), 1);
    }

    #[tokio::test]
    async fn full_fetch_failure_is_an_empty_outcome() {
        let remote = Arc::new(FakeChats::default());
        remote.fail.store(true, Ordering::SeqCst);
        let cache = chats(remote);

        let outcome = cache.chat_messages_with_sync(Uuid::new_v4()).await;

        assert!(outcome.items.is_empty());
        assert!(!outcome.has_new_items);
        assert_eq!(outcome.source, SyncSource::Fresh);
    }

    #[tokio::test]
    async fn add_message_appears_without_sync() {
        let remote = Arc::new(FakeChats::default());
        let chat = Uuid::new_v4();
        let cache = chats(remote.clone());
        cache.chat_messages_with_sync(chat).await;

        cache
            .add_message(
                chat,
                ChatMessage {
                    id: Uuid::new_v4(),
                    sender_id: Uuid::new_v4(),
                    body: "hello".into(),
                    sent_at_ms: 99,
                    read: false,
                },
            )
            .await;

        let outcome = cache.chat_messages_with_sync(chat).await;
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].body, "hello");
    }

    #[tokio::test]
    async fn history_is_bounded_to_retain() {
        let remote = Arc::new(FakeChats::default());
        let chat = Uuid::new_v4();
        let cache = ChatCache::new(new_hybrid(), remote.clone(), new_locks(), 100, 5);
        cache.chat_messages_with_sync(chat).await;

        for at in 0..8 {
            cache
                .add_message(
                    chat,
                    ChatMessage {
                        id: Uuid::new_v4(),
                        sender_id: Uuid::new_v4(),
                        body: String::new(),
                        sent_at_ms: at,
                        read: false,
                    },
                )
                .await;
        }

        let outcome = cache.chat_messages_with_sync(chat).await;
        assert_eq!(outcome.items.len(), 5);
        // Oldest messages were trimmed.
        assert_eq!(outcome.items[0].sent_at_ms, 3);
    }

    #[tokio::test]
    async fn mark_message_read_flips_cached_flag() {
        let remote = Arc::new(FakeChats::default());
        let chat = Uuid::new_v4();
        let row = remote.push(chat, 10);
        let cache = chats(remote);
        cache.chat_messages_with_sync(chat).await;

        cache.mark_message_read(chat, row.id).await;

        let outcome = cache.chat_messages_with_sync(chat).await;
        assert!(outcome.items[0].read);
    }

    #[tokio::test]
    async fn concurrent_appends_both_land() {
        let remote = Arc::new(FakeChats::default());
        let chat = Uuid::new_v4();
        let cache = Arc::new(chats(remote));

        let mut handles = Vec::new();
        for at in 0..10 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .add_message(
                        chat,
                        ChatMessage {
                            id: Uuid::new_v4(),
                            sender_id: Uuid::new_v4(),
                            body: String::new(),
                            sent_at_ms: at,
                            read: false,
                        },
                    )
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let outcome = cache.chat_messages_with_sync(chat).await;
        assert_eq!(outcome.items.len(), 10);
    }
}
