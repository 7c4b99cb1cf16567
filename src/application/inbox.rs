//! Inbox cache.
//!
//! The inbox is the list of chat summaries ordered by last activity, with
//! an aggregate unread count. Summaries merge by chat id (a chat appears
//! once, the fresher summary wins) and the total unread count is recomputed
//! from the summaries on every mutation, never patched incrementally.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::cache::{CacheKey, HybridCache, KeyLocks};
use crate::domain::entities::{ChatSummary, InboxOutcome};
use crate::domain::types::SyncSource;
use crate::remote::{ChatSummaryRow, InboxRemote};

use super::blocklist::BlocklistCache;
use super::sync::{SyncEnvelope, frontier_of, same_exclusions};

const SOURCE: &str = "application::inbox";

fn total_unread(chats: &[ChatSummary]) -> u32 {
    chats.iter().map(|chat| chat.unread_count).sum()
}

fn sort_by_activity(chats: &mut [ChatSummary]) {
    chats.sort_by_key(|chat| std::cmp::Reverse(chat.last_activity_ms));
}

pub struct InboxCache {
    cache: Arc<HybridCache>,
    remote: Arc<dyn InboxRemote>,
    blocklist: Arc<BlocklistCache>,
    locks: Arc<KeyLocks>,
    ttl_ms: i64,
}

impl InboxCache {
    pub fn new(
        cache: Arc<HybridCache>,
        remote: Arc<dyn InboxRemote>,
        blocklist: Arc<BlocklistCache>,
        locks: Arc<KeyLocks>,
        ttl_ms: i64,
    ) -> Self {
        Self {
            cache,
            remote,
            blocklist,
            locks,
            ttl_ms,
        }
    }

    fn to_summary(row: ChatSummaryRow) -> ChatSummary {
        ChatSummary {
            chat_id: row.chat_id,
            other_user_id: row.other_user_id,
            other_user_name: row.other_user_name,
            last_message: row.last_message,
            last_activity_ms: row.last_activity_ms,
            unread_count: row.unread_count,
        }
    }

    /// The user's inbox, synced incrementally by chat id.
    pub async fn inbox_with_sync(&self, user_id: Uuid) -> InboxOutcome {
        let excluded = match self.blocklist.blocked_users(user_id).await {
            Ok(excluded) => excluded,
            Err(err) => {
                warn!(%user_id, error = %err, source = SOURCE, "Blocklist unavailable, serving last known inbox");
                return self.last_known(user_id).await;
            }
        };

        let key = CacheKey::Inbox(user_id).to_string();
        let _guard = self.locks.acquire(&key).await;

        let envelope = self
            .cache
            .get::<SyncEnvelope<ChatSummary>>(&key)
            .await
            .filter(|envelope| same_exclusions(&envelope.excluded_users, &excluded));

        let Some(envelope) = envelope else {
            return match self.remote.chat_summaries(user_id, &excluded).await {
                Ok(rows) => {
                    let mut chats: Vec<ChatSummary> =
                        rows.into_iter().map(Self::to_summary).collect();
                    sort_by_activity(&mut chats);
                    self.store(&key, chats.clone(), excluded);
                    InboxOutcome {
                        total_unread_count: total_unread(&chats),
                        chats,
                        source: SyncSource::Fresh,
                    }
                }
                Err(err) => {
                    warn!(%user_id, error = %err, source = SOURCE, "Inbox fetch failed");
                    InboxOutcome::empty()
                }
            };
        };

        let delta = match self
            .remote
            .chat_summaries_since(user_id, &excluded, envelope.frontier_ms)
            .await
        {
            Ok(rows) => rows.into_iter().map(Self::to_summary).collect::<Vec<_>>(),
            Err(err) => {
                warn!(%user_id, error = %err, source = SOURCE, "Inbox delta failed, serving cache");
                return InboxOutcome {
                    total_unread_count: total_unread(&envelope.items),
                    chats: envelope.items,
                    source: SyncSource::Cache,
                };
            }
        };

        if delta.is_empty() {
            return InboxOutcome {
                total_unread_count: total_unread(&envelope.items),
                chats: envelope.items,
                source: SyncSource::Cache,
            };
        }

        // Merge by chat id: a delta summary supersedes the cached one.
        let mut merged = envelope.items;
        let mut has_new = false;
        for summary in delta {
            match merged.iter_mut().find(|c| c.chat_id == summary.chat_id) {
                Some(existing) => {
                    if *existing != summary {
                        has_new = true;
                    }
                    *existing = summary;
                }
                None => {
                    has_new = true;
                    merged.push(summary);
                }
            }
        }
        sort_by_activity(&mut merged);
        if !has_new {
            // Every delta summary matched its cached counterpart.
            return InboxOutcome {
                total_unread_count: total_unread(&merged),
                chats: merged,
                source: SyncSource::Cache,
            };
        }
        self.store(&key, merged.clone(), excluded);
        InboxOutcome {
            total_unread_count: total_unread(&merged),
            chats: merged,
            source: SyncSource::CacheFresh,
        }
    }

    /// Last cached inbox, whatever exclusion set it was fetched under.
    /// Refetching without a trusted blocklist could surface blocked chats.
    async fn last_known(&self, user_id: Uuid) -> InboxOutcome {
        let key = CacheKey::Inbox(user_id).to_string();
        match self.cache.get::<SyncEnvelope<ChatSummary>>(&key).await {
            Some(envelope) => InboxOutcome {
                total_unread_count: total_unread(&envelope.items),
                chats: envelope.items,
                source: SyncSource::Cache,
            },
            None => InboxOutcome::empty(),
        }
    }

    fn store(&self, key: &str, chats: Vec<ChatSummary>, excluded: Vec<Uuid>) {
        let frontier = frontier_of(&chats, |chat| chat.last_activity_ms);
        let envelope = SyncEnvelope::new(chats, frontier, excluded);
        self.cache.set(key, &envelope, self.ttl_ms);
    }

    /// Replace or insert one chat's summary in the cached inbox.
    pub async fn update_chat_in_cache(&self, user_id: Uuid, summary: ChatSummary) {
        let key = CacheKey::Inbox(user_id).to_string();
        let _guard = self.locks.acquire(&key).await;

        let Some(mut envelope) = self.cache.get::<SyncEnvelope<ChatSummary>>(&key).await else {
            return;
        };
        match envelope
            .items
            .iter_mut()
            .find(|c| c.chat_id == summary.chat_id)
        {
            Some(existing) => *existing = summary,
            None => envelope.items.push(summary),
        }
        sort_by_activity(&mut envelope.items);
        let items = envelope.items;
        self.store(&key, items, envelope.excluded_users);
    }

    /// Zero one chat's unread count in the cached inbox.
    pub async fn mark_chat_read_in_cache(&self, user_id: Uuid, chat_id: Uuid) {
        let key = CacheKey::Inbox(user_id).to_string();
        let _guard = self.locks.acquire(&key).await;

        let Some(mut envelope) = self.cache.get::<SyncEnvelope<ChatSummary>>(&key).await else {
            return;
        };
        let Some(chat) = envelope.items.iter_mut().find(|c| c.chat_id == chat_id) else {
            return;
        };
        chat.unread_count = 0;
        let items = envelope.items;
        self.store(&key, items, envelope.excluded_users);
    }

    pub async fn invalidate_inbox(&self, user_id: Uuid) {
        self.cache
            .delete(&CacheKey::Inbox(user_id).to_string())
            .await;
    }
}
