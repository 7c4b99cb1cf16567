//! Notification cache.
//!
//! Notifications are an envelope-synced, newest-first collection like the
//! feed, with one extra wrinkle: read-state mutations go to the remote
//! store first and patch the cache only after the remote write succeeds,
//! so the cache never claims a read that the server lost.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::cache::{CacheKey, HybridCache, KeyLocks};
use crate::domain::entities::{NotificationItem, SyncOutcome};
use crate::domain::types::SyncSource;
use crate::remote::{NotificationRow, NotificationsRemote, RemoteError};

use super::blocklist::BlocklistCache;
use super::sync::{SyncEnvelope, frontier_of, merge_newest_first, same_exclusions};

const SOURCE: &str = "application::notifications";

#[derive(Debug, Clone, Copy)]
pub struct NotificationLimits {
    pub delta: usize,
    pub full: usize,
    pub retain: usize,
}

pub struct NotificationCache {
    cache: Arc<HybridCache>,
    remote: Arc<dyn NotificationsRemote>,
    blocklist: Arc<BlocklistCache>,
    locks: Arc<KeyLocks>,
    limits: NotificationLimits,
    ttl_ms: i64,
}

impl NotificationCache {
    pub fn new(
        cache: Arc<HybridCache>,
        remote: Arc<dyn NotificationsRemote>,
        blocklist: Arc<BlocklistCache>,
        locks: Arc<KeyLocks>,
        limits: NotificationLimits,
        ttl_ms: i64,
    ) -> Self {
        Self {
            cache,
            remote,
            blocklist,
            locks,
            limits,
            ttl_ms,
        }
    }

    fn to_item(row: NotificationRow) -> NotificationItem {
        NotificationItem {
            id: row.id,
            actor_id: row.actor_id,
            kind: row.kind,
            created_at_ms: row.created_at_ms,
            read: row.read,
        }
    }

    /// The user's notifications, newest first, synced incrementally.
    pub async fn notifications_with_sync(&self, user_id: Uuid) -> SyncOutcome<NotificationItem> {
        let excluded = match self.blocklist.blocked_users(user_id).await {
            Ok(excluded) => excluded,
            Err(err) => {
                warn!(%user_id, error = %err, source = SOURCE, "Blocklist unavailable, serving last known notifications");
                return self.last_known(user_id).await;
            }
        };

        let key = CacheKey::Notifications(user_id).to_string();
        let _guard = self.locks.acquire(&key).await;

        let envelope = self
            .cache
            .get::<SyncEnvelope<NotificationItem>>(&key)
            .await
            .filter(|envelope| same_exclusions(&envelope.excluded_users, &excluded));

        let Some(envelope) = envelope else {
            return match self
                .remote
                .notifications_page(user_id, &excluded, self.limits.full)
                .await
            {
                Ok(rows) => {
                    let items: Vec<NotificationItem> =
                        rows.into_iter().map(Self::to_item).collect();
                    self.store(&key, items.clone(), excluded);
                    SyncOutcome {
                        has_new_items: !items.is_empty(),
                        items,
                        source: SyncSource::Fresh,
                    }
                }
                Err(err) => {
                    warn!(%user_id, error = %err, source = SOURCE, "Notification fetch failed");
                    SyncOutcome::empty()
                }
            };
        };

        let delta = match self
            .remote
            .notifications_since(user_id, &excluded, envelope.frontier_ms, self.limits.delta)
            .await
        {
            Ok(rows) => rows.into_iter().map(Self::to_item).collect::<Vec<_>>(),
            Err(err) => {
                warn!(%user_id, error = %err, source = SOURCE, "Notification delta failed, serving cache");
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

        let (merged, has_new) = merge_newest_first(
            &envelope.items,
            delta,
            self.limits.retain,
            |item| item.id,
            |item| item.created_at_ms,
        );
        if !has_new {
            // Only the boundary notification came back.
            return SyncOutcome {
                items: envelope.items,
                has_new_items: false,
                source: SyncSource::Cache,
            };
        }
        self.store(&key, merged.clone(), excluded);
        SyncOutcome {
            items: merged,
            has_new_items: true,
            source: SyncSource::CacheFresh,
        }
    }

    /// Last cached notifications, whatever exclusion set they were fetched
    /// under. Refetching without a trusted blocklist could surface blocked
    /// actors.
    async fn last_known(&self, user_id: Uuid) -> SyncOutcome<NotificationItem> {
        let key = CacheKey::Notifications(user_id).to_string();
        match self
            .cache
            .get::<SyncEnvelope<NotificationItem>>(&key)
            .await
        {
            Some(envelope) => SyncOutcome {
                items: envelope.items,
                has_new_items: false,
                source: SyncSource::Cache,
            },
            None => SyncOutcome::empty(),
        }
    }

    fn store(&self, key: &str, items: Vec<NotificationItem>, excluded: Vec<Uuid>) {
        let frontier = frontier_of(&items, |item| item.created_at_ms);
        let envelope = SyncEnvelope::new(items, frontier, excluded);
        self.cache.set(key, &envelope, self.ttl_ms);
    }

    /// Mark one notification read: remote first, cached copy after.
    pub async fn mark_notification_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<(), RemoteError> {
        self.remote.mark_read(notification_id).await?;

        let key = CacheKey::Notifications(user_id).to_string();
        let _guard = self.locks.acquire(&key).await;
        if let Some(mut envelope) = self.cache.get::<SyncEnvelope<NotificationItem>>(&key).await
            && let Some(item) = envelope
                .items
                .iter_mut()
                .find(|item| item.id == notification_id)
        {
            item.read = true;
            self.cache.set(&key, &envelope, self.ttl_ms);
        }
        Ok(())
    }

    /// Mark everything read: remote first, cached copy after.
    pub async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<(), RemoteError> {
        self.remote.mark_all_read(user_id).await?;

        let key = CacheKey::Notifications(user_id).to_string();
        let _guard = self.locks.acquire(&key).await;
        if let Some(mut envelope) = self.cache.get::<SyncEnvelope<NotificationItem>>(&key).await {
            for item in &mut envelope.items {
                item.read = true;
            }
            self.cache.set(&key, &envelope, self.ttl_ms);
        }
        Ok(())
    }

    pub async fn invalidate_notifications(&self, user_id: Uuid) {
        self.cache
            .delete(&CacheKey::Notifications(user_id).to_string())
            .await;
    }
}
