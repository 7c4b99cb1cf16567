//! Feed and story caches.
//!
//! The main feed is an envelope-synced, newest-first collection. Every sync
//! first resolves the viewer's blocklist; an envelope fetched under a
//! different exclusion set is discarded and replaced by a full fetch, so a
//! freshly blocked user's items can never be served from cache. When the
//! blocklist itself cannot be resolved, the last known feed is served
//! rather than refetching unfiltered.
//!
//! Location queries depend on a point and radius, so their results are not
//! envelope-cached; they always hit the remote store.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::cache::{CacheKey, HybridCache, KeyLocks};
use crate::domain::entities::{FeedItem, SyncOutcome};
use crate::domain::types::SyncSource;
use crate::remote::{FeedRemote, FeedRow};

use super::blocklist::BlocklistCache;
use super::sync::{SyncEnvelope, frontier_of, merge_newest_first, same_exclusions};

const SOURCE: &str = "application::feed";

#[derive(Debug, Clone, Copy)]
pub struct FeedLimits {
    pub delta: usize,
    pub full: usize,
    pub retain: usize,
}

pub struct FeedCache {
    cache: Arc<HybridCache>,
    remote: Arc<dyn FeedRemote>,
    blocklist: Arc<BlocklistCache>,
    locks: Arc<KeyLocks>,
    limits: FeedLimits,
    feed_ttl_ms: i64,
    stories_ttl_ms: i64,
    stories_limit: usize,
}

impl FeedCache {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: Arc<HybridCache>,
        remote: Arc<dyn FeedRemote>,
        blocklist: Arc<BlocklistCache>,
        locks: Arc<KeyLocks>,
        limits: FeedLimits,
        feed_ttl_ms: i64,
        stories_ttl_ms: i64,
        stories_limit: usize,
    ) -> Self {
        Self {
            cache,
            remote,
            blocklist,
            locks,
            limits,
            feed_ttl_ms,
            stories_ttl_ms,
            stories_limit,
        }
    }

    fn to_item(row: FeedRow) -> FeedItem {
        FeedItem {
            id: row.id,
            author_id: row.author_id,
            media_path: row.media_path,
            caption: row.caption,
            posted_at_ms: row.posted_at_ms,
        }
    }

    /// The viewer's feed, newest first, synced incrementally.
    pub async fn feed_with_sync(&self, viewer: Uuid) -> SyncOutcome<FeedItem> {
        let excluded = match self.blocklist.blocked_users(viewer).await {
            Ok(excluded) => excluded,
            Err(err) => {
                warn!(%viewer, error = %err, source = SOURCE, "Blocklist unavailable, serving last known feed");
                return self.last_known(viewer).await;
            }
        };

        let key = CacheKey::Feed(viewer).to_string();
        let _guard = self.locks.acquire(&key).await;

        let envelope = self
            .cache
            .get::<SyncEnvelope<FeedItem>>(&key)
            .await
            .filter(|envelope| same_exclusions(&envelope.excluded_users, &excluded));

        let Some(envelope) = envelope else {
            return match self
                .remote
                .feed_page(viewer, &excluded, self.limits.full)
                .await
            {
                Ok(rows) => {
                    let items: Vec<FeedItem> = rows.into_iter().map(Self::to_item).collect();
                    self.store(&key, items.clone(), excluded);
                    SyncOutcome {
                        has_new_items: !items.is_empty(),
                        items,
                        source: SyncSource::Fresh,
                    }
                }
                Err(err) => {
                    warn!(%viewer, error = %err, source = SOURCE, "Feed fetch failed");
                    SyncOutcome::empty()
                }
            };
        };

        let delta = match self
            .remote
            .feed_since(viewer, &excluded, envelope.frontier_ms, self.limits.delta)
            .await
        {
            Ok(rows) => rows.into_iter().map(Self::to_item).collect::<Vec<_>>(),
            Err(err) => {
                warn!(%viewer, error = %err, source = SOURCE, "Feed delta failed, serving cache");
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
            |item| item.posted_at_ms,
        );
        if !has_new {
            // Only the boundary item came back; nothing actually changed.
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

    /// Last cached feed, whatever exclusion set it was fetched under.
    /// Refetching without a trusted blocklist could serve blocked authors.
    async fn last_known(&self, viewer: Uuid) -> SyncOutcome<FeedItem> {
        let key = CacheKey::Feed(viewer).to_string();
        match self.cache.get::<SyncEnvelope<FeedItem>>(&key).await {
            Some(envelope) => SyncOutcome {
                items: envelope.items,
                has_new_items: false,
                source: SyncSource::Cache,
            },
            None => SyncOutcome::empty(),
        }
    }

    fn store(&self, key: &str, items: Vec<FeedItem>, excluded: Vec<Uuid>) {
        let frontier = frontier_of(&items, |item| item.posted_at_ms);
        let envelope = SyncEnvelope::new(items, frontier, excluded);
        self.cache.set(key, &envelope, self.feed_ttl_ms);
    }

    /// Feed rows near a point. Results are point-dependent and bypass the
    /// envelope cache.
    pub async fn feed_by_location(
        &self,
        viewer: Uuid,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> SyncOutcome<FeedItem> {
        let excluded = match self.blocklist.blocked_users(viewer).await {
            Ok(excluded) => excluded,
            Err(err) => {
                warn!(%viewer, error = %err, source = SOURCE, "Blocklist unavailable, skipping location fetch");
                return SyncOutcome::empty();
            }
        };

        match self
            .remote
            .feed_within_radius(
                viewer,
                &excluded,
                latitude,
                longitude,
                radius_km,
                self.limits.full,
            )
            .await
        {
            Ok(rows) => {
                let items: Vec<FeedItem> = rows.into_iter().map(Self::to_item).collect();
                SyncOutcome {
                    has_new_items: !items.is_empty(),
                    items,
                    source: SyncSource::Fresh,
                }
            }
            Err(err) => {
                warn!(%viewer, error = %err, source = SOURCE, "Location feed fetch failed");
                SyncOutcome::empty()
            }
        }
    }

    /// One author's story reel, cached whole under a medium TTL.
    pub async fn user_stories(&self, author: Uuid) -> Vec<FeedItem> {
        let key = CacheKey::UserStories(author).to_string();
        if let Some(cached) = self.cache.get::<Vec<FeedItem>>(&key).await {
            return cached;
        }

        match self.remote.user_stories(author, self.stories_limit).await {
            Ok(rows) => {
                let items: Vec<FeedItem> = rows.into_iter().map(Self::to_item).collect();
                self.cache.set(&key, &items, self.stories_ttl_ms);
                items
            }
            Err(err) => {
                warn!(%author, error = %err, source = SOURCE, "Story fetch failed");
                Vec::new()
            }
        }
    }

    pub async fn invalidate_user_stories(&self, author: Uuid) {
        self.cache
            .delete(&CacheKey::UserStories(author).to_string())
            .await;
    }
}
