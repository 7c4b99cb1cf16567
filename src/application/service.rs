//! Composition root for the cache subsystem.
//!
//! Wires the persistent store, both cache tiers, the per-key locks, the
//! invalidation pipeline, and every domain cache into one [`CacheStack`].

use std::sync::Arc;

use crate::cache::{
    CacheConsumer, CacheTrigger, DiskCache, DiskCacheStats, EventQueue, HybridCache,
    HybridCacheStats, KeyLocks,
};
use crate::config::CacheSettings;
use crate::infra::store::PersistentStore;
use crate::remote::{
    BlocksRemote, ChatsRemote, FeedRemote, InboxRemote, MediaRemote, NotificationsRemote,
    ProfilesRemote,
};

use super::blocklist::BlocklistCache;
use super::chat::ChatCache;
use super::feed::{FeedCache, FeedLimits};
use super::inbox::InboxCache;
use super::media::MediaUrlCache;
use super::notifications::{NotificationCache, NotificationLimits};
use super::profile::ProfileCache;

/// Remote repositories the domain caches read through.
#[derive(Clone)]
pub struct RemoteStores {
    pub profiles: Arc<dyn ProfilesRemote>,
    pub blocks: Arc<dyn BlocksRemote>,
    pub chats: Arc<dyn ChatsRemote>,
    pub feed: Arc<dyn FeedRemote>,
    pub inbox: Arc<dyn InboxRemote>,
    pub notifications: Arc<dyn NotificationsRemote>,
    pub media: Arc<dyn MediaRemote>,
}

/// Snapshot of both tiers for debugging.
#[derive(Debug, Clone)]
pub struct CacheStackStats {
    pub memory: HybridCacheStats,
    pub disk: DiskCacheStats,
}

/// The fully wired cache subsystem.
pub struct CacheStack {
    cache: Arc<HybridCache>,
    pub profiles: ProfileCache,
    pub blocklist: Arc<BlocklistCache>,
    pub chats: ChatCache,
    pub feed: FeedCache,
    pub inbox: InboxCache,
    pub notifications: NotificationCache,
    pub media: MediaUrlCache,
    pub events: Arc<EventQueue>,
    pub trigger: CacheTrigger,
}

impl CacheStack {
    pub fn new(
        settings: &CacheSettings,
        store: Arc<dyn PersistentStore>,
        remotes: RemoteStores,
    ) -> Self {
        let disk = Arc::new(DiskCache::new(store, settings.daily_cleanup_interval_ms));
        let cache = Arc::new(HybridCache::new(
            disk,
            settings.memory_capacity_non_zero(),
            settings.repopulate_ttl_ms,
        ));
        let locks = Arc::new(KeyLocks::new());
        let events = Arc::new(EventQueue::new());
        let consumer = Arc::new(CacheConsumer::new(
            cache.clone(),
            events.clone(),
            settings.consume_batch_limit,
        ));
        let trigger = CacheTrigger::new(events.clone(), consumer);

        let blocklist = Arc::new(BlocklistCache::new(
            cache.clone(),
            remotes.blocks,
            settings.blocklist_ttl_ms,
        ));

        Self {
            profiles: ProfileCache::new(
                cache.clone(),
                remotes.profiles,
                remotes.media.clone(),
                locks.clone(),
                settings.profile_ttl_ms,
            ),
            chats: ChatCache::new(
                cache.clone(),
                remotes.chats,
                locks.clone(),
                settings.chat_page_limit,
                settings.chat_retain,
            ),
            feed: FeedCache::new(
                cache.clone(),
                remotes.feed,
                blocklist.clone(),
                locks.clone(),
                FeedLimits {
                    delta: settings.feed_delta_limit,
                    full: settings.feed_full_limit,
                    retain: settings.feed_retain,
                },
                settings.feed_ttl_ms,
                settings.stories_ttl_ms,
                settings.stories_limit,
            ),
            inbox: InboxCache::new(
                cache.clone(),
                remotes.inbox,
                blocklist.clone(),
                locks.clone(),
                settings.inbox_ttl_ms,
            ),
            notifications: NotificationCache::new(
                cache.clone(),
                remotes.notifications,
                blocklist.clone(),
                locks,
                NotificationLimits {
                    delta: settings.notification_delta_limit,
                    full: settings.notification_full_limit,
                    retain: settings.notification_retain,
                },
                settings.notification_ttl_ms,
            ),
            media: MediaUrlCache::new(
                cache.clone(),
                remotes.media,
                settings.media_ttl_ms,
                settings.media_expiry_buffer_ms,
            ),
            blocklist,
            events,
            trigger,
            cache,
        }
    }

    /// Direct access to the underlying two-tier cache.
    pub fn cache(&self) -> &Arc<HybridCache> {
        &self.cache
    }

    /// Run the rolling expired-entry sweep if it is due. Returns whether a
    /// sweep ran.
    pub async fn perform_daily_cleanup(&self) -> bool {
        self.cache.disk().perform_daily_cleanup().await
    }

    pub async fn stats(&self) -> CacheStackStats {
        CacheStackStats {
            memory: self.cache.stats(),
            disk: self.cache.disk().stats().await,
        }
    }
}
