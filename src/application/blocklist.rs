//! Cached exclusion set.
//!
//! The blocklist gates every social read, so it is cached for a short
//! window and consulted before any envelope is trusted. Unlike the other
//! domain caches, a remote failure here is surfaced to the caller: syncing
//! against a wrong exclusion set would leak blocked content.

use std::sync::Arc;

use uuid::Uuid;

use crate::cache::{CacheKey, HybridCache};
use crate::remote::{BlocksRemote, RemoteError};

pub struct BlocklistCache {
    cache: Arc<HybridCache>,
    remote: Arc<dyn BlocksRemote>,
    ttl_ms: i64,
}

impl BlocklistCache {
    pub fn new(cache: Arc<HybridCache>, remote: Arc<dyn BlocksRemote>, ttl_ms: i64) -> Self {
        Self {
            cache,
            remote,
            ttl_ms,
        }
    }

    /// The users `user_id` has blocked, cached for a short window.
    pub async fn blocked_users(&self, user_id: Uuid) -> Result<Vec<Uuid>, RemoteError> {
        let key = CacheKey::BlockedUsers(user_id).to_string();
        if let Some(cached) = self.cache.get::<Vec<Uuid>>(&key).await {
            return Ok(cached);
        }

        let blocked = self.remote.blocked_users(user_id).await?;
        self.cache.set(&key, &blocked, self.ttl_ms);
        Ok(blocked)
    }

    pub async fn invalidate(&self, user_id: Uuid) {
        self.cache
            .delete(&CacheKey::BlockedUsers(user_id).to_string())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::application::test_support::new_hybrid;

    use super::*;

    #[derive(Default)]
    struct FakeBlocks {
        blocked: Vec<Uuid>,
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl BlocksRemote for FakeBlocks {
        async fn blocked_users(&self, _user_id: Uuid) -> Result<Vec<Uuid>, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(RemoteError::unavailable("network down"));
            }
            Ok(self.blocked.clone())
        }
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let remote = Arc::new(FakeBlocks {
            blocked: vec![Uuid::new_v4()],
            ..Default::default()
        });
        let blocklist = BlocklistCache::new(new_hybrid(), remote.clone(), 300_000);
        let user = Uuid::new_v4();

        let first = blocklist.blocked_users(user).await.unwrap();
        let second = blocklist.blocked_users(user).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remote_failure_is_surfaced() {
        let remote = Arc::new(FakeBlocks::default());
        remote.fail.store(true, Ordering::SeqCst);
        let blocklist = BlocklistCache::new(new_hybrid(), remote, 300_000);

        assert!(blocklist.blocked_users(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let remote = Arc::new(FakeBlocks::default());
        let blocklist = BlocklistCache::new(new_hybrid(), remote.clone(), 300_000);
        let user = Uuid::new_v4();

        blocklist.blocked_users(user).await.unwrap();
        blocklist.invalidate(user).await;
        blocklist.blocked_users(user).await.unwrap();

        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
    }
}
