//! Profile cache.
//!
//! Profiles are cached individually under a short TTL. Picture paths from
//! the remote row are resolved to public URLs at fetch time, with a
//! timestamp query parameter appended so an edited picture is never served
//! from an HTTP-level image cache.

use std::sync::Arc;

use tracing::warn;
use url::Url;
use uuid::Uuid;

use crate::cache::{CacheKey, HybridCache, KeyLocks};
use crate::domain::entities::CachedProfile;
use crate::remote::{MediaRemote, ProfileRow, ProfilesRemote};
use crate::util::clock::now_millis;

const SOURCE: &str = "application::profile";

/// Storage bucket holding profile pictures.
pub const PROFILE_PICTURE_BUCKET: &str = "profile_pictures";

/// Partial update applied to an already-cached profile. `None` fields are
/// left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub about_me: Option<Option<String>>,
    pub picture_url: Option<Option<String>>,
}

pub struct ProfileCache {
    cache: Arc<HybridCache>,
    remote: Arc<dyn ProfilesRemote>,
    media: Arc<dyn MediaRemote>,
    locks: Arc<KeyLocks>,
    ttl_ms: i64,
}

impl ProfileCache {
    pub fn new(
        cache: Arc<HybridCache>,
        remote: Arc<dyn ProfilesRemote>,
        media: Arc<dyn MediaRemote>,
        locks: Arc<KeyLocks>,
        ttl_ms: i64,
    ) -> Self {
        Self {
            cache,
            remote,
            media,
            locks,
            ttl_ms,
        }
    }

    /// Cached profile, fetched on miss. Remote failures degrade to `None`.
    pub async fn get_profile(&self, user_id: Uuid) -> Option<CachedProfile> {
        let key = CacheKey::Profile(user_id).to_string();
        if let Some(cached) = self.cache.get::<CachedProfile>(&key).await {
            return Some(cached);
        }

        let row = match self.remote.fetch_profile(user_id).await {
            Ok(row) => row?,
            Err(err) => {
                warn!(%user_id, error = %err, source = SOURCE, "Profile fetch failed");
                return None;
            }
        };

        let profile = self.resolve_row(row);
        self.cache.set(&key, &profile, self.ttl_ms);
        Some(profile)
    }

    fn resolve_row(&self, row: ProfileRow) -> CachedProfile {
        let picture_url = row
            .picture_path
            .as_deref()
            .map(|path| self.busted_picture_url(path));
        CachedProfile {
            user_id: row.user_id,
            name: row.name,
            username: row.username,
            about_me: row.about_me,
            birthdate: row.birthdate,
            picture_url,
            role: row.role,
        }
    }

    /// Public picture URL with a freshness query parameter.
    fn busted_picture_url(&self, path: &str) -> String {
        let base = self.media.public_url(PROFILE_PICTURE_BUCKET, path);
        match Url::parse(&base) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair("v", &now_millis().to_string());
                url.into()
            }
            Err(err) => {
                warn!(url = %base, error = %err, source = SOURCE, "Unparseable public URL");
                base
            }
        }
    }

    /// Apply a partial edit to the cached copy without a refetch. A miss is
    /// a no-op; the next read fetches the edited profile anyway.
    pub async fn update_cached_profile(&self, user_id: Uuid, patch: ProfilePatch) {
        let key = CacheKey::Profile(user_id).to_string();
        let _guard = self.locks.acquire(&key).await;

        let Some(mut profile) = self.cache.get::<CachedProfile>(&key).await else {
            return;
        };
        if let Some(name) = patch.name {
            profile.name = name;
        }
        if let Some(username) = patch.username {
            profile.username = username;
        }
        if let Some(about_me) = patch.about_me {
            profile.about_me = about_me;
        }
        if let Some(picture_url) = patch.picture_url {
            profile.picture_url = picture_url;
        }
        self.cache.set(&key, &profile, self.ttl_ms);
    }

    pub async fn invalidate_profile(&self, user_id: Uuid) {
        self.cache
            .delete(&CacheKey::Profile(user_id).to_string())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::application::test_support::{new_hybrid, new_locks};
    use crate::domain::types::ProfileRole;
    use crate::remote::RemoteError;

    use super::*;

    struct FakeProfiles {
        row: Option<ProfileRow>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProfilesRemote for FakeProfiles {
        async fn fetch_profile(&self, _user_id: Uuid) -> Result<Option<ProfileRow>, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.row.clone())
        }
    }

    struct FakeMedia;

    #[async_trait]
    impl MediaRemote for FakeMedia {
        async fn signed_urls(
            &self,
            _bucket: &str,
            _paths: &[String],
            _expires_in_ms: i64,
        ) -> Result<Vec<crate::remote::SignedUrlRow>, RemoteError> {
            Err(RemoteError::unavailable("not used"))
        }

        fn public_url(&self, bucket: &str, path: &str) -> String {
            format!("https://cdn.example.com/{bucket}/{path}")
        }
    }

    fn row(user_id: Uuid) -> ProfileRow {
        ProfileRow {
            user_id,
            name: "Alex".into(),
            username: "alex".into(),
            about_me: None,
            birthdate: None,
            picture_path: Some("alex.jpg".into()),
            role: ProfileRole::Member,
        }
    }

    fn profiles(remote: Arc<FakeProfiles>) -> ProfileCache {
        ProfileCache::new(new_hybrid(), remote, Arc::new(FakeMedia), new_locks(), 300_000)
    }

    #[tokio::test]
    async fn fetch_resolves_picture_url_with_cache_buster() {
        let user = Uuid::new_v4();
        let remote = Arc::new(FakeProfiles {
            row: Some(row(user)),
            calls: AtomicUsize::new(0),
        });
        let cache = profiles(remote);

        let profile = cache.get_profile(user).await.unwrap();
        let url = profile.picture_url.unwrap();
        assert!(url.starts_with("https://cdn.example.com/profile_pictures/alex.jpg?v="));
    }

    #[tokio::test]
    async fn second_read_skips_remote() {
        let user = Uuid::new_v4();
        let remote = Arc::new(FakeProfiles {
            row: Some(row(user)),
            calls: AtomicUsize::new(0),
        });
        let cache = profiles(remote.clone());

        cache.get_profile(user).await;
        cache.get_profile(user).await;

        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_user_is_none_and_not_cached() {
        let remote = Arc::new(FakeProfiles {
            row: None,
            calls: AtomicUsize::new(0),
        });
        let cache = profiles(remote.clone());

        assert!(cache.get_profile(Uuid::new_v4()).await.is_none());
        assert!(cache.get_profile(Uuid::new_v4()).await.is_none());
        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn patch_updates_only_named_fields() {
        let user = Uuid::new_v4();
        let remote = Arc::new(FakeProfiles {
            row: Some(row(user)),
            calls: AtomicUsize::new(0),
        });
        let cache = profiles(remote);
        cache.get_profile(user).await;

        cache
            .update_cached_profile(
                user,
                ProfilePatch {
                    name: Some("Alexandra".into()),
                    about_me: Some(Some("hi".into())),
                    ..Default::default()
                },
            )
            .await;

        let profile = cache.get_profile(user).await.unwrap();
        assert_eq!(profile.name, "Alexandra");
        assert_eq!(profile.about_me.as_deref(), Some("hi"));
        assert_eq!(profile.username, "alex");
    }

    #[tokio::test]
    async fn patch_on_missing_entry_is_a_no_op() {
        let remote = Arc::new(FakeProfiles {
            row: None,
            calls: AtomicUsize::new(0),
        });
        let cache = profiles(remote);

        cache
            .update_cached_profile(
                Uuid::new_v4(),
                ProfilePatch {
                    name: Some("ghost".into()),
                    ..Default::default()
                },
            )
            .await;
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let user = Uuid::new_v4();
        let remote = Arc::new(FakeProfiles {
            row: Some(row(user)),
            calls: AtomicUsize::new(0),
        });
        let cache = profiles(remote.clone());

        cache.get_profile(user).await;
        cache.invalidate_profile(user).await;
        cache.get_profile(user).await;

        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
    }
}
