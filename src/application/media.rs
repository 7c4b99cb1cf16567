//! Signed media URL cache.
//!
//! Signed URLs are requested with more lifetime than the cache TTL and are
//! refreshed once they fall inside the regeneration buffer, so a URL served
//! from cache always has at least the buffer's worth of validity left. When
//! the signer is unreachable, a stale-but-present URL beats none at all.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::cache::{CacheKey, HybridCache};
use crate::domain::entities::CachedMediaUrl;
use crate::remote::MediaRemote;
use crate::util::clock::now_millis;

const SOURCE: &str = "application::media";

pub struct MediaUrlCache {
    cache: Arc<HybridCache>,
    remote: Arc<dyn MediaRemote>,
    ttl_ms: i64,
    expiry_buffer_ms: i64,
}

impl MediaUrlCache {
    pub fn new(
        cache: Arc<HybridCache>,
        remote: Arc<dyn MediaRemote>,
        ttl_ms: i64,
        expiry_buffer_ms: i64,
    ) -> Self {
        Self {
            cache,
            remote,
            ttl_ms,
            expiry_buffer_ms,
        }
    }

    fn key(bucket: &str, path: &str) -> String {
        CacheKey::MediaUrl {
            bucket: bucket.to_string(),
            path: path.to_string(),
        }
        .to_string()
    }

    /// Signed URLs last longer than the cache entry so a cached URL is
    /// usable for its whole cache lifetime plus the buffer.
    fn sign_lifetime_ms(&self) -> i64 {
        self.ttl_ms + self.expiry_buffer_ms
    }

    fn usable(&self, cached: &CachedMediaUrl, now: i64) -> bool {
        cached.expires_at_ms - now > self.expiry_buffer_ms
    }

    /// A signed URL for one object.
    pub async fn signed_url(&self, bucket: &str, path: &str) -> Option<String> {
        self.signed_urls(bucket, std::slice::from_ref(&path.to_string()))
            .await
            .remove(path)
    }

    /// Signed URLs for a batch of objects. Cached URLs with enough lifetime
    /// left are served directly; the rest go to the signer in one round
    /// trip. Objects the signer fails to sign are absent from the result.
    pub async fn signed_urls(&self, bucket: &str, paths: &[String]) -> HashMap<String, String> {
        let now = now_millis();
        let mut resolved = HashMap::new();
        let mut missing = Vec::new();
        let mut stale = HashMap::new();

        for path in paths {
            let key = Self::key(bucket, path);
            match self.cache.get::<CachedMediaUrl>(&key).await {
                Some(cached) if self.usable(&cached, now) => {
                    resolved.insert(path.clone(), cached.url);
                }
                Some(cached) => {
                    // Inside the buffer; refresh, but keep as a fallback.
                    stale.insert(path.clone(), cached.url);
                    missing.push(path.clone());
                }
                None => missing.push(path.clone()),
            }
        }

        if missing.is_empty() {
            return resolved;
        }

        match self
            .remote
            .signed_urls(bucket, &missing, self.sign_lifetime_ms())
            .await
        {
            Ok(rows) => {
                for row in rows {
                    let key = Self::key(bucket, &row.path);
                    let cached = CachedMediaUrl {
                        url: row.url.clone(),
                        expires_at_ms: row.expires_at_ms,
                    };
                    self.cache.set(&key, &cached, self.ttl_ms);
                    resolved.insert(row.path, row.url);
                }
            }
            Err(err) => {
                warn!(bucket, error = %err, source = SOURCE, "Signer unavailable, serving stale URLs");
                resolved.extend(stale);
            }
        }

        resolved
    }

    /// Permanent public URL for an object; no signing, no caching.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        self.remote.public_url(bucket, path)
    }

    pub async fn invalidate(&self, bucket: &str, path: &str) {
        self.cache.delete(&Self::key(bucket, path)).await;
    }
}
