//! Cache key namespace.
//!
//! The rendered strings are an external contract (persisted entries must
//! survive crate upgrades and interoperate with other clients), so they are
//! preserved bit-for-bit. New variants get a new namespace segment; existing
//! ones never change.

use std::fmt;

use uuid::Uuid;

/// Reserved housekeeping key recording the last full disk-tier sweep.
pub const DAILY_CLEANUP_KEY: &str = "cache:last_daily_cleanup";

/// Prefixes owned by this crate; `clear_all` and `cleanup` only touch keys
/// under these.
pub const NAMESPACE_PREFIXES: [&str; 2] = ["cache:", "inbox:"];

/// A fully-qualified cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `cache:profiles:<userId>`
    Profile(Uuid),
    /// `cache:chat_history:<chatId>`
    ChatHistory(Uuid),
    /// `cache:notifications:<userId>`
    Notifications(Uuid),
    /// `cache:media_urls:<bucket>:<path>`
    MediaUrl { bucket: String, path: String },
    /// `cache:user_metadata:blocked_users:<userId>`
    BlockedUsers(Uuid),
    /// `cache:feed_data:<userId>`
    Feed(Uuid),
    /// `cache:feed_data:user_stories:<targetUserId>`
    UserStories(Uuid),
    /// `inbox:<userId>`
    Inbox(Uuid),
    /// `cache:last_daily_cleanup`
    DailyCleanup,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Profile(user) => write!(f, "cache:profiles:{user}"),
            CacheKey::ChatHistory(chat) => write!(f, "cache:chat_history:{chat}"),
            CacheKey::Notifications(user) => write!(f, "cache:notifications:{user}"),
            CacheKey::MediaUrl { bucket, path } => write!(f, "cache:media_urls:{bucket}:{path}"),
            CacheKey::BlockedUsers(user) => {
                write!(f, "cache:user_metadata:blocked_users:{user}")
            }
            CacheKey::Feed(user) => write!(f, "cache:feed_data:{user}"),
            CacheKey::UserStories(target) => {
                write!(f, "cache:feed_data:user_stories:{target}")
            }
            CacheKey::Inbox(user) => write!(f, "inbox:{user}"),
            CacheKey::DailyCleanup => f.write_str(DAILY_CLEANUP_KEY),
        }
    }
}

/// Whether a raw key belongs to one of this crate's namespaces.
pub fn is_namespaced(key: &str) -> bool {
    NAMESPACE_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
}

/// Statistics bucket for a raw key: the first namespace segment after the
/// `cache:` prefix, or `inbox` for inbox keys.
pub fn namespace_of(key: &str) -> Option<&str> {
    if let Some(rest) = key.strip_prefix("cache:") {
        return Some(rest.split(':').next().unwrap_or(rest));
    }
    if key.starts_with("inbox:") {
        return Some("inbox");
    }
    None
}
