//! Cached record shapes produced by merging remote rows with cache metadata.

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::types::{NotificationKind, ProfileRole, SyncSource};

/// A user profile as served from the cache.
///
/// Created on first fetch, invalidated wholesale on any profile edit, and
/// never partially patched except through the explicit update path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedProfile {
    pub user_id: Uuid,
    pub name: String,
    pub username: String,
    pub about_me: Option<String>,
    pub birthdate: Option<Date>,
    /// Absolute picture URL with a cache-busting query parameter, resolved
    /// from the storage-relative path at fetch time.
    pub picture_url: Option<String>,
    pub role: ProfileRole,
}

/// A single chat message. Immutable once delivered, except for the read flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub sent_at_ms: i64,
    pub read: bool,
}

/// One ranked content item in a feed or story strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: Uuid,
    pub author_id: Uuid,
    pub media_path: String,
    pub caption: Option<String>,
    pub posted_at_ms: i64,
}

/// Summary line for one chat in the inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: Uuid,
    pub other_user_id: Uuid,
    pub other_user_name: String,
    pub last_message: Option<String>,
    pub last_activity_ms: i64,
    pub unread_count: u32,
}

/// A notification as cached for one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationItem {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub kind: NotificationKind,
    pub created_at_ms: i64,
    pub read: bool,
}

/// A signed, time-limited media URL with its nominal expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMediaUrl {
    pub url: String,
    pub expires_at_ms: i64,
}

/// Result of a domain-cache read with sync.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome<T> {
    pub items: Vec<T>,
    pub has_new_items: bool,
    pub source: SyncSource,
}

impl<T> SyncOutcome<T> {
    /// Fallback returned when the remote store fails and no cached data is
    /// usable: the caller sees an empty fresh result, never an error.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_new_items: false,
            source: SyncSource::Fresh,
        }
    }
}

/// Inbox view: chat summaries plus the derived total unread count.
#[derive(Debug, Clone, PartialEq)]
pub struct InboxOutcome {
    pub chats: Vec<ChatSummary>,
    pub total_unread_count: u32,
    pub source: SyncSource,
}

impl InboxOutcome {
    pub fn empty() -> Self {
        Self {
            chats: Vec::new(),
            total_unread_count: 0,
            source: SyncSource::Fresh,
        }
    }
}
