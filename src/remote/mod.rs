//! Remote store boundary: typed per-domain repositories.
//!
//! The backend is treated as a black box supplying rows and accepting
//! writes. Each trait covers exactly the queries one domain cache needs;
//! delta queries take a frontier timestamp (inclusive `>=`, newest first,
//! bounded limit) and the merge layer dedupes by record id, so a timestamp
//! tie can neither skip nor duplicate a record.
//!
//! Join results arrive in whatever shape the backend's query layer
//! produces; [`ChatSummaryRow::from_join_value`] normalizes them into a
//! fixed record before they enter any cache.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use time::Date;
use uuid::Uuid;

use crate::domain::types::NotificationKind;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("query rejected: {message}")]
    Query { message: String },
    #[error("malformed row: {message}")]
    MalformedRow { message: String },
}

impl RemoteError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    pub fn malformed_row(message: impl Into<String>) -> Self {
        Self::MalformedRow {
            message: message.into(),
        }
    }
}

// ============================================================================
// Row shapes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub name: String,
    pub username: String,
    pub about_me: Option<String>,
    pub birthdate: Option<Date>,
    /// Storage-relative picture path, e.g. `users/<id>/avatar.jpg`.
    pub picture_path: Option<String>,
    pub role: crate::domain::types::ProfileRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRow {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub sent_at_ms: i64,
    pub read: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub media_path: String,
    pub caption: Option<String>,
    pub posted_at_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRow {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub kind: NotificationKind,
    pub created_at_ms: i64,
    pub read: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatSummaryRow {
    pub chat_id: Uuid,
    pub other_user_id: Uuid,
    pub other_user_name: String,
    pub last_message: Option<String>,
    pub last_activity_ms: i64,
    pub unread_count: u32,
}

impl ChatSummaryRow {
    /// Normalize a joined inbox row into a fixed shape.
    ///
    /// Some query layers return a joined sub-select as a single object,
    /// others as a one-element array. Both are accepted here; anything else
    /// is a malformed row, rejected before it can enter a cache.
    pub fn from_join_value(value: Value) -> Result<Self, RemoteError> {
        let mut row = match value {
            Value::Object(map) => map,
            other => {
                return Err(RemoteError::malformed_row(format!(
                    "expected object row, got {other}"
                )));
            }
        };

        for field in ["other_user", "last_message_row"] {
            if let Some(nested) = row.remove(field) {
                let flattened = match nested {
                    Value::Array(mut items) if items.len() == 1 => items.remove(0),
                    Value::Array(items) => {
                        return Err(RemoteError::malformed_row(format!(
                            "join `{field}` returned {} rows, expected 1",
                            items.len()
                        )));
                    }
                    other => other,
                };
                row.insert(field.to_string(), flattened);
            }
        }

        let other_user = row
            .remove("other_user")
            .ok_or_else(|| RemoteError::malformed_row("missing `other_user` join"))?;
        let last_message = row.remove("last_message_row").unwrap_or(Value::Null);

        #[derive(Deserialize)]
        struct OtherUser {
            user_id: Uuid,
            name: String,
        }
        #[derive(Deserialize)]
        struct LastMessage {
            body: String,
        }

        let other: OtherUser = serde_json::from_value(other_user)
            .map_err(|err| RemoteError::malformed_row(format!("other_user: {err}")))?;
        let last: Option<LastMessage> = match last_message {
            Value::Null => None,
            value => Some(
                serde_json::from_value(value)
                    .map_err(|err| RemoteError::malformed_row(format!("last_message: {err}")))?,
            ),
        };

        #[derive(Deserialize)]
        struct Base {
            chat_id: Uuid,
            last_activity_ms: i64,
            unread_count: u32,
        }
        let base: Base = serde_json::from_value(Value::Object(row))
            .map_err(|err| RemoteError::malformed_row(err.to_string()))?;

        Ok(Self {
            chat_id: base.chat_id,
            other_user_id: other.user_id,
            other_user_name: other.name,
            last_message: last.map(|m| m.body),
            last_activity_ms: base.last_activity_ms,
            unread_count: base.unread_count,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignedUrlRow {
    pub path: String,
    pub url: String,
    pub expires_at_ms: i64,
}

// ============================================================================
// Repository traits
// ============================================================================

#[async_trait]
pub trait ProfilesRemote: Send + Sync {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<ProfileRow>, RemoteError>;
}

#[async_trait]
pub trait BlocksRemote: Send + Sync {
    /// Users blocked by `user_id` (the caller's exclusion set).
    async fn blocked_users(&self, user_id: Uuid) -> Result<Vec<Uuid>, RemoteError>;
}

#[async_trait]
pub trait ChatsRemote: Send + Sync {
    /// The most recent `limit` messages for a chat, oldest first.
    async fn messages_page(
        &self,
        chat_id: Uuid,
        limit: usize,
    ) -> Result<Vec<MessageRow>, RemoteError>;

    /// Messages with `sent_at_ms >= frontier_ms`, oldest first, bounded.
    async fn messages_since(
        &self,
        chat_id: Uuid,
        frontier_ms: i64,
        limit: usize,
    ) -> Result<Vec<MessageRow>, RemoteError>;
}

#[async_trait]
pub trait FeedRemote: Send + Sync {
    /// The newest `limit` feed rows for a viewer, newest first, with the
    /// exclusion set already applied server-side.
    async fn feed_page(
        &self,
        viewer: Uuid,
        excluded: &[Uuid],
        limit: usize,
    ) -> Result<Vec<FeedRow>, RemoteError>;

    /// Rows with `posted_at_ms >= frontier_ms`, newest first, bounded.
    async fn feed_since(
        &self,
        viewer: Uuid,
        excluded: &[Uuid],
        frontier_ms: i64,
        limit: usize,
    ) -> Result<Vec<FeedRow>, RemoteError>;

    /// Rows posted within `radius_km` of a point, newest first, bounded.
    async fn feed_within_radius(
        &self,
        viewer: Uuid,
        excluded: &[Uuid],
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<FeedRow>, RemoteError>;

    /// Ephemeral stories for one author, newest first, bounded.
    async fn user_stories(&self, author: Uuid, limit: usize)
    -> Result<Vec<FeedRow>, RemoteError>;
}

#[async_trait]
pub trait InboxRemote: Send + Sync {
    /// All chat summaries for a user, most recent activity first.
    async fn chat_summaries(
        &self,
        user_id: Uuid,
        excluded: &[Uuid],
    ) -> Result<Vec<ChatSummaryRow>, RemoteError>;

    /// Summaries with `last_activity_ms >= frontier_ms`, most recent first.
    async fn chat_summaries_since(
        &self,
        user_id: Uuid,
        excluded: &[Uuid],
        frontier_ms: i64,
    ) -> Result<Vec<ChatSummaryRow>, RemoteError>;
}

#[async_trait]
pub trait NotificationsRemote: Send + Sync {
    async fn notifications_page(
        &self,
        recipient: Uuid,
        excluded: &[Uuid],
        limit: usize,
    ) -> Result<Vec<NotificationRow>, RemoteError>;

    /// Rows with `created_at_ms >= frontier_ms`, newest first, bounded.
    async fn notifications_since(
        &self,
        recipient: Uuid,
        excluded: &[Uuid],
        frontier_ms: i64,
        limit: usize,
    ) -> Result<Vec<NotificationRow>, RemoteError>;

    async fn mark_read(&self, id: Uuid) -> Result<(), RemoteError>;

    async fn mark_all_read(&self, recipient: Uuid) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait MediaRemote: Send + Sync {
    /// Generate signed, time-limited URLs for a batch of objects in one
    /// round trip.
    async fn signed_urls(
        &self,
        bucket: &str,
        paths: &[String],
        expires_in_ms: i64,
    ) -> Result<Vec<SignedUrlRow>, RemoteError>;

    /// Permanent public URL for an object.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
