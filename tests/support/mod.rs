//! Controllable in-memory remote stores for end-to-end cache tests.

// Each integration test binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use strati::application::RemoteStores;
use strati::domain::types::{NotificationKind, ProfileRole};
use strati::remote::{
    BlocksRemote, ChatSummaryRow, ChatsRemote, FeedRemote, FeedRow, InboxRemote, MediaRemote,
    MessageRow, NotificationRow, NotificationsRemote, ProfileRow, ProfilesRemote, RemoteError,
    SignedUrlRow,
};

fn offline() -> RemoteError {
    RemoteError::unavailable("fake remote offline")
}

/// One fake backend shared by every repository trait. Rows are mutable from
/// tests and `offline` makes every call fail.
#[derive(Default)]
pub struct FakeBackend {
    pub offline: AtomicBool,
    pub profiles: Mutex<HashMap<Uuid, ProfileRow>>,
    pub blocked: Mutex<HashMap<Uuid, Vec<Uuid>>>,
    pub messages: Mutex<Vec<MessageRow>>,
    pub feed: Mutex<Vec<FeedRow>>,
    pub summaries: Mutex<HashMap<Uuid, Vec<ChatSummaryRow>>>,
    pub notifications: Mutex<Vec<NotificationRow>>,
    pub profile_fetches: AtomicUsize,
    pub feed_fetches: AtomicUsize,
    pub feed_deltas: AtomicUsize,
    pub sign_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn gate(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(offline())
        } else {
            Ok(())
        }
    }

    pub fn set_offline(&self, down: bool) {
        self.offline.store(down, Ordering::SeqCst);
    }

    pub fn add_profile(&self, user_id: Uuid, name: &str) -> ProfileRow {
        let row = ProfileRow {
            user_id,
            name: name.to_string(),
            username: name.to_lowercase(),
            about_me: None,
            birthdate: None,
            picture_path: None,
            role: ProfileRole::Member,
        };
        self.profiles.lock().unwrap().insert(user_id, row.clone());
        row
    }

    pub fn add_message(&self, chat_id: Uuid, sender_id: Uuid, sent_at_ms: i64) -> MessageRow {
        let row = MessageRow {
            id: Uuid::new_v4(),
            chat_id,
            sender_id,
            body: format!("m{sent_at_ms}"),
            sent_at_ms,
            read: false,
        };
        self.messages.lock().unwrap().push(row.clone());
        row
    }

    pub fn add_feed_item(&self, author_id: Uuid, posted_at_ms: i64) -> FeedRow {
        let row = FeedRow {
            id: Uuid::new_v4(),
            author_id,
            media_path: format!("{posted_at_ms}.jpg"),
            caption: None,
            posted_at_ms,
        };
        self.feed.lock().unwrap().push(row.clone());
        row
    }

    pub fn add_summary(&self, owner: Uuid, last_activity_ms: i64, unread: u32) -> ChatSummaryRow {
        let row = ChatSummaryRow {
            chat_id: Uuid::new_v4(),
            other_user_id: Uuid::new_v4(),
            other_user_name: "peer".to_string(),
            last_message: None,
            last_activity_ms,
            unread_count: unread,
        };
        self.summaries
            .lock()
            .unwrap()
            .entry(owner)
            .or_default()
            .push(row.clone());
        row
    }

    pub fn add_notification(&self, recipient: Uuid, created_at_ms: i64) -> NotificationRow {
        let row = NotificationRow {
            id: Uuid::new_v4(),
            recipient_id: recipient,
            actor_id: Uuid::new_v4(),
            kind: NotificationKind::Like,
            created_at_ms,
            read: false,
        };
        self.notifications.lock().unwrap().push(row.clone());
        row
    }

    pub fn block(&self, actor: Uuid, target: Uuid) {
        self.blocked
            .lock()
            .unwrap()
            .entry(actor)
            .or_default()
            .push(target);
    }
}

#[async_trait]
impl ProfilesRemote for FakeBackend {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<ProfileRow>, RemoteError> {
        self.gate()?;
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }
}

#[async_trait]
impl BlocksRemote for FakeBackend {
    async fn blocked_users(&self, user_id: Uuid) -> Result<Vec<Uuid>, RemoteError> {
        self.gate()?;
        Ok(self
            .blocked
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChatsRemote for FakeBackend {
    async fn messages_page(
        &self,
        chat_id: Uuid,
        limit: usize,
    ) -> Result<Vec<MessageRow>, RemoteError> {
        self.gate()?;
        let mut rows: Vec<MessageRow> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.chat_id == chat_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.sent_at_ms);
        if rows.len() > limit {
            rows.drain(..rows.len() - limit);
        }
        Ok(rows)
    }

    async fn messages_since(
        &self,
        chat_id: Uuid,
        frontier_ms: i64,
        limit: usize,
    ) -> Result<Vec<MessageRow>, RemoteError> {
        let mut rows = self.messages_page(chat_id, usize::MAX).await?;
        rows.retain(|r| r.sent_at_ms >= frontier_ms);
        rows.truncate(limit);
        Ok(rows)
    }
}

#[async_trait]
impl FeedRemote for FakeBackend {
    async fn feed_page(
        &self,
        _viewer: Uuid,
        excluded: &[Uuid],
        limit: usize,
    ) -> Result<Vec<FeedRow>, RemoteError> {
        self.gate()?;
        self.feed_fetches.fetch_add(1, Ordering::SeqCst);
        let mut rows: Vec<FeedRow> = self
            .feed
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !excluded.contains(&r.author_id))
            .cloned()
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.posted_at_ms));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn feed_since(
        &self,
        viewer: Uuid,
        excluded: &[Uuid],
        frontier_ms: i64,
        limit: usize,
    ) -> Result<Vec<FeedRow>, RemoteError> {
        self.feed_deltas.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.feed_page(viewer, excluded, usize::MAX).await?;
        // feed_page counted this call too; undo the double count.
        self.feed_fetches.fetch_sub(1, Ordering::SeqCst);
        rows.retain(|r| r.posted_at_ms >= frontier_ms);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn feed_within_radius(
        &self,
        viewer: Uuid,
        excluded: &[Uuid],
        _latitude: f64,
        _longitude: f64,
        _radius_km: f64,
        limit: usize,
    ) -> Result<Vec<FeedRow>, RemoteError> {
        self.feed_page(viewer, excluded, limit).await
    }

    async fn user_stories(
        &self,
        author: Uuid,
        limit: usize,
    ) -> Result<Vec<FeedRow>, RemoteError> {
        self.gate()?;
        let mut rows: Vec<FeedRow> = self
            .feed
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.author_id == author)
            .cloned()
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.posted_at_ms));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[async_trait]
impl InboxRemote for FakeBackend {
    async fn chat_summaries(
        &self,
        user_id: Uuid,
        excluded: &[Uuid],
    ) -> Result<Vec<ChatSummaryRow>, RemoteError> {
        self.gate()?;
        Ok(self
            .summaries
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|r| !excluded.contains(&r.other_user_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn chat_summaries_since(
        &self,
        user_id: Uuid,
        excluded: &[Uuid],
        frontier_ms: i64,
    ) -> Result<Vec<ChatSummaryRow>, RemoteError> {
        let mut rows = self.chat_summaries(user_id, excluded).await?;
        rows.retain(|r| r.last_activity_ms >= frontier_ms);
        Ok(rows)
    }
}

#[async_trait]
impl NotificationsRemote for FakeBackend {
    async fn notifications_page(
        &self,
        recipient: Uuid,
        excluded: &[Uuid],
        limit: usize,
    ) -> Result<Vec<NotificationRow>, RemoteError> {
        self.gate()?;
        let mut rows: Vec<NotificationRow> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.recipient_id == recipient && !excluded.contains(&r.actor_id))
            .cloned()
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.created_at_ms));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn notifications_since(
        &self,
        recipient: Uuid,
        excluded: &[Uuid],
        frontier_ms: i64,
        limit: usize,
    ) -> Result<Vec<NotificationRow>, RemoteError> {
        let mut rows = self
            .notifications_page(recipient, excluded, usize::MAX)
            .await?;
        rows.retain(|r| r.created_at_ms >= frontier_ms);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn mark_read(&self, id: Uuid) -> Result<(), RemoteError> {
        self.gate()?;
        if let Some(row) = self
            .notifications
            .lock()
            .unwrap()
            .iter_mut()
            .find(|r| r.id == id)
        {
            row.read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self, recipient: Uuid) -> Result<(), RemoteError> {
        self.gate()?;
        for row in self.notifications.lock().unwrap().iter_mut() {
            if row.recipient_id == recipient {
                row.read = true;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MediaRemote for FakeBackend {
    async fn signed_urls(
        &self,
        bucket: &str,
        paths: &[String],
        expires_in_ms: i64,
    ) -> Result<Vec<SignedUrlRow>, RemoteError> {
        self.gate()?;
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let now = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        Ok(paths
            .iter()
            .map(|path| SignedUrlRow {
                path: path.clone(),
                url: format!("https://cdn.test/{bucket}/{path}?sig=fake"),
                expires_at_ms: now as i64 + expires_in_ms,
            })
            .collect())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://cdn.test/{bucket}/{path}")
    }
}

/// Wire one shared backend into a `RemoteStores`.
pub fn remote_stores(backend: Arc<FakeBackend>) -> RemoteStores {
    RemoteStores {
        profiles: backend.clone(),
        blocks: backend.clone(),
        chats: backend.clone(),
        feed: backend.clone(),
        inbox: backend.clone(),
        notifications: backend.clone(),
        media: backend,
    }
}
