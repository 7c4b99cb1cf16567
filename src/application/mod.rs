//! Domain caches built on top of the two-tier store, plus the sync
//! protocol they share.

pub mod blocklist;
pub mod chat;
pub mod feed;
pub mod inbox;
pub mod media;
pub mod notifications;
pub mod profile;
pub mod service;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use blocklist::BlocklistCache;
pub use chat::ChatCache;
pub use feed::{FeedCache, FeedLimits};
pub use inbox::InboxCache;
pub use media::MediaUrlCache;
pub use notifications::{NotificationCache, NotificationLimits};
pub use profile::{ProfileCache, ProfilePatch};
pub use service::{CacheStack, CacheStackStats, RemoteStores};
pub use sync::{SyncEnvelope, frontier_of, merge_newest_first, merge_oldest_first, same_exclusions};
