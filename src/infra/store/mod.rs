//! Persistent key-value stores backing the lowest cache tier.
//!
//! The cache layer depends only on the [`PersistentStore`] shape, not on any
//! specific storage engine. Two adapters ship with the crate: a
//! filesystem-backed store for real deployments and a `DashMap`-backed store
//! for tests and ephemeral profiles.

mod fs;
mod memory;

use async_trait::async_trait;

pub use fs::FsStore;
pub use memory::MemoryStore;

use super::error::InfraError;

/// Durable string key-value store with JSON payloads.
///
/// Implementations must tolerate concurrent calls; each write is a full-key
/// overwrite, never an incremental patch, so a crash mid-write loses at most
/// the key being written.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, InfraError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), InfraError>;

    async fn remove_item(&self, key: &str) -> Result<(), InfraError>;

    async fn all_keys(&self) -> Result<Vec<String>, InfraError>;

    /// Remove a batch of keys. A missing key is not an error.
    async fn remove_many(&self, keys: &[String]) -> Result<(), InfraError>;
}
