use async_trait::async_trait;
use dashmap::DashMap;

use crate::infra::error::InfraError;

use super::PersistentStore;

/// In-process store for tests and ephemeral profiles.
///
/// Data lives only as long as the process; useful when a caller opts out of
/// durable caching but the tier plumbing should behave identically.
#[derive(Default)]
pub struct MemoryStore {
    items: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, InfraError> {
        Ok(self.items.get(key).map(|entry| entry.value().clone()))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), InfraError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), InfraError> {
        self.items.remove(key);
        Ok(())
    }

    async fn all_keys(&self) -> Result<Vec<String>, InfraError> {
        Ok(self.items.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), InfraError> {
        for key in keys {
            self.items.remove(key);
        }
        Ok(())
    }
}
