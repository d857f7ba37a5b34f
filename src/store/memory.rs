//! In-memory `Store`, for tests and single-process deployments without disk.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::traits::Store;

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(String, String), serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_setting(
        &self,
        scope: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(scope.to_string(), key.to_string())).cloned())
    }

    async fn set_setting(
        &self,
        scope: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert((scope.to_string(), key.to_string()), value.clone());
        Ok(())
    }

    async fn delete_setting(&self, scope: &str, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(&(scope.to_string(), key.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemoryStore::new();
        assert!(store.get_setting("s", "k").await.unwrap().is_none());

        store.set_setting("s", "k", &serde_json::json!(1)).await.unwrap();
        assert_eq!(store.get_setting("s", "k").await.unwrap(), Some(serde_json::json!(1)));
        assert_eq!(store.len().await, 1);

        assert!(store.delete_setting("s", "k").await.unwrap());
        assert!(!store.delete_setting("s", "k").await.unwrap());
        assert_eq!(store.len().await, 0);
    }
}
