//! `Store` trait — the durable key/value capability the engine is given.
//!
//! Values are JSON documents addressed by `(scope, key)`. The conversation
//! engine uses the session id as scope and a fixed namespace as key.

use async_trait::async_trait;

use crate::error::StoreError;

/// Backend-agnostic scoped JSON settings store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch a value. Returns `Ok(None)` if absent.
    async fn get_setting(
        &self,
        scope: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    /// Insert or replace a value.
    async fn set_setting(
        &self,
        scope: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Delete a value. Returns `true` if something was removed.
    async fn delete_setting(&self, scope: &str, key: &str) -> Result<bool, StoreError>;
}
