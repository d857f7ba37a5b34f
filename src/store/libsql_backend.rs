//! libSQL backend — async `Store` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::StoreError;
use crate::store::migrations;
use crate::store::traits::Store;

/// libSQL store backend.
///
/// Holds a single connection reused for all operations.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Open(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Store opened");
        Ok(store)
    }

    /// Create an in-memory database (tests, ephemeral deployments).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl Store for LibSqlStore {
    async fn get_setting(
        &self,
        scope: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT value FROM settings WHERE scope = ?1 AND key = ?2",
                params![scope, key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_setting: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value_str: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("get_setting: {e}")))?;
                let value = serde_json::from_str(&value_str)
                    .map_err(|e| StoreError::Serialization(format!("{scope}/{key}: {e}")))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_setting: {e}"))),
        }
    }

    async fn set_setting(
        &self,
        scope: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let value_str =
            serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO settings (scope, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (scope, key) DO UPDATE SET value = ?3, updated_at = ?4",
                params![scope, key, value_str, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_setting: {e}")))?;

        Ok(())
    }

    async fn delete_setting(&self, scope: &str, key: &str) -> Result<bool, StoreError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM settings WHERE scope = ?1 AND key = ?2",
                params![scope, key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("delete_setting: {e}")))?;
        Ok(count > 0)
    }
}
