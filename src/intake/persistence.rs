//! Persistence adapter — write-through snapshots of `ConversationState`.
//!
//! Snapshots are stored as one JSON document per session under a fixed
//! namespace key. Each snapshot carries a `version`; older layouts are
//! migrated on load, and anything unreadable is logged and treated as
//! "no snapshot" so the caller starts fresh.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::catalog::StepCatalog;
use super::model::ConversationState;
use crate::error::StoreError;
use crate::store::Store;

/// Default storage key for conversation snapshots.
pub const DEFAULT_NAMESPACE: &str = "paloma-chat-v2";

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u64 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u64,
    #[serde(flatten)]
    state: &'a ConversationState,
}

#[derive(Deserialize)]
struct Snapshot {
    #[allow(dead_code)]
    version: u64,
    #[serde(flatten)]
    state: ConversationState,
}

/// Saves and restores one session's conversation.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn Store>,
    namespace: String,
    session_id: String,
}

impl Persistence {
    pub fn new(store: Arc<dyn Store>, namespace: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Serialize and store the full state.
    pub async fn save(&self, state: &ConversationState) -> Result<(), StoreError> {
        let value = serde_json::to_value(SnapshotRef {
            version: SNAPSHOT_VERSION,
            state,
        })
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store
            .set_setting(&self.session_id, &self.namespace, &value)
            .await
    }

    /// Restore the stored state, if there is a usable one.
    ///
    /// Never fails: store errors, parse errors, unknown versions and
    /// out-of-range step indices are logged and reported as `None`.
    pub async fn load(&self, catalog: &StepCatalog) -> Option<ConversationState> {
        let raw = match self.store.get_setting(&self.session_id, &self.namespace).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(session = %self.session_id, error = %e, "Failed to read conversation snapshot");
                return None;
            }
        };

        match decode_snapshot(raw, catalog) {
            Ok(state) => Some(state),
            Err(reason) => {
                tracing::warn!(
                    session = %self.session_id,
                    reason = %reason,
                    "Discarding conversation snapshot"
                );
                None
            }
        }
    }

    /// Remove the stored snapshot.
    pub async fn clear(&self) -> Result<bool, StoreError> {
        self.store
            .delete_setting(&self.session_id, &self.namespace)
            .await
    }
}

/// Migrate, parse and sanity-check a stored snapshot.
pub fn decode_snapshot(raw: Value, catalog: &StepCatalog) -> Result<ConversationState, String> {
    let migrated = migrate(raw)?;
    let snapshot: Snapshot =
        serde_json::from_value(migrated).map_err(|e| format!("malformed snapshot: {e}"))?;
    let state = snapshot.state;

    if state.current_step_index > catalog.len() {
        return Err(format!(
            "step index {} out of range (catalog has {} steps)",
            state.current_step_index,
            catalog.len()
        ));
    }
    if let Some(ref awaiting) = state.awaiting_follow_up {
        let current = catalog.get(state.current_step_index).map(|s| s.id.as_str());
        if current != Some(awaiting.as_str()) {
            return Err(format!("follow-up for '{awaiting}' does not match current step"));
        }
    }
    Ok(state)
}

/// Bring a snapshot up to `SNAPSHOT_VERSION`.
///
/// Version 0 is the unversioned browser layout: `currentStep`, messages
/// with `from: "ai" | "user"`, and contact `plan` / `consent`.
pub fn migrate(mut raw: Value) -> Result<Value, String> {
    let obj = raw
        .as_object_mut()
        .ok_or_else(|| "snapshot is not a JSON object".to_string())?;

    let version = match obj.get("version") {
        None => 0,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| format!("invalid snapshot version {v}"))?,
    };

    if version > SNAPSHOT_VERSION {
        return Err(format!(
            "snapshot version {version} is newer than supported {SNAPSHOT_VERSION}"
        ));
    }

    if version == 0 {
        rename_key(obj, "currentStep", "currentStepIndex");

        if let Some(Value::Array(messages)) = obj.get_mut("messages") {
            for message in messages.iter_mut() {
                if let Some(m) = message.as_object_mut() {
                    rename_key(m, "from", "sender");
                    if m.get("sender").and_then(Value::as_str) == Some("ai") {
                        m.insert("sender".to_string(), Value::from("assistant"));
                    }
                }
            }
        }

        if let Some(Value::Object(contact)) = obj.get_mut("contact") {
            rename_key(contact, "plan", "planChoice");
            rename_key(contact, "consent", "consentGiven");
        }

        obj.insert("version".to_string(), Value::from(1u64));
    }

    Ok(raw)
}

fn rename_key(obj: &mut serde_json::Map<String, Value>, from: &str, to: &str) {
    if obj.contains_key(to) {
        return;
    }
    if let Some(value) = obj.remove(from) {
        obj.insert(to.to_string(), value);
    }
}
