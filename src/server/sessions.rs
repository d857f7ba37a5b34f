//! SessionRegistry — one `ConversationEngine` per session id.
//!
//! Each engine sits behind its own `tokio::sync::Mutex`. Handlers use
//! `try_lock`, so a second request for a session that is mid-transition is
//! refused instead of queued. That lock is the busy flag.
//!
//! The map is a cache over the store: idle and submitted engines are
//! evicted by a periodic sweep and revived from their snapshot on the next
//! request.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::StoreError;
use crate::intake::{ConversationEngine, EngineDeps, Persistence, Phase};
use crate::store::Store;

pub type SharedEngine = Arc<Mutex<ConversationEngine>>;

/// How often the eviction sweep runs.
pub const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

struct SessionEntry {
    engine: SharedEngine,
    /// Milliseconds since the registry was created.
    last_seen: AtomicU64,
}

impl SessionEntry {
    fn new(engine: SharedEngine, now: u64) -> Self {
        Self {
            engine,
            last_seen: AtomicU64::new(now),
        }
    }

    fn touch(&self, now: u64) {
        self.last_seen.store(now, Ordering::Relaxed);
    }

    fn idle_for(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_seen.load(Ordering::Relaxed))
    }
}

pub struct SessionRegistry {
    deps: EngineDeps,
    store: Arc<dyn Store>,
    namespace: String,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    started: Instant,
}

impl SessionRegistry {
    pub fn new(deps: EngineDeps, store: Arc<dyn Store>, namespace: impl Into<String>) -> Self {
        Self {
            deps,
            store,
            namespace: namespace.into(),
            sessions: RwLock::new(HashMap::new()),
            started: Instant::now(),
        }
    }

    fn persistence(&self, session_id: &str) -> Persistence {
        Persistence::new(Arc::clone(&self.store), self.namespace.clone(), session_id)
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Start a fresh session under a new id.
    pub async fn create(&self) -> (String, SharedEngine) {
        let id = Uuid::new_v4().to_string();
        let engine = ConversationEngine::start(self.deps.clone(), self.persistence(&id)).await;
        let engine = Arc::new(Mutex::new(engine));
        let entry = SessionEntry::new(Arc::clone(&engine), self.now_ms());
        self.sessions.write().await.insert(id.clone(), entry);
        tracing::info!(session = %id, "Session created");
        (id, engine)
    }

    /// Look up a live session, or revive one that only exists in the store.
    ///
    /// A stored value that cannot be parsed still counts as an existing
    /// session: the engine discards it and starts over.
    pub async fn open(&self, id: &str) -> Result<Option<SharedEngine>, StoreError> {
        if let Some(entry) = self.sessions.read().await.get(id) {
            entry.touch(self.now_ms());
            return Ok(Some(Arc::clone(&entry.engine)));
        }

        match self.store.get_setting(id, &self.namespace).await {
            Ok(Some(_)) => {}
            Ok(None) => return Ok(None),
            Err(StoreError::Serialization(reason)) => {
                tracing::warn!(session = %id, reason = %reason, "Stored session unreadable, starting over");
            }
            Err(e) => return Err(e),
        }

        let engine = ConversationEngine::start(self.deps.clone(), self.persistence(id)).await;

        let now = self.now_ms();
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(id.to_string())
            .or_insert_with(|| SessionEntry::new(Arc::new(Mutex::new(engine)), now));
        entry.touch(now);
        tracing::debug!(session = %id, "Session revived from store");
        Ok(Some(Arc::clone(&entry.engine)))
    }

    /// Drop engines nobody is using that have been idle for `max_idle`, or
    /// whose lead has been submitted. Their state stays in the store.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = self.now_ms();
        let max_idle = u64::try_from(max_idle.as_millis()).unwrap_or(u64::MAX);

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            // Someone holds a handle and may be about to lock it.
            if Arc::strong_count(&entry.engine) > 1 {
                return true;
            }
            if entry.idle_for(now) >= max_idle {
                return false;
            }
            match entry.engine.try_lock() {
                Ok(engine) => engine.phase() != Phase::Submitted,
                Err(_) => true,
            }
        });
        before - sessions.len()
    }

    /// Spawn the periodic eviction sweep.
    pub fn spawn_eviction(self: Arc<Self>, every: Duration, max_idle: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                every_secs = every.as_secs(),
                idle_secs = max_idle.as_secs(),
                "Session eviction started"
            );
            let mut tick = tokio::time::interval(every);
            loop {
                tick.tick().await;
                let evicted = self.evict_idle(max_idle).await;
                if evicted > 0 {
                    let remaining = self.len().await;
                    tracing::debug!(evicted, remaining, "Evicted idle sessions");
                }
            }
        })
    }

    /// Number of sessions held in memory.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{ConversationState, FixedCatalogPolicy, StepCatalog};
    use crate::store::{LibSqlStore, MemoryStore};

    const NAMESPACE: &str = "paloma-chat-v2";

    fn registry(store: Arc<dyn Store>) -> SessionRegistry {
        let deps = EngineDeps::new(Arc::new(StepCatalog::standard()), Arc::new(FixedCatalogPolicy));
        SessionRegistry::new(deps, store, NAMESPACE)
    }

    #[tokio::test]
    async fn created_session_can_be_opened() {
        let registry = registry(Arc::new(MemoryStore::new()));
        let (id, engine) = registry.create().await;
        let opened = registry.open(&id).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&engine, &opened));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let registry = registry(Arc::new(MemoryStore::new()));
        assert!(registry.open("nope").await.unwrap().is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn stored_session_is_revived_by_another_registry() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let first = registry(Arc::clone(&store));
        let (id, engine) = first.create().await;
        engine.lock().await.submit("hipertrofia de pernas").await;

        let second = registry(store);
        let revived = second.open(&id).await.unwrap().unwrap();
        assert_eq!(revived.lock().await.state().current_step_index, 1);
    }

    #[tokio::test]
    async fn corrupt_snapshot_restarts_the_session() {
        let libsql = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let id = Uuid::new_v4().to_string();
        libsql
            .conn()
            .execute(
                "INSERT INTO settings (scope, key, value) VALUES (?1, ?2, '{broken')",
                libsql::params![id.as_str(), NAMESPACE],
            )
            .await
            .unwrap();
        let store: Arc<dyn Store> = libsql;

        let registry = registry(Arc::clone(&store));
        let engine = registry.open(&id).await.unwrap().unwrap();
        assert_eq!(engine.lock().await.state().current_step_index, 0);

        // The broken row was overwritten with a fresh snapshot.
        let stored = store.get_setting(&id, NAMESPACE).await.unwrap().unwrap();
        assert_eq!(stored["currentStepIndex"], 0);
        assert!(registry.open(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn concurrent_revivals_share_one_engine() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let (id, _) = registry(Arc::clone(&store)).create().await;

        let registry = registry(store);
        let (a, b) = tokio::join!(registry.open(&id), registry.open(&id));
        let (a, b) = (a.unwrap().unwrap(), b.unwrap().unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn locked_session_reports_busy() {
        let registry = registry(Arc::new(MemoryStore::new()));
        let (_, engine) = registry.create().await;
        let _guard = engine.lock().await;
        assert!(engine.try_lock().is_err());
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_and_revived() {
        let registry = registry(Arc::new(MemoryStore::new()));
        let (id, engine) = registry.create().await;
        engine.lock().await.submit("hipertrofia de pernas").await;
        drop(engine);
        let (_, _other) = registry.create().await;
        assert_eq!(registry.len().await, 2);

        assert_eq!(registry.evict_idle(Duration::ZERO).await, 1);
        assert_eq!(registry.len().await, 1);

        let revived = registry.open(&id).await.unwrap().unwrap();
        assert_eq!(revived.lock().await.state().current_step_index, 1);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn recently_used_sessions_are_kept() {
        let registry = registry(Arc::new(MemoryStore::new()));
        let (_, engine) = registry.create().await;
        drop(engine);
        assert_eq!(registry.evict_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn submitted_sessions_are_evicted_early() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let catalog = StepCatalog::standard();
        let mut state = ConversationState::fresh(&catalog);
        state.current_step_index = catalog.len();
        state.submitted = true;
        Persistence::new(Arc::clone(&store), NAMESPACE, "done")
            .save(&state)
            .await
            .unwrap();

        let registry = registry(store);
        let engine = registry.open("done").await.unwrap().unwrap();
        assert_eq!(engine.lock().await.phase(), Phase::Submitted);
        drop(engine);

        assert_eq!(registry.evict_idle(Duration::from_secs(3600)).await, 1);
        assert!(registry.is_empty().await);
    }
}
