//! Session registry
//!
//! Process-wide table mapping a document identifier to its mutable
//! coordinator state. Entries are created by the hydrator on first open and
//! removed when finalization completes; a periodic sweep collects sessions
//! that never received a clean disconnect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::ThreadEntry;

/// Mutable per-document coordinator state.
///
/// One entry exists per open document identifier. `version` is the
/// optimistic-concurrency token sent with every save; it only moves after
/// storage confirms a write.
pub struct DocumentSession {
    /// Opaque storage reference, stable for the document's lifetime
    pub document_id: String,

    /// Optimistic-concurrency token; incremented once per confirmed save
    pub version: u64,

    /// Insertion-ordered mirror of the thread collection, reconciled at
    /// hydration and refreshed at save time
    pub threads: Vec<ThreadEntry>,

    /// Most recent successful snapshot; seeded to hydration time
    pub last_snapshot_time: DateTime<Utc>,

    /// Touched on every hook; drives the stale-session sweep
    pub last_activity: DateTime<Utc>,

    /// Currently attached editing sessions
    pub connections: usize,

    /// At most one outstanding deferred save; debouncing aborts and
    /// replaces it
    pub pending_save: Option<JoinHandle<()>>,

    /// Instance id for log correlation across a document's open/close cycles
    pub instance: Uuid,
}

impl DocumentSession {
    pub fn new(document_id: &str, version: u64, threads: Vec<ThreadEntry>) -> Self {
        let now = Utc::now();
        Self {
            document_id: document_id.to_string(),
            version,
            threads,
            last_snapshot_time: now,
            last_activity: now,
            connections: 0,
            pending_save: None,
            instance: Uuid::new_v4(),
        }
    }

    /// Record hook activity for the stale sweep.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    fn is_stale(&self, max_idle: Duration) -> bool {
        if self.connections > 0 {
            return false;
        }

        Utc::now()
            .signed_duration_since(self.last_activity)
            .to_std()
            .map(|idle| idle > max_idle)
            .unwrap_or(false)
    }

    pub(crate) fn abort_pending_save(&mut self) {
        if let Some(pending) = self.pending_save.take() {
            pending.abort();
        }
    }
}

/// Shared handle to one document's session.
///
/// `state` guards the mutable fields. `save_lock` serializes the save path
/// so a debounced save and a session-end final save cannot interleave their
/// suspension points.
pub struct SessionHandle {
    pub state: Mutex<DocumentSession>,
    pub save_lock: Mutex<()>,
}

impl SessionHandle {
    fn new(session: DocumentSession) -> Self {
        Self {
            state: Mutex::new(session),
            save_lock: Mutex::new(()),
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub open_documents: usize,
    pub total_connections: usize,
    pub pending_saves: usize,
}

impl std::fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Registry Stats: {} open, {} connected, {} saves pending",
            self.open_documents, self.total_connections, self.pending_saves
        )
    }
}

/// Process-wide registry of open document sessions.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Create the session entry for a freshly hydrated document.
    ///
    /// Replaces any existing entry for the identifier, carrying over its
    /// connection count and discarding its pending save.
    pub async fn create(
        &self,
        document_id: &str,
        version: u64,
        threads: Vec<ThreadEntry>,
    ) -> Arc<SessionHandle> {
        let mut sessions = self.sessions.lock().await;
        let mut session = DocumentSession::new(document_id, version, threads);

        if let Some(existing) = sessions.get(document_id) {
            let mut old = existing.state.lock().await;
            warn!(
                "Replacing existing session for '{}' ({} connected)",
                document_id, old.connections
            );
            session.connections = old.connections;
            old.abort_pending_save();
        }

        debug!(
            "Session {} created for '{}' at v{}",
            session.instance, document_id, session.version
        );

        let handle = Arc::new(SessionHandle::new(session));
        sessions.insert(document_id.to_string(), Arc::clone(&handle));
        handle
    }

    /// Get the session for a document, or create a default one.
    ///
    /// Change and connect notifications can arrive for a document whose
    /// hydration never registered state; they fall back to a fresh entry at
    /// version 1 rather than being dropped.
    pub async fn ensure(&self, document_id: &str) -> Arc<SessionHandle> {
        {
            let sessions = self.sessions.lock().await;
            if let Some(handle) = sessions.get(document_id) {
                return Arc::clone(handle);
            }
        }

        warn!(
            "No session registered for '{}'; creating a default entry",
            document_id
        );
        self.create(document_id, 1, Vec::new()).await
    }

    pub async fn get(&self, document_id: &str) -> Option<Arc<SessionHandle>> {
        let sessions = self.sessions.lock().await;
        sessions.get(document_id).cloned()
    }

    /// Remove a session entry, discarding any pending save.
    pub async fn remove(&self, document_id: &str) -> Option<Arc<SessionHandle>> {
        let removed = {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(document_id)
        };

        if let Some(handle) = &removed {
            let mut state = handle.state.lock().await;
            state.abort_pending_save();
            debug!(
                "Session {} removed for '{}'",
                state.instance, state.document_id
            );
        }

        removed
    }

    /// Get registry statistics
    pub async fn stats(&self) -> RegistryStats {
        let sessions = self.sessions.lock().await;

        let mut stats = RegistryStats {
            open_documents: sessions.len(),
            total_connections: 0,
            pending_saves: 0,
        };

        for handle in sessions.values() {
            let state = handle.state.lock().await;
            stats.total_connections += state.connections;
            if state.pending_save.is_some() {
                stats.pending_saves += 1;
            }
        }

        stats
    }

    /// Remove sessions with no connections whose last activity is older
    /// than `max_idle`. Returns the number of entries removed.
    ///
    /// Catches documents that never received a clean disconnect
    /// notification from the engine.
    pub async fn sweep_stale(&self, max_idle: Duration) -> usize {
        let stale: Vec<String> = {
            let sessions = self.sessions.lock().await;
            let mut stale = Vec::new();
            for (document_id, handle) in sessions.iter() {
                if handle.state.lock().await.is_stale(max_idle) {
                    stale.push(document_id.clone());
                }
            }
            stale
        };

        for document_id in &stale {
            info!("Sweeping stale session for '{}'", document_id);
            self.remove(document_id).await;
        }

        stale.len()
    }

    /// Run the stale sweep periodically on the runtime.
    ///
    /// The returned handle aborts the sweeper; dropping it detaches.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        max_idle: Duration,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let removed = registry.sweep_stale(max_idle).await;
                if removed > 0 {
                    info!("Stale sweep removed {} session(s)", removed);
                }
            }
        })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = SessionRegistry::new();

        registry.create("doc-1", 3, Vec::new()).await;
        let handle = registry.get("doc-1").await.unwrap();

        let state = handle.state.lock().await;
        assert_eq!(state.version, 3);
        assert_eq!(state.connections, 0);
    }

    #[tokio::test]
    async fn test_replace_preserves_connections() {
        let registry = SessionRegistry::new();

        let first = registry.create("doc-1", 1, Vec::new()).await;
        first.state.lock().await.connections = 2;

        let second = registry.create("doc-1", 5, Vec::new()).await;
        let state = second.state.lock().await;
        assert_eq!(state.version, 5);
        assert_eq!(state.connections, 2);
    }

    #[tokio::test]
    async fn test_ensure_creates_default() {
        let registry = SessionRegistry::new();

        let handle = registry.ensure("doc-1").await;
        assert_eq!(handle.state.lock().await.version, 1);

        // Second call returns the same entry
        let again = registry.ensure("doc-1").await;
        assert!(Arc::ptr_eq(&handle, &again));
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = SessionRegistry::new();

        registry.create("doc-1", 1, Vec::new()).await;
        assert!(registry.remove("doc-1").await.is_some());
        assert!(registry.get("doc-1").await.is_none());
        assert!(registry.remove("doc-1").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_idle_sessions() {
        let registry = SessionRegistry::new();

        registry.create("idle", 1, Vec::new()).await;
        let connected = registry.create("connected", 1, Vec::new()).await;
        connected.state.lock().await.connections = 1;

        tokio::time::sleep(Duration::from_millis(30)).await;

        let removed = registry.sweep_stale(Duration::from_millis(10)).await;
        assert_eq!(removed, 1);
        assert!(registry.get("idle").await.is_none());
        assert!(registry.get("connected").await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_keeps_recent_sessions() {
        let registry = SessionRegistry::new();

        registry.create("fresh", 1, Vec::new()).await;

        let removed = registry.sweep_stale(Duration::from_secs(60)).await;
        assert_eq!(removed, 0);
        assert!(registry.get("fresh").await.is_some());
    }

    #[test]
    fn test_stats_display() {
        let registry = SessionRegistry::new();

        let stats = tokio_test::block_on(async {
            registry.create("doc-1", 1, Vec::new()).await;
            let handle = registry.create("doc-2", 1, Vec::new()).await;
            handle.state.lock().await.connections = 3;
            registry.stats().await
        });

        assert_eq!(stats.open_documents, 2);
        assert_eq!(stats.total_connections, 3);
        assert_eq!(
            stats.to_string(),
            "Registry Stats: 2 open, 3 connected, 0 saves pending"
        );
    }
}
