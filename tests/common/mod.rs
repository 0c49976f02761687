//! Shared test doubles for the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use dockeeper::{
    ActorIdentity, AuthenticatedUser, CoordError, DocumentPayload, DocumentStore, LiveDocument,
    Result, SaveOutcome, SnapshotReason,
};

/// Route `log` output through the test harness when `RUST_LOG` is set.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone)]
pub struct SaveCall {
    pub document_id: String,
    pub content: Value,
    pub threads: Vec<Value>,
    pub expected_version: u64,
}

#[derive(Debug, Clone)]
pub struct SnapshotCall {
    pub document_id: String,
    pub reason: SnapshotReason,
    pub actor: ActorIdentity,
}

/// In-memory storage double recording every call.
pub struct MemoryStore {
    pub payload: Mutex<Option<DocumentPayload>>,
    pub save_outcome: Mutex<SaveOutcome>,
    pub snapshot_ok: Mutex<bool>,
    pub user: Mutex<Option<AuthenticatedUser>>,
    pub saves: Mutex<Vec<SaveCall>>,
    pub snapshots: Mutex<Vec<SnapshotCall>>,
    pub loads: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            payload: Mutex::new(None),
            save_outcome: Mutex::new(SaveOutcome::Saved),
            snapshot_ok: Mutex::new(true),
            user: Mutex::new(None),
            saves: Mutex::new(Vec::new()),
            snapshots: Mutex::new(Vec::new()),
            loads: Mutex::new(0),
        }
    }

    pub fn with_payload(payload: DocumentPayload) -> Self {
        let store = Self::new();
        *store.payload.lock().unwrap() = Some(payload);
        store
    }

    pub fn set_save_outcome(&self, outcome: SaveOutcome) {
        *self.save_outcome.lock().unwrap() = outcome;
    }

    pub fn set_snapshot_ok(&self, ok: bool) {
        *self.snapshot_ok.lock().unwrap() = ok;
    }

    pub fn set_user(&self, user: AuthenticatedUser) {
        *self.user.lock().unwrap() = Some(user);
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn last_save(&self) -> Option<SaveCall> {
        self.saves.lock().unwrap().last().cloned()
    }

    pub fn last_snapshot(&self) -> Option<SnapshotCall> {
        self.snapshots.lock().unwrap().last().cloned()
    }

    pub fn load_count(&self) -> usize {
        *self.loads.lock().unwrap()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn validate_access(&self, _document_id: &str, _token: &str) -> Result<AuthenticatedUser> {
        self.user
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CoordError::AccessDenied("invalid user data".to_string()))
    }

    async fn load(&self, _document_id: &str) -> Option<DocumentPayload> {
        *self.loads.lock().unwrap() += 1;
        self.payload.lock().unwrap().clone()
    }

    async fn save(
        &self,
        document_id: &str,
        content: &Value,
        threads: &[Value],
        expected_version: u64,
    ) -> SaveOutcome {
        self.saves.lock().unwrap().push(SaveCall {
            document_id: document_id.to_string(),
            content: content.clone(),
            threads: threads.to_vec(),
            expected_version,
        });
        *self.save_outcome.lock().unwrap()
    }

    async fn snapshot(
        &self,
        document_id: &str,
        reason: SnapshotReason,
        actor: &ActorIdentity,
    ) -> bool {
        self.snapshots.lock().unwrap().push(SnapshotCall {
            document_id: document_id.to_string(),
            reason,
            actor: actor.clone(),
        });
        *self.snapshot_ok.lock().unwrap()
    }
}

/// In-memory stand-in for the engine's live document handle.
pub struct FakeDocument {
    content: Mutex<Option<Value>>,
    threads: Mutex<Vec<(String, Value)>>,
}

impl FakeDocument {
    pub fn new() -> Self {
        Self {
            content: Mutex::new(None),
            threads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_content(content: Value) -> Self {
        let doc = Self::new();
        doc.set_content(content);
        doc
    }

    pub fn set_content(&self, content: Value) {
        *self.content.lock().unwrap() = Some(content);
    }

    pub fn content(&self) -> Option<Value> {
        self.content.lock().unwrap().clone()
    }

    pub fn thread_ids(&self) -> Vec<String> {
        self.threads
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl LiveDocument for FakeDocument {
    fn apply_initial_content(&self, content: &Value) -> Result<()> {
        self.set_content(content.clone());
        Ok(())
    }

    fn export_content(&self) -> Option<Value> {
        self.content()
    }

    fn insert_thread(&self, thread_id: &str, entry: Value) {
        let mut threads = self.threads.lock().unwrap();
        match threads.iter_mut().find(|(id, _)| id == thread_id) {
            Some((_, existing)) => *existing = entry,
            None => threads.push((thread_id.to_string(), entry)),
        }
    }

    fn threads(&self) -> Vec<Value> {
        self.threads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, entry)| entry.clone())
            .collect()
    }
}
