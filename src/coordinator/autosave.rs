//! Autosave scheduler
//!
//! Debounces change notifications into a single trailing save per quiet
//! period. Only the last notification's state in a window is persisted;
//! earlier intermediate states are never individually saved.

use std::sync::Arc;

use log::{debug, error, info, warn};
use serde_json::Value;

use super::Coordinator;
use crate::core::{ActorIdentity, AuthenticatedUser, ThreadEntry};
use crate::engine::LiveDocument;
use crate::gateway::{DocumentStore, SaveOutcome};
use crate::session::SessionHandle;

impl Coordinator {
    /// Content-changed hook: restart the document's debounce timer.
    ///
    /// A new notification cancels any pending timer rather than stacking a
    /// second one. Once a timer starts its save it releases the registry
    /// slot and can only be superseded, not aborted mid-save.
    pub async fn on_change(
        &self,
        document_id: &str,
        doc: &Arc<dyn LiveDocument>,
        user: Option<&AuthenticatedUser>,
    ) {
        let session = self.registry.ensure(document_id).await;

        let store = Arc::clone(&self.store);
        let task_session = Arc::clone(&session);
        let task_doc = Arc::clone(doc);
        let task_id = document_id.to_string();
        let actor = user
            .map(ActorIdentity::from_user)
            .unwrap_or_else(ActorIdentity::system);
        let window = self.config.debounce_window;
        let snapshot_interval = self.config.snapshot_interval;

        let task = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            task_session.state.lock().await.pending_save = None;

            let _guard = task_session.save_lock.lock().await;
            let saved = run_save(
                store.as_ref(),
                &task_session,
                task_doc.as_ref(),
                &task_id,
                true,
            )
            .await;

            if saved {
                super::snapshot::snapshot_if_due(
                    store.as_ref(),
                    &task_session,
                    &task_id,
                    &actor,
                    snapshot_interval,
                )
                .await;
            }
        });

        let mut state = session.state.lock().await;
        state.touch();
        if let Some(previous) = state.pending_save.replace(task) {
            previous.abort();
        }
    }
}

/// Shared save path for the debounce fire and the session-end flush.
///
/// Returns true when storage confirmed the write. On a version conflict the
/// stored version is re-fetched and adopted, so the next cycle retries with
/// a fresh token instead of failing forever on a stale one.
pub(super) async fn run_save(
    store: &dyn DocumentStore,
    session: &Arc<SessionHandle>,
    doc: &dyn LiveDocument,
    document_id: &str,
    skip_empty: bool,
) -> bool {
    let Some(content) = doc.export_content() else {
        debug!("No content materialized for '{}'; skipping save", document_id);
        return false;
    };

    if skip_empty && is_empty_body(&content) {
        debug!("Document '{}' is empty; skipping save", document_id);
        return false;
    }

    let threads = doc.threads();
    let expected = session.state.lock().await.version;

    match store.save(document_id, &content, &threads, expected).await {
        SaveOutcome::Saved => {
            let mut state = session.state.lock().await;
            state.version += 1;
            state.threads = threads.iter().filter_map(ThreadEntry::from_value).collect();
            info!("Saved '{}' (v{})", document_id, state.version);
            true
        }
        SaveOutcome::VersionConflict => {
            warn!(
                "Version conflict on '{}' (expected v{}); re-syncing from storage",
                document_id, expected
            );
            if let Some(payload) = store.load(document_id).await {
                let stored = payload.version.unwrap_or(1);
                session.state.lock().await.version = stored;
                warn!("Adopted stored v{} for '{}'", stored, document_id);
            }
            false
        }
        SaveOutcome::Failed => {
            error!(
                "Save failed for '{}' (expected v{}); retrying on the next change",
                document_id, expected
            );
            false
        }
    }
}

/// A body with no block content. Saving one would clobber good data with a
/// not-yet-initialized document.
pub(super) fn is_empty_body(content: &Value) -> bool {
    match content.get("content") {
        Some(Value::Array(blocks)) => blocks.is_empty(),
        _ => true,
    }
}
