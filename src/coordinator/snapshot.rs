//! Snapshot trigger
//!
//! Two independent policies request durable snapshots: elapsed wall-clock
//! time after a successful autosave, and session end when the last
//! connection leaves. Snapshots are additive; the live document is never
//! overwritten.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info};

use super::Coordinator;
use super::autosave::run_save;
use crate::core::{ActorIdentity, AuthenticatedUser, SnapshotReason};
use crate::engine::LiveDocument;
use crate::gateway::DocumentStore;
use crate::session::SessionHandle;

/// Time-based policy, evaluated after each successful autosave.
///
/// On snapshot failure `last_snapshot_time` stays put, so the next
/// successful autosave retries.
pub(super) async fn snapshot_if_due(
    store: &dyn DocumentStore,
    session: &Arc<SessionHandle>,
    document_id: &str,
    actor: &ActorIdentity,
    interval: Duration,
) {
    let now = Utc::now();
    let last = session.state.lock().await.last_snapshot_time;

    let due = now
        .signed_duration_since(last)
        .to_std()
        .map(|elapsed| elapsed > interval)
        .unwrap_or(false);
    if !due {
        return;
    }

    info!("Triggering auto snapshot for '{}'", document_id);
    if store
        .snapshot(document_id, SnapshotReason::Auto30Min, actor)
        .await
    {
        session.state.lock().await.last_snapshot_time = now;
    }
}

impl Coordinator {
    /// Final save and unconditional snapshot once a document has no
    /// remaining connections, then discard the registry entry.
    ///
    /// The snapshot is requested regardless of elapsed time since the last
    /// one; its failure is logged but never blocks teardown.
    pub(super) async fn finalize(
        &self,
        document_id: &str,
        session: &Arc<SessionHandle>,
        doc: &dyn LiveDocument,
        user: Option<&AuthenticatedUser>,
    ) {
        // The final flush supersedes any scheduled debounce save.
        session.state.lock().await.abort_pending_save();

        let actor = user
            .map(ActorIdentity::from_user)
            .unwrap_or_else(ActorIdentity::system);

        {
            let _guard = session.save_lock.lock().await;
            run_save(self.store.as_ref(), session, doc, document_id, false).await;
        }

        if self
            .store
            .snapshot(document_id, SnapshotReason::SessionEnd, &actor)
            .await
        {
            info!("Created session-end snapshot for '{}'", document_id);
        } else {
            error!("Failed session-end snapshot for '{}'", document_id);
        }

        self.registry.remove(document_id).await;
        info!("Session for '{}' finalized", document_id);
    }
}
