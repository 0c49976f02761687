//! Document persistence & snapshot coordinator
//!
//! Implements the lifecycle hooks the collaboration engine invokes: session
//! admission, hydration on first open, debounced autosave on change, and
//! the final save/snapshot sequence on session end. Storage failures never
//! block editing — they only degrade durability until the next cycle.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::config::CoordinatorConfig;
use crate::core::{AuthenticatedUser, CoordError, Result};
use crate::engine::LiveDocument;
use crate::gateway::{DocumentStore, HttpDocumentStore};
use crate::session::SessionRegistry;

mod autosave;
mod hydrate;
mod snapshot;

/// The coordinator owns the session registry and the storage seam; one
/// instance serves every document the hosting engine opens.
pub struct Coordinator {
    config: CoordinatorConfig,
    store: Arc<dyn DocumentStore>,
    registry: Arc<SessionRegistry>,
}

impl Coordinator {
    /// Create a coordinator backed by the HTTP storage gateway.
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        let store = HttpDocumentStore::new(&config)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Create a coordinator with a specific storage implementation.
    ///
    /// Useful for testing with an in-memory store.
    pub fn with_store(config: CoordinatorConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        config.validate().map_err(CoordError::Config)?;

        Ok(Self {
            config,
            store,
            registry: Arc::new(SessionRegistry::new()),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Start the background sweep for sessions that never received a clean
    /// disconnect notification.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let max_idle = self.config.session_max_idle;
        self.registry.spawn_sweeper(max_idle, max_idle)
    }

    /// Session-open hook: validate access for a bearer credential.
    ///
    /// Rejects the session on transport errors, failure envelopes and
    /// records lacking an identity — a partial identity never admits.
    pub async fn on_authenticate(
        &self,
        document_id: &str,
        token: &str,
    ) -> Result<AuthenticatedUser> {
        let user = self.store.validate_access(document_id, token).await?;
        debug!(
            "Access granted on '{}' for user {} (can_edit: {})",
            document_id, user.user_id, user.can_edit
        );
        Ok(user)
    }

    /// Connection-opened hook.
    pub async fn on_connect(&self, document_id: &str, user: &AuthenticatedUser) {
        let session = self.registry.ensure(document_id).await;
        let mut state = session.state.lock().await;
        state.connections += 1;
        state.touch();
        info!(
            "User {} (id {}) joined '{}' ({} connected)",
            user.user_name, user.user_id, document_id, state.connections
        );
    }

    /// Connection-closed hook.
    ///
    /// When the last connection leaves, performs the final save and the
    /// unconditional session-end snapshot, then discards the registry
    /// entry.
    pub async fn on_disconnect(
        &self,
        document_id: &str,
        doc: &Arc<dyn LiveDocument>,
        user: Option<&AuthenticatedUser>,
    ) {
        let Some(session) = self.registry.get(document_id).await else {
            warn!("Disconnect for unknown document '{}'", document_id);
            return;
        };

        let remaining = {
            let mut state = session.state.lock().await;
            state.connections = state.connections.saturating_sub(1);
            state.touch();
            state.connections
        };

        if remaining > 0 {
            debug!("User left '{}' ({} still connected)", document_id, remaining);
            return;
        }

        info!(
            "Last user left '{}'; performing final save and snapshot",
            document_id
        );
        self.finalize(document_id, &session, doc.as_ref(), user).await;
    }
}
