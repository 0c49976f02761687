//! Document hydrator
//!
//! Fills a freshly opened document from storage exactly once per open:
//! content through the engine's transformer, threads into the shared
//! collection, version and snapshot clock into the session entry.

use log::{debug, error, info, warn};
use serde_json::Value;

use super::Coordinator;
use crate::core::ThreadEntry;
use crate::engine::LiveDocument;

impl Coordinator {
    /// Document-open hook: hydrate a freshly opened document from storage.
    ///
    /// Any fetch or parse failure is logged and the document opens empty —
    /// hydration failure is never fatal to session admission. A session
    /// entry is created either way so later saves have state to work from.
    pub async fn on_load_document(&self, document_id: &str, doc: &dyn LiveDocument) {
        let mut version = 1;
        let mut threads = Vec::new();

        match self.store.load(document_id).await {
            Some(payload) => {
                version = payload.version.unwrap_or(1);

                if let Some(content) = &payload.content {
                    match doc.apply_initial_content(content) {
                        Ok(()) => debug!("Applied stored content for '{}'", document_id),
                        Err(e) => {
                            error!("Hydrating content for '{}' failed: {}", document_id, e)
                        }
                    }
                }

                threads = merge_threads(document_id, payload.threads.as_ref(), doc);
            }
            None => {
                warn!("No stored state for '{}'; opening empty", document_id);
            }
        }

        let thread_count = threads.len();
        let session = self.registry.create(document_id, version, threads).await;
        info!(
            "Hydrated '{}' at v{} ({} threads)",
            document_id,
            session.state.lock().await.version,
            thread_count
        );
    }
}

/// Merge persisted threads into the live document's shared collection.
///
/// Entries lacking a usable identifier are dropped and reported; the rest
/// are normalized and upserted by id, so replaying the same payload yields
/// an identical collection.
fn merge_threads(
    document_id: &str,
    threads: Option<&Value>,
    doc: &dyn LiveDocument,
) -> Vec<ThreadEntry> {
    let Some(threads) = threads else {
        return Vec::new();
    };

    let Some(list) = threads.as_array() else {
        warn!(
            "Thread payload for '{}' is not a sequence; ignoring",
            document_id
        );
        return Vec::new();
    };

    let mut merged = Vec::new();
    for raw in list {
        match ThreadEntry::from_value(raw) {
            Some(entry) => {
                doc.insert_thread(&entry.id, entry.body.clone());
                merged.push(entry);
            }
            None => warn!(
                "Skipping thread with missing id in '{}': {}",
                document_id, raw
            ),
        }
    }

    merged
}
