//! Boundary to the external collaboration engine
//!
//! The coordinator never touches CRDT internals. The engine hands each
//! lifecycle hook a handle onto the live document; everything the
//! coordinator needs from that handle is expressed here.

use serde_json::Value;

use crate::core::Result;

/// Handle onto the live CRDT document owned by the collaboration engine.
///
/// All operations are in-memory on the engine side; transport and merge
/// semantics stay behind this trait. The engine's own transformer performs
/// the conversion between the backend's structured representation and the
/// CRDT encoding — the coordinator only drives it.
pub trait LiveDocument: Send + Sync {
    /// Convert the persisted structured content into the document's native
    /// encoding and merge it in as the initial state.
    ///
    /// Called at most once per document open, before any edits arrive.
    fn apply_initial_content(&self, content: &Value) -> Result<()>;

    /// Export the current structured content.
    ///
    /// Returns `None` while the document has no materialized body (a handle
    /// that was never initialized and never edited).
    fn export_content(&self) -> Option<Value>;

    /// Insert-or-replace an entry in the document's shared thread
    /// collection, keyed by thread identifier.
    fn insert_thread(&self, thread_id: &str, entry: Value);

    /// Read back the shared thread collection in insertion order.
    fn threads(&self) -> Vec<Value>;
}
