//! Recalculation registry for open node-details popups.
//!
//! A popup showing a node's time-until-ready registers a callback here on
//! mount and unregisters on unmount. After every authoritative snapshot the
//! canvas model fires the registry so open popups re-run the pure
//! critical-path calculation against fresh state.
//!
//! This is an explicit registry object owned by the canvas model — the
//! register/unregister lifecycle is tied to popup mount/unmount, and there is
//! no ambient shared state.

use std::collections::HashMap;

use tracing::trace;

use corkboard_types::NodeId;

/// Callback invoked when the node's displayed calculation is stale.
pub type RecalcFn = Box<dyn Fn(NodeId) + Send>;

/// Registry of "recalculate this node's popup" callbacks, at most one per
/// node.
#[derive(Default)]
pub struct RecalcRegistry {
    callbacks: HashMap<NodeId, RecalcFn>,
}

impl RecalcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a popup's callback. A second registration for the same node
    /// replaces the first (one popup per node).
    pub fn register(&mut self, node_id: NodeId, callback: RecalcFn) {
        trace!(node = %node_id, "recalc callback registered");
        self.callbacks.insert(node_id, callback);
    }

    /// Remove the callback on popup unmount.
    pub fn unregister(&mut self, node_id: NodeId) {
        trace!(node = %node_id, "recalc callback unregistered");
        self.callbacks.remove(&node_id);
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Fire every registered callback — called after each authoritative
    /// node/edge snapshot lands.
    pub fn notify_all(&self) {
        for (node_id, callback) in &self.callbacks {
            callback(*node_id);
        }
    }
}

impl std::fmt::Debug for RecalcRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecalcRegistry")
            .field("registered", &self.callbacks.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
