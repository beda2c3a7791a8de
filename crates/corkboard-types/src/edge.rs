//! Directional edges between nodes.
//!
//! Handles are optional: a legacy edge with no handle ids attaches "anywhere"
//! on the endpoint node. When present, a handle names a connector id on the
//! respective endpoint.

use serde::{Deserialize, Serialize};

use crate::ids::{EdgeId, NodeId};

/// A directional edge from `source` to `target`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl Edge {
    /// A legacy edge without handle ids.
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self { id, source, target, source_handle: None, target_handle: None }
    }

    /// An edge attached to specific connectors on both endpoints.
    pub fn with_handles(
        id: EdgeId,
        source: NodeId,
        source_handle: impl Into<String>,
        target: NodeId,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source,
            target,
            source_handle: Some(source_handle.into()),
            target_handle: Some(target_handle.into()),
        }
    }

    /// Whether this edge touches the given node (as either endpoint).
    pub fn touches(&self, node: NodeId) -> bool {
        self.source == node || self.target == node
    }

    /// Whether this edge references `connector_id` on `node` as a handle.
    pub fn uses_handle(&self, node: NodeId, connector_id: &str) -> bool {
        (self.source == node && self.source_handle.as_deref() == Some(connector_id))
            || (self.target == node && self.target_handle.as_deref() == Some(connector_id))
    }
}

// ============================================================================
// Tests
// ============================================================================
