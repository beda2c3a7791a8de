//! In-memory authoritative document store.
//!
//! [`MemoryStore`] is the server-side source of truth for one board. Writes
//! validate first, mutate under a single lock, and then broadcast a full
//! snapshot of the affected collection to every subscriber. Clients never see
//! deltas; the whole collection arrives each time and the client-side model
//! reconciles against it.
//!
//! Validation lives here, not in the client: a mutation either commits in
//! full or rejects without touching state, so a rejected client can roll back
//! its optimistic copy knowing the server kept nothing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use corkboard_client::{EdgeSnapshot, GraphStore, NodeSnapshot, StoreError, StoreResult};
use corkboard_types::{Connector, Edge, EdgeId, Node, NodeId, NodeStatus, TimeUnit};

/// Buffered snapshots per subscriber before the receiver starts lagging.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct StoreInner {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
}

/// The authoritative store for a single board, shared across connected
/// clients.
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
    nodes_tx: broadcast::Sender<NodeSnapshot>,
    edges_tx: broadcast::Sender<EdgeSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        let (nodes_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let (edges_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Arc::new(Self { inner: RwLock::new(StoreInner::default()), nodes_tx, edges_tx })
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.read().edges.len()
    }

    /// Current node collection, as a subscriber would receive it.
    pub fn nodes(&self) -> NodeSnapshot {
        Arc::new(self.inner.read().nodes.values().cloned().collect())
    }

    /// Current edge collection, as a subscriber would receive it.
    pub fn edges(&self) -> EdgeSnapshot {
        Arc::new(self.inner.read().edges.values().cloned().collect())
    }

    fn broadcast_nodes(&self, inner: &StoreInner) {
        let snapshot: NodeSnapshot = Arc::new(inner.nodes.values().cloned().collect());
        // No subscribers is fine.
        let _ = self.nodes_tx.send(snapshot);
    }

    fn broadcast_edges(&self, inner: &StoreInner) {
        let snapshot: EdgeSnapshot = Arc::new(inner.edges.values().cloned().collect());
        let _ = self.edges_tx.send(snapshot);
    }

    /// Apply `mutate` to a node if it exists, then broadcast.
    fn update_node(
        &self,
        id: NodeId,
        mutate: impl FnOnce(&mut Node),
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get_mut(&id)
            .ok_or_else(|| StoreError::node_not_found(id))?;
        mutate(node);
        self.broadcast_nodes(&inner);
        Ok(())
    }
}

fn validate_node(node: &Node) -> StoreResult<()> {
    if node.text.trim().is_empty() {
        return Err(StoreError::Validation("node text must not be empty".into()));
    }
    if let Some(estimate) = node.time_estimate {
        validate_estimate(estimate)?;
    }
    if !node.rect().within_canvas() {
        return Err(StoreError::Validation("node rectangle outside canvas bounds".into()));
    }
    Ok(())
}

fn validate_estimate(estimate: f64) -> StoreResult<()> {
    if !estimate.is_finite() || estimate < 0.0 {
        return Err(StoreError::Validation(format!(
            "time estimate must be a non-negative number, got {estimate}"
        )));
    }
    Ok(())
}

#[async_trait]
impl GraphStore for MemoryStore {
    fn subscribe_nodes(&self) -> broadcast::Receiver<NodeSnapshot> {
        self.nodes_tx.subscribe()
    }

    fn subscribe_edges(&self) -> broadcast::Receiver<EdgeSnapshot> {
        self.edges_tx.subscribe()
    }

    async fn create_node(&self, mut node: Node) -> StoreResult<NodeId> {
        validate_node(&node)?;
        // The client's id was provisional; the store assigns the canonical one.
        let id = NodeId::new();
        node.id = id;

        let mut inner = self.inner.write();
        inner.nodes.insert(id, node);
        self.broadcast_nodes(&inner);
        info!(node = %id, total = inner.nodes.len(), "node created");
        Ok(id)
    }

    async fn update_position(&self, id: NodeId, x: f64, y: f64) -> StoreResult<()> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(StoreError::Validation("position must be finite".into()));
        }
        self.update_node(id, |n| n.set_position(x, y))
    }

    async fn update_text(&self, id: NodeId, text: String) -> StoreResult<()> {
        if text.trim().is_empty() {
            return Err(StoreError::Validation("node text must not be empty".into()));
        }
        self.update_node(id, |n| n.text = text)
    }

    async fn update_description(
        &self,
        id: NodeId,
        description: Option<String>,
    ) -> StoreResult<()> {
        self.update_node(id, |n| n.description = description)
    }

    async fn update_status(&self, id: NodeId, status: NodeStatus) -> StoreResult<()> {
        self.update_node(id, |n| n.status = status)
    }

    async fn update_time_estimate(&self, id: NodeId, estimate: Option<f64>) -> StoreResult<()> {
        if let Some(v) = estimate {
            validate_estimate(v)?;
        }
        self.update_node(id, |n| n.time_estimate = estimate)
    }

    async fn update_time_unit(&self, id: NodeId, unit: TimeUnit) -> StoreResult<()> {
        self.update_node(id, |n| n.time_unit = unit)
    }

    async fn update_connectors(&self, id: NodeId, connectors: Vec<Connector>) -> StoreResult<()> {
        let mut seen = std::collections::HashSet::new();
        for c in &connectors {
            if !seen.insert(c.id.as_str()) {
                return Err(StoreError::Validation(format!(
                    "duplicate connector id '{}'",
                    c.id
                )));
            }
        }
        self.update_node(id, |n| n.connectors = connectors)
    }

    async fn remove_node(&self, id: NodeId) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.nodes.remove(&id).is_none() {
            return Err(StoreError::node_not_found(id));
        }
        // Server-side cascade: edges referencing a deleted node never
        // survive, whatever the client got around to requesting.
        let before = inner.edges.len();
        inner.edges.retain(|_, e| !e.touches(id));
        let cascaded = before - inner.edges.len();

        self.broadcast_nodes(&inner);
        if cascaded > 0 {
            self.broadcast_edges(&inner);
        }
        info!(node = %id, cascaded, "node removed");
        Ok(())
    }

    async fn create_edge(&self, mut edge: Edge) -> StoreResult<EdgeId> {
        let id = EdgeId::new();
        edge.id = id;

        let mut inner = self.inner.write();
        for (endpoint, handle) in [
            (edge.source, edge.source_handle.as_deref()),
            (edge.target, edge.target_handle.as_deref()),
        ] {
            let node = inner
                .nodes
                .get(&endpoint)
                .ok_or_else(|| StoreError::node_not_found(endpoint))?;
            if let Some(handle) = handle {
                if node.connector(handle).is_none() {
                    return Err(StoreError::Validation(format!(
                        "connector '{handle}' does not exist on node {endpoint}"
                    )));
                }
            }
        }
        if inner
            .edges
            .values()
            .any(|e| e.source == edge.source && e.target == edge.target
                && e.source_handle == edge.source_handle
                && e.target_handle == edge.target_handle)
        {
            return Err(StoreError::Validation("identical edge already exists".into()));
        }

        inner.edges.insert(id, edge);
        self.broadcast_edges(&inner);
        debug!(edge = %id, total = inner.edges.len(), "edge created");
        Ok(id)
    }

    async fn remove_edge(&self, id: EdgeId) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.edges.remove(&id).is_none() {
            return Err(StoreError::edge_not_found(id));
        }
        self.broadcast_edges(&inner);
        debug!(edge = %id, "edge removed");
        Ok(())
    }

    async fn remove_edges_by_node(&self, id: NodeId) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(&id) {
            return Err(StoreError::node_not_found(id));
        }
        let before = inner.edges.len();
        inner.edges.retain(|_, e| !e.touches(id));
        if inner.edges.len() != before {
            self.broadcast_edges(&inner);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
