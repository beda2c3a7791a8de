//! The authoritative-store boundary.
//!
//! [`GraphStore`] is the client's whole view of the persistent document
//! store: push-based snapshot subscriptions plus request/response mutations.
//! Each mutation either resolves (optimistic state is allowed to settle onto
//! the next subscription snapshot) or rejects with a [`StoreError`] (the
//! caller must roll back its optimistic state and surface the error).
//!
//! There is deliberately no retry and no cancellation here: a failed attempt
//! rolls back, and the user repeats the gesture if they want to retry.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use corkboard_types::{Connector, Edge, EdgeId, Node, NodeId, NodeStatus, TimeUnit};

/// Error taxonomy at the store boundary.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The mutation was rejected before any state change (e.g. an edge
    /// referencing a missing node).
    #[error("validation failed: {0}")]
    Validation(String),
    /// The referenced entity does not exist. On deletes this is a benign
    /// race (someone else got there first) — see [`StoreError::is_not_found`].
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    /// Transient write failure (network/server error).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn node_not_found(id: NodeId) -> Self {
        StoreError::NotFound { kind: "node", id: id.to_string() }
    }

    pub fn edge_not_found(id: EdgeId) -> Self {
        StoreError::NotFound { kind: "edge", id: id.to_string() }
    }

    /// Whether this failure means "already gone" — treated as success by
    /// delete paths instead of being surfaced.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A full authoritative snapshot of one collection, pushed on every write by
/// any client. `Arc` so a broadcast to many subscribers doesn't clone the
/// collection per receiver.
pub type NodeSnapshot = Arc<Vec<Node>>;
/// See [`NodeSnapshot`].
pub type EdgeSnapshot = Arc<Vec<Edge>>;

/// The persistent document store, as seen from a client.
///
/// `create_node` / `create_edge` take the client's optimistic entity and
/// return the canonical id the store assigned; the subscription stream then
/// supplies the canonical row and the client drops its temporary copy.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Subscribe to full node-set snapshots.
    fn subscribe_nodes(&self) -> broadcast::Receiver<NodeSnapshot>;
    /// Subscribe to full edge-set snapshots.
    fn subscribe_edges(&self) -> broadcast::Receiver<EdgeSnapshot>;

    async fn create_node(&self, node: Node) -> StoreResult<NodeId>;
    async fn update_position(&self, id: NodeId, x: f64, y: f64) -> StoreResult<()>;
    async fn update_text(&self, id: NodeId, text: String) -> StoreResult<()>;
    async fn update_description(&self, id: NodeId, description: Option<String>) -> StoreResult<()>;
    async fn update_status(&self, id: NodeId, status: NodeStatus) -> StoreResult<()>;
    async fn update_time_estimate(&self, id: NodeId, estimate: Option<f64>) -> StoreResult<()>;
    async fn update_time_unit(&self, id: NodeId, unit: TimeUnit) -> StoreResult<()>;
    /// Persist the node's whole connector array (the unit of connector
    /// mutation — never a single connector).
    async fn update_connectors(&self, id: NodeId, connectors: Vec<Connector>) -> StoreResult<()>;
    async fn remove_node(&self, id: NodeId) -> StoreResult<()>;

    async fn create_edge(&self, edge: Edge) -> StoreResult<EdgeId>;
    async fn remove_edge(&self, id: EdgeId) -> StoreResult<()>;
    /// Remove every edge touching a node. The store also does this on its
    /// own when the node itself is deleted (server-side cascade).
    async fn remove_edges_by_node(&self, id: NodeId) -> StoreResult<()>;
}

// ============================================================================
// Tests
// ============================================================================
