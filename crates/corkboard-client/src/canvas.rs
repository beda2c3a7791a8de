//! The canvas graph model: optimistic local state over an authoritative store.
//!
//! [`CanvasModel`] owns everything the local client renders — nodes, edges,
//! the creation gesture, pending-write tracking, and the popup recalculation
//! registry. Every mutation follows the same discipline:
//!
//! 1. apply the change to local state immediately (optimistic),
//! 2. record the expectation with the [`MutationTracker`],
//! 3. issue the remote write,
//! 4. on rejection, roll local state back to its pre-mutation value and
//!    surface the error; on success, let the next subscription snapshot
//!    settle over the optimistic value.
//!
//! Entities created locally (gestured nodes, fresh edges) live in temporary
//! overlay maps until the store acknowledges the create; the canonical row
//! then arrives via the subscription and the temporary copy is dropped.
//! Snapshots always win: [`CanvasModel::apply_node_snapshot`] replaces the
//! authoritative maps wholesale, however many local writes were in flight.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace, warn};

use corkboard_types::{
    now_millis, redistribute_connectors, Connector, ConnectorKind, Edge, EdgeId, Node, NodeId,
    NodeStatus, Point, Side, TimeUnit, Viewport,
};

use crate::critical_path::time_until_ready;
use crate::gesture::{CreateGesture, NodeBlueprint};
use crate::pending::{ConflictNotice, Expected, MutationTracker};
use crate::recalc::{RecalcFn, RecalcRegistry};
use crate::store::{EdgeSnapshot, GraphStore, NodeSnapshot, StoreError};

/// Errors surfaced to the UI layer. Everything here is toast-level: the
/// worst case is a reverted local view, recoverable by the next snapshot.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("unknown connector '{connector}' on node {node}")]
    UnknownConnector { node: NodeId, connector: String },
    #[error("node {node} already has a connector '{connector}'")]
    DuplicateConnector { node: NodeId, connector: String },
    #[error("time estimate must be non-negative, got {0}")]
    NegativeEstimate(f64),
    #[error("{op} failed: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: StoreError,
    },
}

impl CanvasError {
    fn store(op: &'static str, source: StoreError) -> Self {
        CanvasError::Store { op, source }
    }
}

/// Local graph state for one client, reconciled against the authoritative
/// store.
pub struct CanvasModel {
    store: Arc<dyn GraphStore>,
    viewport: Viewport,
    gesture: CreateGesture,

    /// Authoritative rows, optimistically edited in place between snapshots.
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
    /// Locally-created entities the store has not acknowledged yet.
    temp_nodes: HashMap<NodeId, Node>,
    temp_edges: HashMap<EdgeId, Edge>,

    tracker: MutationTracker,
    recalc: RecalcRegistry,
    /// Edge ids with a delete currently in flight — repeat requests no-op.
    edge_deletes_in_flight: HashSet<EdgeId>,
}

impl CanvasModel {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            viewport: Viewport::default(),
            gesture: CreateGesture::new(),
            nodes: HashMap::new(),
            edges: HashMap::new(),
            temp_nodes: HashMap::new(),
            temp_edges: HashMap::new(),
            tracker: MutationTracker::new(),
            recalc: RecalcRegistry::new(),
            edge_deletes_in_flight: HashSet::new(),
        }
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    /// Every node the client should render: authoritative plus unconfirmed.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().chain(self.temp_nodes.values())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id).or_else(|| self.temp_nodes.get(&id))
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().chain(self.temp_edges.values())
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id).or_else(|| self.temp_edges.get(&id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len() + self.temp_nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len() + self.temp_edges.len()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn gesture(&self) -> &CreateGesture {
        &self.gesture
    }

    /// Snapshot-processing counter, bumped per distinct snapshot.
    pub fn generation(&self) -> u64 {
        self.tracker.generation()
    }

    /// Conflicts still inside their 3 s display window.
    pub fn active_conflicts(&mut self) -> Vec<ConflictNotice> {
        self.tracker.active_conflicts(now_millis()).to_vec()
    }

    /// Time-until-ready for a node, over the authoritative sets, in the
    /// node's own display unit.
    pub fn time_until_ready(&self, id: NodeId) -> f64 {
        let edges: Vec<Edge> = self.edges.values().cloned().collect();
        time_until_ready(id, &self.nodes, &edges)
    }

    // =========================================================================
    // Popup recalculation registry
    // =========================================================================

    /// Register a details-popup callback, fired after every snapshot.
    pub fn register_recalc(&mut self, node_id: NodeId, callback: RecalcFn) {
        self.recalc.register(node_id, callback);
    }

    pub fn unregister_recalc(&mut self, node_id: NodeId) {
        self.recalc.unregister(node_id);
    }

    // =========================================================================
    // Snapshot application — the authoritative side always wins
    // =========================================================================

    /// Fold in a full node snapshot from the store subscription. Returns the
    /// conflicts this snapshot raised.
    pub fn apply_node_snapshot(&mut self, snapshot: &NodeSnapshot) -> Vec<ConflictNotice> {
        let incoming: HashMap<NodeId, Node> =
            snapshot.iter().map(|n| (n.id, n.clone())).collect();
        let conflicts = self.tracker.reconcile(&incoming);

        // Server truth replaces local state wholesale; a temp node whose id
        // shows up here has been confirmed out-of-band and is dropped.
        self.temp_nodes.retain(|id, _| !incoming.contains_key(id));
        self.nodes = incoming;

        trace!(
            nodes = self.nodes.len(),
            conflicts = conflicts.len(),
            "node snapshot applied"
        );
        self.recalc.notify_all();
        conflicts
    }

    /// Fold in a full edge snapshot from the store subscription.
    pub fn apply_edge_snapshot(&mut self, snapshot: &EdgeSnapshot) {
        let incoming: HashMap<EdgeId, Edge> =
            snapshot.iter().map(|e| (e.id, e.clone())).collect();
        self.temp_edges.retain(|id, _| !incoming.contains_key(id));
        self.edges = incoming;
        trace!(edges = self.edges.len(), "edge snapshot applied");
        self.recalc.notify_all();
    }

    // =========================================================================
    // Node creation (two-phase gesture)
    // =========================================================================

    /// Pointer-down with the create tool active. Ignored while over a
    /// connector — that's the start of an edge drag, not a node gesture.
    pub fn pointer_down(&mut self, at: Point, over_connector: bool) {
        if !over_connector {
            self.gesture.pointer_down(at);
        }
    }

    pub fn pointer_move(&mut self, at: Point) {
        self.gesture.pointer_move(at);
    }

    /// Pointer-up: advances the gesture, and on finalize creates the node.
    pub async fn pointer_up(&mut self, at: Point) -> Result<Option<NodeId>, CanvasError> {
        match self.gesture.pointer_up(at, &self.viewport) {
            Some(blueprint) => self.create_node(blueprint).await.map(Some),
            None => Ok(None),
        }
    }

    /// Materialize a gestured node: optimistic temp insert, remote create,
    /// temp dropped on ack (the subscription supplies the canonical row) or
    /// on failure.
    pub async fn create_node(&mut self, blueprint: NodeBlueprint) -> Result<NodeId, CanvasError> {
        let temp_id = NodeId::new();
        let mut node = Node::new(temp_id, blueprint.rect, "New node");
        node.connectors = blueprint.connectors;
        self.temp_nodes.insert(temp_id, node.clone());

        match self.store.create_node(node).await {
            Ok(canonical) => {
                self.temp_nodes.remove(&temp_id);
                debug!(temp = %temp_id, node = %canonical, "node created");
                Ok(canonical)
            }
            Err(e) => {
                self.temp_nodes.remove(&temp_id);
                warn!(temp = %temp_id, "node create rejected: {e}");
                Err(CanvasError::store("create node", e))
            }
        }
    }

    // =========================================================================
    // Field mutations — optimistic apply, remote write, rollback on failure
    // =========================================================================

    pub async fn move_node(&mut self, id: NodeId, x: f64, y: f64) -> Result<(), CanvasError> {
        let node = self.nodes.get_mut(&id).ok_or(CanvasError::UnknownNode(id))?;
        let prev = (node.x, node.y);
        node.set_position(x, y);
        let clamped = (node.x, node.y);

        self.tracker
            .begin(id, Expected::Position { x: clamped.0, y: clamped.1 });
        if let Err(e) = self.store.update_position(id, clamped.0, clamped.1).await {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.x = prev.0;
                node.y = prev.1;
            }
            self.tracker.abandon(id);
            return Err(CanvasError::store("move node", e));
        }
        Ok(())
    }

    pub async fn set_text(&mut self, id: NodeId, text: String) -> Result<(), CanvasError> {
        let node = self.nodes.get_mut(&id).ok_or(CanvasError::UnknownNode(id))?;
        let prev = std::mem::replace(&mut node.text, text.clone());

        self.tracker.begin(id, Expected::Text(text.clone()));
        if let Err(e) = self.store.update_text(id, text).await {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.text = prev;
            }
            self.tracker.abandon(id);
            return Err(CanvasError::store("rename node", e));
        }
        Ok(())
    }

    pub async fn set_description(
        &mut self,
        id: NodeId,
        description: Option<String>,
    ) -> Result<(), CanvasError> {
        let node = self.nodes.get_mut(&id).ok_or(CanvasError::UnknownNode(id))?;
        let prev = std::mem::replace(&mut node.description, description.clone());

        self.tracker.begin(id, Expected::Description(description.clone()));
        if let Err(e) = self.store.update_description(id, description).await {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.description = prev;
            }
            self.tracker.abandon(id);
            return Err(CanvasError::store("update description", e));
        }
        Ok(())
    }

    pub async fn set_status(&mut self, id: NodeId, status: NodeStatus) -> Result<(), CanvasError> {
        let node = self.nodes.get_mut(&id).ok_or(CanvasError::UnknownNode(id))?;
        let prev = std::mem::replace(&mut node.status, status);

        self.tracker.begin(id, Expected::Status(status));
        if let Err(e) = self.store.update_status(id, status).await {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.status = prev;
            }
            self.tracker.abandon(id);
            return Err(CanvasError::store("update status", e));
        }
        Ok(())
    }

    /// Advance the node's status one step in round-robin order.
    pub async fn cycle_status(&mut self, id: NodeId) -> Result<NodeStatus, CanvasError> {
        let current = self
            .nodes
            .get(&id)
            .ok_or(CanvasError::UnknownNode(id))?
            .status;
        let next = current.cycled();
        self.set_status(id, next).await?;
        Ok(next)
    }

    pub async fn set_time_estimate(
        &mut self,
        id: NodeId,
        estimate: Option<f64>,
    ) -> Result<(), CanvasError> {
        if let Some(v) = estimate {
            if v < 0.0 {
                return Err(CanvasError::NegativeEstimate(v));
            }
        }
        let node = self.nodes.get_mut(&id).ok_or(CanvasError::UnknownNode(id))?;
        let prev = std::mem::replace(&mut node.time_estimate, estimate);

        self.tracker.begin(id, Expected::TimeEstimate(estimate));
        if let Err(e) = self.store.update_time_estimate(id, estimate).await {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.time_estimate = prev;
            }
            self.tracker.abandon(id);
            return Err(CanvasError::store("update time estimate", e));
        }
        Ok(())
    }

    pub async fn set_time_unit(&mut self, id: NodeId, unit: TimeUnit) -> Result<(), CanvasError> {
        let node = self.nodes.get_mut(&id).ok_or(CanvasError::UnknownNode(id))?;
        let prev = std::mem::replace(&mut node.time_unit, unit);

        self.tracker.begin(id, Expected::TimeUnit(unit));
        if let Err(e) = self.store.update_time_unit(id, unit).await {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.time_unit = prev;
            }
            self.tracker.abandon(id);
            return Err(CanvasError::store("update time unit", e));
        }
        Ok(())
    }

    // =========================================================================
    // Connector mutations — whole-array persistence, group redistribution
    // =========================================================================

    pub async fn add_connector(
        &mut self,
        node_id: NodeId,
        connector: Connector,
    ) -> Result<(), CanvasError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(CanvasError::UnknownNode(node_id))?;
        if node.connector(&connector.id).is_some() {
            return Err(CanvasError::DuplicateConnector {
                node: node_id,
                connector: connector.id,
            });
        }

        let prev = node.connectors.clone();
        node.connectors.push(connector);
        redistribute_connectors(&mut node.connectors);
        let next = node.connectors.clone();

        self.tracker.begin(node_id, Expected::Connectors(next.clone()));
        if let Err(e) = self.store.update_connectors(node_id, next).await {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.connectors = prev;
            }
            self.tracker.abandon(node_id);
            return Err(CanvasError::store("add connector", e));
        }
        Ok(())
    }

    /// Remove a connector, redistribute its `(kind, side)` siblings, and drop
    /// every edge that referenced it as a handle (optimistic removal plus
    /// best-effort remote deletion of each).
    pub async fn remove_connector(
        &mut self,
        node_id: NodeId,
        connector_id: &str,
    ) -> Result<(), CanvasError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(CanvasError::UnknownNode(node_id))?;
        if node.connector(connector_id).is_none() {
            return Err(CanvasError::UnknownConnector {
                node: node_id,
                connector: connector_id.to_string(),
            });
        }

        let prev = node.connectors.clone();
        node.connectors.retain(|c| c.id != connector_id);
        redistribute_connectors(&mut node.connectors);
        let next = node.connectors.clone();

        // Edges hanging off the removed connector go with it.
        let orphaned: Vec<Edge> = self
            .edges
            .values()
            .filter(|e| e.uses_handle(node_id, connector_id))
            .cloned()
            .collect();
        for e in &orphaned {
            self.edges.remove(&e.id);
        }
        self.temp_edges.retain(|_, e| !e.uses_handle(node_id, connector_id));

        self.tracker.begin(node_id, Expected::Connectors(next.clone()));
        if let Err(e) = self.store.update_connectors(node_id, next).await {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.connectors = prev;
            }
            for edge in orphaned {
                self.edges.insert(edge.id, edge);
            }
            self.tracker.abandon(node_id);
            return Err(CanvasError::store("remove connector", e));
        }

        // Best effort: the connector array is already persisted, so a failed
        // edge delete here is left for the snapshot to sort out.
        for edge in orphaned {
            match self.store.remove_edge(edge.id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(edge = %edge.id, "orphaned edge delete failed: {e}"),
            }
        }
        Ok(())
    }

    // =========================================================================
    // Edge creation — smart connect
    // =========================================================================

    /// Connect a dragged handle to a node body ("smart connect").
    ///
    /// Resolves a free connector of the complementary kind on `to_node` —
    /// one not referenced as a handle by any existing edge — creating a new
    /// connector through the add path when none is free. The edge itself is
    /// optimistic: temporary until the store acknowledges the create.
    pub async fn connect(
        &mut self,
        from_node: NodeId,
        from_connector: &str,
        to_node: NodeId,
    ) -> Result<EdgeId, CanvasError> {
        let from_kind = self
            .node(from_node)
            .ok_or(CanvasError::UnknownNode(from_node))?
            .connector(from_connector)
            .ok_or_else(|| CanvasError::UnknownConnector {
                node: from_node,
                connector: from_connector.to_string(),
            })?
            .kind;
        let wanted = match from_kind {
            ConnectorKind::Output => ConnectorKind::Input,
            ConnectorKind::Input => ConnectorKind::Output,
        };

        let (free, fresh) = {
            let target = self
                .nodes
                .get(&to_node)
                .ok_or(CanvasError::UnknownNode(to_node))?;
            (self.free_connector(target, wanted), fresh_connector_id(target, wanted))
        };
        let resolved = match free {
            Some(id) => id,
            None => {
                let side = match wanted {
                    ConnectorKind::Input => Side::Left,
                    ConnectorKind::Output => Side::Right,
                };
                self.add_connector(to_node, Connector::new(fresh.clone(), wanted, side, 50.0))
                    .await?;
                fresh
            }
        };

        // Edges always run output → input, whichever end the drag started on.
        let temp_id = EdgeId::new();
        let edge = match from_kind {
            ConnectorKind::Output => {
                Edge::with_handles(temp_id, from_node, from_connector, to_node, resolved)
            }
            ConnectorKind::Input => {
                Edge::with_handles(temp_id, to_node, resolved, from_node, from_connector)
            }
        };
        self.temp_edges.insert(temp_id, edge.clone());

        match self.store.create_edge(edge).await {
            Ok(canonical) => {
                self.temp_edges.remove(&temp_id);
                debug!(temp = %temp_id, edge = %canonical, "edge created");
                Ok(canonical)
            }
            Err(e) => {
                self.temp_edges.remove(&temp_id);
                warn!(temp = %temp_id, "edge create rejected: {e}");
                Err(CanvasError::store("create edge", e))
            }
        }
    }

    /// A connector of `kind` on `node` not referenced as a handle by any
    /// known edge (temporary ones included — two quick drags must not pick
    /// the same connector).
    fn free_connector(&self, node: &Node, kind: ConnectorKind) -> Option<String> {
        node.connectors
            .iter()
            .filter(|c| c.kind == kind)
            .find(|c| {
                !self
                    .edges
                    .values()
                    .chain(self.temp_edges.values())
                    .any(|e| e.uses_handle(node.id, &c.id))
            })
            .map(|c| c.id.clone())
    }

    // =========================================================================
    // Deletion — cascades, benign races, double-delete guard
    // =========================================================================

    /// Delete an edge. `NotFound` from the store (someone else deleted it
    /// first) is success; a delete already in flight for the same id no-ops.
    pub async fn delete_edge(&mut self, id: EdgeId) -> Result<(), CanvasError> {
        // A temp edge was never persisted — dropping it locally is enough.
        if self.temp_edges.remove(&id).is_some() {
            return Ok(());
        }
        if !self.edge_deletes_in_flight.insert(id) {
            trace!(edge = %id, "delete already in flight, skipping");
            return Ok(());
        }
        let Some(removed) = self.edges.remove(&id) else {
            self.edge_deletes_in_flight.remove(&id);
            return Ok(());
        };

        let result = self.store.remove_edge(id).await;
        self.edge_deletes_in_flight.remove(&id);
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(edge = %id, "edge already deleted remotely");
                Ok(())
            }
            Err(e) => {
                self.edges.insert(id, removed);
                Err(CanvasError::store("delete edge", e))
            }
        }
    }

    /// Delete several edges, de-duplicated by id. Stops at the first real
    /// failure.
    pub async fn delete_edges(&mut self, ids: &[EdgeId]) -> Result<(), CanvasError> {
        let mut seen = HashSet::new();
        for &id in ids {
            if seen.insert(id) {
                self.delete_edge(id).await?;
            }
        }
        Ok(())
    }

    /// Delete a node: edges referencing it first (cascade), then the node.
    /// A failure restores the optimistically-removed entities; `NotFound`
    /// anywhere is a benign race.
    pub async fn delete_node(&mut self, id: NodeId) -> Result<(), CanvasError> {
        if self.temp_nodes.remove(&id).is_some() {
            return Ok(());
        }
        let Some(removed_node) = self.nodes.remove(&id) else {
            return Ok(());
        };
        let removed_edges: Vec<Edge> = self
            .edges
            .values()
            .filter(|e| e.touches(id))
            .cloned()
            .collect();
        for e in &removed_edges {
            self.edges.remove(&e.id);
        }
        self.temp_edges.retain(|_, e| !e.touches(id));

        match self.store.remove_edges_by_node(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                self.nodes.insert(id, removed_node);
                for edge in removed_edges {
                    self.edges.insert(edge.id, edge);
                }
                return Err(CanvasError::store("delete node edges", e));
            }
        }

        match self.store.remove_node(id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(node = %id, "node already deleted remotely");
                Ok(())
            }
            Err(e) => {
                // Edges are already gone remotely; the next snapshot squares
                // the local view with whatever the server kept.
                self.nodes.insert(id, removed_node);
                Err(CanvasError::store("delete node", e))
            }
        }
    }
}

/// A connector id unused on `node`, in the `in-N`/`out-N` convention.
fn fresh_connector_id(node: &Node, kind: ConnectorKind) -> String {
    let prefix = match kind {
        ConnectorKind::Input => "in",
        ConnectorKind::Output => "out",
    };
    let mut n = node.connectors.iter().filter(|c| c.kind == kind).count() + 1;
    loop {
        let id = format!("{prefix}-{n}");
        if node.connector(&id).is_none() {
            return id;
        }
        n += 1;
    }
}

// ============================================================================
// Tests
// ============================================================================
