//! End-to-end sync tests: real [`CanvasModel`] clients against a real
//! [`MemoryStore`], exercising the optimistic write / snapshot reconcile loop
//! the way two browser tabs on the same board would.

use std::sync::Arc;

use tokio::sync::broadcast;

use corkboard_client::{
    CanvasError, CanvasModel, ConflictNotice, GraphStore, NodeBlueprint, PresenceTracker,
};
use corkboard_server::{CursorRelay, MemoryStore, CURSOR_TTL_MS};
use corkboard_types::{
    now_millis, Connector, Cursor, Point, Rect, SessionId, SessionIdentity,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corkboard=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Drain a snapshot subscription down to the most recent broadcast, if any.
fn latest<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Option<T> {
    let mut last = None;
    while let Ok(v) = rx.try_recv() {
        last = Some(v);
    }
    last
}

fn blueprint_at(x: f64, y: f64) -> NodeBlueprint {
    NodeBlueprint {
        rect: Rect::new(x, y, 160.0, 100.0),
        connectors: vec![Connector::input("in-1"), Connector::output("out-1")],
    }
}

/// Two clients joined to the same store, each with its own subscriptions.
struct Board {
    store: Arc<MemoryStore>,
    alice: CanvasModel,
    alice_nodes: broadcast::Receiver<corkboard_client::NodeSnapshot>,
    alice_edges: broadcast::Receiver<corkboard_client::EdgeSnapshot>,
    bob: CanvasModel,
    bob_nodes: broadcast::Receiver<corkboard_client::NodeSnapshot>,
    bob_edges: broadcast::Receiver<corkboard_client::EdgeSnapshot>,
}

impl Board {
    fn new() -> Self {
        init_tracing();
        let store = MemoryStore::new();
        let alice_nodes = store.subscribe_nodes();
        let alice_edges = store.subscribe_edges();
        let bob_nodes = store.subscribe_nodes();
        let bob_edges = store.subscribe_edges();
        Self {
            alice: CanvasModel::new(store.clone()),
            bob: CanvasModel::new(store.clone()),
            store,
            alice_nodes,
            alice_edges,
            bob_nodes,
            bob_edges,
        }
    }

    fn sync_alice(&mut self) -> Vec<ConflictNotice> {
        let mut conflicts = Vec::new();
        if let Some(nodes) = latest(&mut self.alice_nodes) {
            conflicts = self.alice.apply_node_snapshot(&nodes);
        }
        if let Some(edges) = latest(&mut self.alice_edges) {
            self.alice.apply_edge_snapshot(&edges);
        }
        conflicts
    }

    fn sync_bob(&mut self) -> Vec<ConflictNotice> {
        let mut conflicts = Vec::new();
        if let Some(nodes) = latest(&mut self.bob_nodes) {
            conflicts = self.bob.apply_node_snapshot(&nodes);
        }
        if let Some(edges) = latest(&mut self.bob_edges) {
            self.bob.apply_edge_snapshot(&edges);
        }
        conflicts
    }
}

// ============================================================================
// Document sync
// ============================================================================

#[tokio::test]
async fn test_created_node_reaches_the_other_client() {
    let mut board = Board::new();

    let id = board.alice.create_node(blueprint_at(100.0, 100.0)).await.unwrap();
    board.sync_alice();
    board.sync_bob();

    let seen = board.bob.node(id).expect("bob should see alice's node");
    assert_eq!(seen.text, "New node");
    assert_eq!(seen.connectors.len(), 2);
    assert_eq!(board.alice.node_count(), 1);
}

#[tokio::test]
async fn test_gesture_end_to_end_through_real_store() {
    let mut board = Board::new();

    board.alice.pointer_down(Point::new(50.0, 50.0), false);
    board.alice.pointer_move(Point::new(250.0, 200.0));
    assert!(board
        .alice
        .pointer_up(Point::new(250.0, 200.0))
        .await
        .unwrap()
        .is_none());
    let id = board
        .alice
        .pointer_up(Point::new(250.0 + 45.0, 200.0))
        .await
        .unwrap()
        .expect("gesture should finalize");

    board.sync_bob();
    let node = board.bob.node(id).unwrap();
    // 45px of connector drag ⇒ 2 inputs, plus the single output.
    assert_eq!(node.connectors.len(), 3);
}

#[tokio::test]
async fn test_concurrent_moves_raise_conflict_for_the_loser() {
    let mut board = Board::new();
    let id = board.alice.create_node(blueprint_at(100.0, 100.0)).await.unwrap();
    board.sync_alice();
    board.sync_bob();

    // Alice's move lands first, then Bob overwrites it before Alice has seen
    // any snapshot.
    board.alice.move_node(id, 200.0, 200.0).await.unwrap();
    board.bob.move_node(id, 900.0, 900.0).await.unwrap();

    let conflicts = board.sync_alice();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].node_id, id);
    // Alice's view snaps to the authoritative position.
    let node = board.alice.node(id).unwrap();
    assert_eq!((node.x, node.y), (900.0, 900.0));

    // Bob's own write settled cleanly.
    assert!(board.sync_bob().is_empty());
}

#[tokio::test]
async fn test_uncontested_write_settles_without_conflict() {
    let mut board = Board::new();
    let id = board.alice.create_node(blueprint_at(100.0, 100.0)).await.unwrap();
    board.sync_alice();

    board.alice.move_node(id, 300.0, 400.0).await.unwrap();
    assert!(board.sync_alice().is_empty());
    let node = board.alice.node(id).unwrap();
    assert_eq!((node.x, node.y), (300.0, 400.0));
}

#[tokio::test]
async fn test_server_rejection_rolls_back_optimistic_state() {
    let mut board = Board::new();
    let id = board.alice.create_node(blueprint_at(100.0, 100.0)).await.unwrap();
    board.sync_alice();

    let err = board.alice.set_text(id, "   ".into()).await.unwrap_err();
    assert!(matches!(err, CanvasError::Store { .. }));
    // Local text reverted; server untouched.
    assert_eq!(board.alice.node(id).unwrap().text, "New node");
    assert_eq!(board.store.nodes()[0].text, "New node");
}

#[tokio::test]
async fn test_smart_connect_between_clients_nodes() {
    let mut board = Board::new();
    let a = board.alice.create_node(blueprint_at(100.0, 100.0)).await.unwrap();
    let b = board.bob.create_node(blueprint_at(600.0, 100.0)).await.unwrap();
    board.sync_alice();
    board.sync_bob();

    let edge_id = board.alice.connect(a, "out-1", b).await.unwrap();
    board.sync_bob();
    let edge = board.bob.edge(edge_id).expect("bob should see the edge");
    assert_eq!(edge.source, a);
    assert_eq!(edge.target, b);
    assert_eq!(edge.target_handle.as_deref(), Some("in-1"));
}

#[tokio::test]
async fn test_double_edge_delete_is_benign() {
    let mut board = Board::new();
    let a = board.alice.create_node(blueprint_at(100.0, 100.0)).await.unwrap();
    let b = board.alice.create_node(blueprint_at(600.0, 100.0)).await.unwrap();
    board.sync_alice();
    board.sync_bob();
    let edge_id = board.alice.connect(a, "out-1", b).await.unwrap();
    board.sync_alice();
    board.sync_bob();

    // Both clients delete the same edge; the second hits NotFound and treats
    // it as success.
    board.alice.delete_edge(edge_id).await.unwrap();
    board.bob.delete_edge(edge_id).await.unwrap();
    assert_eq!(board.store.edge_count(), 0);
    assert_eq!(board.alice.edge_count(), 0);
    assert_eq!(board.bob.edge_count(), 0);
}

#[tokio::test]
async fn test_node_delete_cascades_to_other_client() {
    let mut board = Board::new();
    let a = board.alice.create_node(blueprint_at(100.0, 100.0)).await.unwrap();
    let b = board.alice.create_node(blueprint_at(600.0, 100.0)).await.unwrap();
    board.sync_alice();
    let edge_id = board.alice.connect(a, "out-1", b).await.unwrap();
    board.sync_alice();
    board.sync_bob();
    assert!(board.bob.edge(edge_id).is_some());

    board.alice.delete_node(a).await.unwrap();
    board.sync_bob();
    assert!(board.bob.node(a).is_none());
    assert!(board.bob.edge(edge_id).is_none());
    assert!(board.bob.node(b).is_some());
}

#[tokio::test]
async fn test_time_until_ready_over_synced_graph() {
    let mut board = Board::new();
    let a = board.alice.create_node(blueprint_at(100.0, 100.0)).await.unwrap();
    let b = board.alice.create_node(blueprint_at(600.0, 100.0)).await.unwrap();
    board.sync_alice();
    board.alice.set_time_estimate(a, Some(3.0)).await.unwrap();
    board.alice.connect(a, "out-1", b).await.unwrap();
    board.sync_alice();
    board.sync_bob();

    // Both clients agree on the dependency arithmetic.
    assert_eq!(board.alice.time_until_ready(b), 3.0);
    assert_eq!(board.bob.time_until_ready(b), 3.0);
    assert_eq!(board.bob.time_until_ready(a), 0.0);
}

// ============================================================================
// Presence relay
// ============================================================================

fn identity(name: &str) -> SessionIdentity {
    SessionIdentity {
        id: SessionId::new(),
        user_name: name.to_string(),
        color: "#457b9d".to_string(),
    }
}

#[tokio::test]
async fn test_presence_flows_relay_to_tracker() {
    let relay = CursorRelay::new();
    let alice = identity("Alice");
    let bob = identity("Bob");

    // Alice is already live when Bob joins.
    relay.publish(Cursor::new(&alice, 10.0, 20.0));

    let mut tracker = PresenceTracker::new(Some(bob.clone()));
    let (init, mut rx) = relay.connect();
    tracker.apply(init);
    assert_eq!(tracker.cursor_count(), 1);

    // Bob publishes his own sample; his tracker ignores the echo.
    let sample = tracker.sample(5.0, 5.0).unwrap();
    relay.publish(sample);
    relay.publish(Cursor::new(&alice, 30.0, 40.0));
    while let Ok(event) = rx.try_recv() {
        tracker.apply(event);
    }

    assert_eq!(tracker.cursor_count(), 1);
    let cursor = tracker.cursors().next().unwrap();
    assert_eq!(cursor.session_id, alice.id);
    assert_eq!((cursor.x, cursor.y), (30.0, 40.0));
}

#[tokio::test]
async fn test_sweep_propagates_removal_to_tracker() {
    let relay = CursorRelay::new();
    let alice = identity("Alice");
    // Publish a sample that went silent long ago.
    let mut cursor = Cursor::new(&alice, 0.0, 0.0);
    cursor.last_seen = now_millis().saturating_sub(CURSOR_TTL_MS + 1);
    relay.publish(cursor);

    let mut tracker = PresenceTracker::new(Some(identity("Bob")));
    let (init, mut rx) = relay.connect();
    tracker.apply(init);
    assert_eq!(tracker.cursor_count(), 1);

    assert_eq!(relay.sweep(now_millis()), 1);
    while let Ok(event) = rx.try_recv() {
        tracker.apply(event);
    }
    assert_eq!(tracker.cursor_count(), 0);
}

#[tokio::test]
async fn test_disabled_presence_publishes_nothing() {
    let relay = CursorRelay::new();
    let tracker = PresenceTracker::new(None);
    assert!(tracker.sample(1.0, 1.0).is_none());
    assert_eq!(relay.cursor_count(), 0);
}
