//! Ephemeral cursor relay.
//!
//! Cursor positions are presence, not document state: nothing here is
//! persisted, replayed, or ordered against the store. A connecting peer gets
//! an init snapshot of the currently-live cursors plus a live event stream;
//! after that every publish is fanned out as-is.
//!
//! Liveness is heartbeat-based. Publishing a cursor refreshes its
//! `last_seen`; a background sweep runs every [`SWEEP_INTERVAL_MS`] and
//! evicts cursors not refreshed within [`CURSOR_TTL_MS`], broadcasting a
//! removal so peers drop them too. Explicit disconnects remove immediately.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use corkboard_client::RelayEvent;
use corkboard_types::{now_millis, Cursor, SessionId};

/// How long a cursor survives without a heartbeat.
pub const CURSOR_TTL_MS: u64 = 10_000;
/// How often stale cursors are swept.
pub const SWEEP_INTERVAL_MS: u64 = 5_000;

/// Buffered events per peer before the receiver starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out hub for live cursor positions on one board.
pub struct CursorRelay {
    cursors: DashMap<SessionId, Cursor>,
    events_tx: broadcast::Sender<RelayEvent>,
}

impl CursorRelay {
    pub fn new() -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self { cursors: DashMap::new(), events_tx })
    }

    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    /// Join the relay: the current live cursors plus a subscription to
    /// everything that happens after the snapshot was taken.
    pub fn connect(&self) -> (RelayEvent, broadcast::Receiver<RelayEvent>) {
        // Subscribe before snapshotting so no event between the two is lost;
        // an update racing the snapshot is applied twice, harmlessly.
        let rx = self.events_tx.subscribe();
        let init = RelayEvent::Init(self.cursors.iter().map(|e| e.value().clone()).collect());
        (init, rx)
    }

    /// Publish a cursor sample. Doubles as the liveness heartbeat.
    pub fn publish(&self, cursor: Cursor) {
        trace!(session = %cursor.session_id, x = cursor.x, y = cursor.y, "cursor published");
        self.cursors.insert(cursor.session_id, cursor.clone());
        let _ = self.events_tx.send(RelayEvent::CursorUpdated(cursor));
    }

    /// Explicit disconnect: drop the cursor now instead of waiting for the
    /// sweep.
    pub fn remove(&self, session_id: SessionId) {
        if self.cursors.remove(&session_id).is_some() {
            debug!(session = %session_id, "cursor removed");
            let _ = self.events_tx.send(RelayEvent::CursorRemoved(session_id));
        }
    }

    /// Evict every cursor whose heartbeat is older than [`CURSOR_TTL_MS`].
    /// Returns how many were evicted.
    pub fn sweep(&self, now_ms: u64) -> usize {
        let stale: Vec<SessionId> = self
            .cursors
            .iter()
            .filter(|e| e.value().is_stale(now_ms, CURSOR_TTL_MS))
            .map(|e| *e.key())
            .collect();
        for session_id in &stale {
            self.cursors.remove(session_id);
            debug!(session = %session_id, "stale cursor evicted");
            let _ = self.events_tx.send(RelayEvent::CursorRemoved(*session_id));
        }
        stale.len()
    }

    /// Spawn the periodic sweep task. The task runs until the relay is
    /// dropped everywhere else, then exits on its own.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let relay = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(SWEEP_INTERVAL_MS));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(relay) = relay.upgrade() else {
                    break;
                };
                relay.sweep(now_millis());
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use corkboard_types::SessionIdentity;

    fn identity(name: &str) -> SessionIdentity {
        SessionIdentity {
            id: SessionId::new(),
            user_name: name.to_string(),
            color: "#e63946".to_string(),
        }
    }

    #[tokio::test]
    async fn test_connect_receives_init_snapshot() {
        let relay = CursorRelay::new();
        let alice = identity("Alice");
        relay.publish(Cursor::new(&alice, 10.0, 20.0));

        let (init, _rx) = relay.connect();
        match init {
            RelayEvent::Init(cursors) => {
                assert_eq!(cursors.len(), 1);
                assert_eq!(cursors[0].session_id, alice.id);
            }
            other => panic!("expected init snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_fans_out_to_peers() {
        let relay = CursorRelay::new();
        let (_, mut rx) = relay.connect();

        let bob = identity("Bob");
        relay.publish(Cursor::new(&bob, 1.0, 2.0));

        match rx.recv().await.unwrap() {
            RelayEvent::CursorUpdated(c) => assert_eq!(c.session_id, bob.id),
            other => panic!("expected cursor update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_republish_refreshes_not_duplicates() {
        let relay = CursorRelay::new();
        let alice = identity("Alice");
        relay.publish(Cursor::new(&alice, 1.0, 1.0));
        relay.publish(Cursor::new(&alice, 9.0, 9.0));
        assert_eq!(relay.cursor_count(), 1);
    }

    #[tokio::test]
    async fn test_explicit_remove_broadcasts() {
        let relay = CursorRelay::new();
        let alice = identity("Alice");
        relay.publish(Cursor::new(&alice, 1.0, 1.0));

        let (_, mut rx) = relay.connect();
        relay.remove(alice.id);
        assert_eq!(relay.cursor_count(), 0);
        match rx.recv().await.unwrap() {
            RelayEvent::CursorRemoved(id) => assert_eq!(id, alice.id),
            other => panic!("expected removal, got {other:?}"),
        }

        // Removing an unknown session emits nothing.
        relay.remove(SessionId::new());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_stale() {
        let relay = CursorRelay::new();
        let alice = identity("Alice");
        let bob = identity("Bob");

        let now = now_millis();
        let mut stale = Cursor::new(&alice, 0.0, 0.0);
        stale.last_seen = now - CURSOR_TTL_MS - 1;
        let mut fresh = Cursor::new(&bob, 0.0, 0.0);
        fresh.last_seen = now - CURSOR_TTL_MS / 2;
        relay.cursors.insert(stale.session_id, stale);
        relay.cursors.insert(fresh.session_id, fresh);

        let (_, mut rx) = relay.connect();
        assert_eq!(relay.sweep(now), 1);
        assert_eq!(relay.cursor_count(), 1);
        match rx.recv().await.unwrap() {
            RelayEvent::CursorRemoved(id) => assert_eq!(id, alice.id),
            other => panic!("expected removal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_cursor_alive() {
        let relay = CursorRelay::new();
        let alice = identity("Alice");
        relay.publish(Cursor::new(&alice, 0.0, 0.0));
        // A fresh publish is never stale at sweep time.
        assert_eq!(relay.sweep(now_millis()), 0);
        assert_eq!(relay.cursor_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_runs_periodically() {
        let relay = CursorRelay::new();
        let handle = relay.spawn_sweeper();

        let alice = identity("Alice");
        let mut cursor = Cursor::new(&alice, 0.0, 0.0);
        cursor.last_seen = now_millis().saturating_sub(CURSOR_TTL_MS + 1);
        relay.cursors.insert(cursor.session_id, cursor);

        // Advance paused time past one sweep interval and let the task run.
        tokio::time::advance(Duration::from_millis(SWEEP_INTERVAL_MS + 100)).await;
        tokio::task::yield_now().await;
        assert_eq!(relay.cursor_count(), 0);

        drop(relay);
        tokio::time::advance(Duration::from_millis(SWEEP_INTERVAL_MS + 100)).await;
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }
}
