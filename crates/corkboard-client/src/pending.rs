//! Optimistic mutation tracking and snapshot reconciliation.
//!
//! Before a client issues a remote write it records its *expectation* here;
//! when the next authoritative node snapshot arrives, [`MutationTracker::reconcile`]
//! compares each expectation against what the server actually stored. A
//! mismatch is a **conflict**: the server version wins unconditionally (local
//! state is overwritten by the snapshot regardless), and a transient
//! [`ConflictNotice`] is raised so the UI can say "server version restored".
//!
//! # What this is — and is not
//!
//! One pending record per node, newest write wins:
//!
//! ```text
//! begin(n, Position{10,10})    pending[n] = Position{10,10}
//! begin(n, Position{30,30})    pending[n] = Position{30,30}   (replaces)
//! reconcile(snapshot)          compare ONLY against {30,30}
//! ```
//!
//! A conflict can therefore only be detected against the *latest*
//! expectation, never superseded ones. This is a deliberate simplification —
//! a simplified optimistic-concurrency token, not exhaustive conflict
//! detection. A stricter design would compare server-assigned version
//! counters instead of values.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use tracing::{debug, trace, warn};

use corkboard_types::{now_millis, Connector, Node, NodeId, NodeStatus, TimeUnit};

/// Positions within this distance per axis are "the same" — float drift and
/// server rounding must not masquerade as conflicts.
pub const POSITION_TOLERANCE: f64 = 1.0;

/// How long a conflict notice stays visible before auto-clearing.
pub const CONFLICT_TTL_MS: u64 = 3_000;

/// The field a pending write targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PendingKind {
    Position,
    Text,
    Description,
    Status,
    TimeEstimate,
    TimeUnit,
    Connectors,
}

impl PendingKind {
    /// Human-facing field name for notices and logs.
    pub fn field_name(self) -> &'static str {
        match self {
            PendingKind::Position => "position",
            PendingKind::Text => "title",
            PendingKind::Description => "description",
            PendingKind::Status => "status",
            PendingKind::TimeEstimate => "time estimate",
            PendingKind::TimeUnit => "time unit",
            PendingKind::Connectors => "connectors",
        }
    }
}

/// The value the client expects the server to have stored.
#[derive(Clone, Debug, PartialEq)]
pub enum Expected {
    Position { x: f64, y: f64 },
    Text(String),
    Description(Option<String>),
    Status(NodeStatus),
    TimeEstimate(Option<f64>),
    TimeUnit(TimeUnit),
    Connectors(Vec<Connector>),
}

impl Expected {
    pub fn kind(&self) -> PendingKind {
        match self {
            Expected::Position { .. } => PendingKind::Position,
            Expected::Text(_) => PendingKind::Text,
            Expected::Description(_) => PendingKind::Description,
            Expected::Status(_) => PendingKind::Status,
            Expected::TimeEstimate(_) => PendingKind::TimeEstimate,
            Expected::TimeUnit(_) => PendingKind::TimeUnit,
            Expected::Connectors(_) => PendingKind::Connectors,
        }
    }

    /// Type-specific equality against the authoritative node: positions
    /// within [`POSITION_TOLERANCE`] per axis, everything else exact.
    fn matches(&self, node: &Node) -> bool {
        match self {
            Expected::Position { x, y } => {
                (node.x - x).abs() <= POSITION_TOLERANCE
                    && (node.y - y).abs() <= POSITION_TOLERANCE
            }
            Expected::Text(text) => node.text == *text,
            Expected::Description(desc) => node.description == *desc,
            Expected::Status(status) => node.status == *status,
            Expected::TimeEstimate(est) => node.time_estimate == *est,
            Expected::TimeUnit(unit) => node.time_unit == *unit,
            Expected::Connectors(connectors) => node.connectors == *connectors,
        }
    }
}

/// One in-flight local write.
#[derive(Clone, Debug)]
pub struct PendingWrite {
    pub expected: Expected,
    /// Unix millis when the write was issued.
    pub at: u64,
}

/// Transient "conflict detected — server version restored" signal.
///
/// Not an error: the server value has already won. Auto-expires
/// [`CONFLICT_TTL_MS`] after being raised.
#[derive(Clone, Debug, PartialEq)]
pub struct ConflictNotice {
    pub node_id: NodeId,
    pub kind: PendingKind,
    pub message: String,
    pub raised_at: u64,
}

impl ConflictNotice {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.raised_at) >= CONFLICT_TTL_MS
    }
}

/// Tracks in-flight local writes and reconciles them against authoritative
/// snapshots.
#[derive(Debug, Default)]
pub struct MutationTracker {
    /// At most one in-flight record per node; newer writes replace older.
    pending: HashMap<NodeId, PendingWrite>,
    /// Conflicts raised and not yet expired/drained.
    conflicts: Vec<ConflictNotice>,
    /// Digest of the last snapshot processed, for de-duplication.
    last_digest: Option<u64>,
    /// Bumped on every snapshot actually processed (not skipped).
    generation: u64,
}

impl MutationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record intent before issuing a remote write. A newer write for the
    /// same node replaces the older pending record.
    pub fn begin(&mut self, node_id: NodeId, expected: Expected) {
        trace!(node = %node_id, kind = ?expected.kind(), "pending write recorded");
        self.pending
            .insert(node_id, PendingWrite { expected, at: now_millis() });
    }

    /// Drop the pending record for a node (e.g. after a rolled-back write —
    /// there is nothing left to reconcile).
    pub fn abandon(&mut self, node_id: NodeId) {
        self.pending.remove(&node_id);
    }

    /// Number of in-flight records.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Snapshot-processing counter (bumped when a snapshot is not a duplicate).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reconcile pending expectations against a full authoritative snapshot.
    ///
    /// Every pending record whose node appears in the snapshot is resolved —
    /// removed whether or not it conflicted. Records for nodes absent from
    /// the snapshot were deleted remotely and are dropped silently. Redundant
    /// snapshots (identical relevant fields) are skipped entirely.
    ///
    /// Returns the conflicts raised by *this* snapshot.
    pub fn reconcile(&mut self, snapshot: &HashMap<NodeId, Node>) -> Vec<ConflictNotice> {
        let digest = snapshot_digest(snapshot);
        if self.last_digest == Some(digest) {
            trace!("snapshot unchanged since last reconcile, skipping");
            return Vec::new();
        }
        self.last_digest = Some(digest);
        self.generation = self.generation.wrapping_add(1);

        if self.pending.is_empty() {
            return Vec::new();
        }

        let now = now_millis();
        let mut raised = Vec::new();
        let resolved: Vec<NodeId> = self.pending.keys().copied().collect();

        for node_id in resolved {
            let Some(write) = self.pending.remove(&node_id) else {
                continue;
            };
            let Some(actual) = snapshot.get(&node_id) else {
                debug!(node = %node_id, "pending write for remotely-deleted node dropped");
                continue;
            };
            if write.expected.matches(actual) {
                trace!(node = %node_id, kind = ?write.expected.kind(), "pending write confirmed");
                continue;
            }
            let kind = write.expected.kind();
            warn!(
                node = %node_id,
                field = kind.field_name(),
                "conflict detected, server version restored"
            );
            raised.push(ConflictNotice {
                node_id,
                kind,
                message: format!(
                    "Someone else changed this {} — server version restored",
                    kind.field_name()
                ),
                raised_at: now,
            });
        }

        self.conflicts.extend(raised.iter().cloned());
        raised
    }

    /// Conflicts still within their display window, oldest first. Expired
    /// notices are pruned as a side effect (the 3 s auto-clear).
    pub fn active_conflicts(&mut self, now_ms: u64) -> &[ConflictNotice] {
        self.conflicts.retain(|c| !c.is_expired(now_ms));
        &self.conflicts
    }
}

/// Digest of the snapshot fields reconciliation cares about. Iteration is
/// id-sorted so the digest is stable across `HashMap` orderings.
fn snapshot_digest(snapshot: &HashMap<NodeId, Node>) -> u64 {
    let mut ids: Vec<&NodeId> = snapshot.keys().collect();
    ids.sort();

    let mut hasher = DefaultHasher::new();
    for id in ids {
        // Serializing entity types with plain-data fields cannot fail.
        if let Ok(json) = serde_json::to_string(&snapshot[id]) {
            json.hash(&mut hasher);
        }
    }
    hasher.finish()
}

// ============================================================================
// Tests
// ============================================================================
