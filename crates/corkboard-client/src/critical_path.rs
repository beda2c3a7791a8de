//! Time-until-ready: the dependency critical path feeding a node.
//!
//! Pure functions over the authoritative node/edge sets — nothing here
//! mutates the graph, and nothing is incrementally maintained. The
//! calculation is re-run on demand (details popup opening, or the
//! recalculation registry firing after a snapshot).
//!
//! Dependencies run in parallel, so combining them is always `max`, never a
//! sum: a node is ready when its *slowest* incomplete dependency chain
//! finishes. All arithmetic happens in hours; the result is converted to the
//! target node's display unit at the very end.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use corkboard_types::{Edge, Node, NodeId};

/// Hours until every incomplete dependency of `target` could be finished,
/// converted to the target's own display unit and rounded to one decimal.
///
/// 0.0 when the target is complete, unknown, or has no incomplete
/// dependencies (ready now).
pub fn time_until_ready(
    target: NodeId,
    nodes: &HashMap<NodeId, Node>,
    edges: &[Edge],
) -> f64 {
    let Some(node) = nodes.get(&target) else {
        return 0.0;
    };
    if node.status.is_complete() {
        return 0.0;
    }

    let hours = incomplete_dependencies(target, nodes, edges)
        .into_iter()
        .map(|dep| {
            let mut visiting = HashSet::from([target]);
            time_to_complete(dep, nodes, edges, &mut visiting)
        })
        .fold(0.0, f64::max);

    round1(node.time_unit.from_hours(hours))
}

/// Hours for `node` itself to finish: its own estimate plus the longest of
/// its incomplete dependency chains. Complete nodes cost 0.
fn time_to_complete(
    node_id: NodeId,
    nodes: &HashMap<NodeId, Node>,
    edges: &[Edge],
    visiting: &mut HashSet<NodeId>,
) -> f64 {
    let Some(node) = nodes.get(&node_id) else {
        return 0.0;
    };
    if node.status.is_complete() {
        return 0.0;
    }
    if !visiting.insert(node_id) {
        // Defensive fallback, not a correctness guarantee for cyclic graphs:
        // a node in its own ancestry contributes nothing.
        warn!(node = %node_id, "dependency cycle detected, treating repeated node as 0");
        return 0.0;
    }

    let dependency_hours = incomplete_dependencies(node_id, nodes, edges)
        .into_iter()
        .map(|dep| time_to_complete(dep, nodes, edges, visiting))
        .fold(0.0, f64::max);

    visiting.remove(&node_id);
    node.estimate_hours() + dependency_hours
}

/// Source nodes of edges targeting `node_id` whose status is not complete.
fn incomplete_dependencies(
    node_id: NodeId,
    nodes: &HashMap<NodeId, Node>,
    edges: &[Edge],
) -> Vec<NodeId> {
    edges
        .iter()
        .filter(|e| e.target == node_id)
        .filter_map(|e| nodes.get(&e.source))
        .filter(|n| !n.status.is_complete())
        .map(|n| n.id)
        .collect()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================================
// Tests
// ============================================================================
