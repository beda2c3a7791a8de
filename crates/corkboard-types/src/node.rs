//! Canvas nodes and their connectors.
//!
//! A [`Node`] is a positioned rectangle with a title, an optional
//! description, a workflow [`NodeStatus`], a time estimate, and a set of
//! [`Connector`] attachment points. Geometry lives in canvas coordinates and
//! is clamped to the canvas bounds by construction (`Node::new`) and by
//! `set_position`.
//!
//! Connector layout invariant: connectors sharing the same `(kind, side)`
//! group are kept evenly spaced along that side — [`redistribute_connectors`]
//! rewrites the group's positions to `100*(i+1)/(n+1)` and is called by every
//! add/remove path.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::geometry::{Rect, MIN_NODE_SIZE};
use crate::ids::NodeId;

/// Forward workflow state, used for visual coding and the critical-path
/// calculation.
///
/// This is *not* a gated state machine: users cycle it freely with
/// [`NodeStatus::cycled`], independent of dependency completion.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash,
    Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NodeStatus {
    #[default]
    NotReady,
    CanStart,
    InProgress,
    Complete,
}

impl NodeStatus {
    /// Next status in round-robin cycle order.
    pub fn cycled(self) -> Self {
        match self {
            NodeStatus::NotReady => NodeStatus::CanStart,
            NodeStatus::CanStart => NodeStatus::InProgress,
            NodeStatus::InProgress => NodeStatus::Complete,
            NodeStatus::Complete => NodeStatus::NotReady,
        }
    }

    pub fn is_complete(self) -> bool {
        self == NodeStatus::Complete
    }
}

/// Display unit for a node's time estimate.
///
/// Internally all arithmetic is done in hours; these conversions only apply
/// at the edges (user input and display).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash,
    Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TimeUnit {
    Minutes,
    #[default]
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    /// Convert a value expressed in this unit into hours.
    pub fn to_hours(self, value: f64) -> f64 {
        match self {
            TimeUnit::Minutes => value / 60.0,
            TimeUnit::Hours => value,
            TimeUnit::Days => value * 24.0,
            TimeUnit::Weeks => value * 168.0,
        }
    }

    /// Convert a value in hours into this unit.
    pub fn from_hours(self, hours: f64) -> f64 {
        match self {
            TimeUnit::Minutes => hours * 60.0,
            TimeUnit::Hours => hours,
            TimeUnit::Days => hours / 24.0,
            TimeUnit::Weeks => hours / 168.0,
        }
    }
}

/// Which way data flows through a connector.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ConnectorKind {
    Input,
    Output,
}

/// Side of the node rectangle a connector sits on.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    /// Legacy records omit the connector kind; infer it from the side.
    /// Left-side connectors are inputs, everything else is an output.
    pub fn implied_kind(self) -> ConnectorKind {
        match self {
            Side::Left => ConnectorKind::Input,
            _ => ConnectorKind::Output,
        }
    }
}

/// A named attachment point on a node's border.
///
/// `position` is a percentage offset (0–100) along `side`. The id is unique
/// within the owning node only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConnectorWire")]
pub struct Connector {
    pub id: String,
    pub kind: ConnectorKind,
    pub side: Side,
    pub position: f64,
}

impl Connector {
    pub fn new(id: impl Into<String>, kind: ConnectorKind, side: Side, position: f64) -> Self {
        Self { id: id.into(), kind, side, position }
    }

    /// An input connector on the left side (position filled in by
    /// redistribution).
    pub fn input(id: impl Into<String>) -> Self {
        Self::new(id, ConnectorKind::Input, Side::Left, 50.0)
    }

    /// An output connector on the right side.
    pub fn output(id: impl Into<String>) -> Self {
        Self::new(id, ConnectorKind::Output, Side::Right, 50.0)
    }
}

/// Wire form of [`Connector`]: `kind` may be absent in legacy records and is
/// then inferred from `side`.
#[derive(Deserialize)]
struct ConnectorWire {
    id: String,
    #[serde(default)]
    kind: Option<ConnectorKind>,
    side: Side,
    #[serde(default = "default_position")]
    position: f64,
}

fn default_position() -> f64 {
    50.0
}

impl From<ConnectorWire> for Connector {
    fn from(w: ConnectorWire) -> Self {
        Connector {
            kind: w.kind.unwrap_or_else(|| w.side.implied_kind()),
            id: w.id,
            side: w.side,
            position: w.position,
        }
    }
}

/// Rewrite positions so each `(kind, side)` group is evenly spaced:
/// `100*(i+1)/(n+1)` in order of appearance within the group.
pub fn redistribute_connectors(connectors: &mut [Connector]) {
    let groups: Vec<(ConnectorKind, Side)> = {
        let mut seen = Vec::new();
        for c in connectors.iter() {
            if !seen.contains(&(c.kind, c.side)) {
                seen.push((c.kind, c.side));
            }
        }
        seen
    };

    for (kind, side) in groups {
        let n = connectors
            .iter()
            .filter(|c| c.kind == kind && c.side == side)
            .count();
        let mut i = 0usize;
        for c in connectors.iter_mut() {
            if c.kind == kind && c.side == side {
                c.position = 100.0 * (i as f64 + 1.0) / (n as f64 + 1.0);
                i += 1;
            }
        }
    }
}

/// A node on the canvas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub time_estimate: Option<f64>,
    #[serde(default)]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub connectors: Vec<Connector>,
}

impl Node {
    /// Create a node from a canvas-space rectangle. The rectangle is clamped
    /// into canvas bounds and its extents raised to [`MIN_NODE_SIZE`].
    pub fn new(id: NodeId, rect: Rect, text: impl Into<String>) -> Self {
        let rect = Rect {
            width: rect.width.max(MIN_NODE_SIZE),
            height: rect.height.max(MIN_NODE_SIZE),
            ..rect
        }
        .clamp_to_canvas();
        Self {
            id,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            text: text.into(),
            description: None,
            status: NodeStatus::default(),
            time_estimate: None,
            time_unit: TimeUnit::default(),
            connectors: Vec::new(),
        }
    }

    /// The node's bounding rectangle.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Move the node, clamping so its full extent stays on the canvas.
    pub fn set_position(&mut self, x: f64, y: f64) {
        let r = Rect::new(x, y, self.width, self.height).clamp_to_canvas();
        self.x = r.x;
        self.y = r.y;
    }

    /// Estimate converted to hours; `None`/absent estimates count as 0.
    pub fn estimate_hours(&self) -> f64 {
        self.time_unit.to_hours(self.time_estimate.unwrap_or(0.0))
    }

    /// Look up a connector by id.
    pub fn connector(&self, id: &str) -> Option<&Connector> {
        self.connectors.iter().find(|c| c.id == id)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CANVAS_MAX_X, CANVAS_MIN_Y};

    fn positions(connectors: &[Connector], kind: ConnectorKind, side: Side) -> Vec<f64> {
        connectors
            .iter()
            .filter(|c| c.kind == kind && c.side == side)
            .map(|c| c.position)
            .collect()
    }

    // ── Status & units ──────────────────────────────────────────────────

    #[test]
    fn test_status_cycle_order() {
        let mut s = NodeStatus::NotReady;
        let expected = [
            NodeStatus::CanStart,
            NodeStatus::InProgress,
            NodeStatus::Complete,
            NodeStatus::NotReady,
        ];
        for want in expected {
            s = s.cycled();
            assert_eq!(s, want);
        }
    }

    #[test]
    fn test_status_wire_format_is_kebab_case() {
        let json = serde_json::to_string(&NodeStatus::NotReady).unwrap();
        assert_eq!(json, "\"not-ready\"");
        let parsed: NodeStatus = serde_json::from_str("\"in-progress\"").unwrap();
        assert_eq!(parsed, NodeStatus::InProgress);
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(TimeUnit::Minutes.from_hours(1.0), 60.0);
        assert_eq!(TimeUnit::Days.from_hours(48.0), 2.0);
        assert_eq!(TimeUnit::Weeks.from_hours(168.0), 1.0);
        assert_eq!(TimeUnit::Hours.to_hours(3.5), 3.5);
        assert_eq!(TimeUnit::Minutes.to_hours(90.0), 1.5);
    }

    // ── Connector wire compat ───────────────────────────────────────────

    #[test]
    fn test_connector_kind_inferred_from_side() {
        let legacy = r#"{"id":"c1","side":"left"}"#;
        let c: Connector = serde_json::from_str(legacy).unwrap();
        assert_eq!(c.kind, ConnectorKind::Input);
        assert_eq!(c.position, 50.0);

        let legacy = r#"{"id":"c2","side":"bottom"}"#;
        let c: Connector = serde_json::from_str(legacy).unwrap();
        assert_eq!(c.kind, ConnectorKind::Output);
    }

    #[test]
    fn test_connector_explicit_kind_wins() {
        // An explicitly-typed output on the left side stays an output.
        let json = r#"{"id":"c1","kind":"output","side":"left","position":25.0}"#;
        let c: Connector = serde_json::from_str(json).unwrap();
        assert_eq!(c.kind, ConnectorKind::Output);
        assert_eq!(c.position, 25.0);
    }

    #[test]
    fn test_connector_json_roundtrip() {
        let c = Connector::new("in-1", ConnectorKind::Input, Side::Left, 33.0);
        let json = serde_json::to_string(&c).unwrap();
        let parsed: Connector = serde_json::from_str(&json).unwrap();
        assert_eq!(c, parsed);
    }

    // ── Redistribution invariant ────────────────────────────────────────

    #[test]
    fn test_redistribute_single_group() {
        let mut cs = vec![
            Connector::input("a"),
            Connector::input("b"),
            Connector::input("c"),
        ];
        redistribute_connectors(&mut cs);
        assert_eq!(positions(&cs, ConnectorKind::Input, Side::Left), vec![25.0, 50.0, 75.0]);
    }

    #[test]
    fn test_redistribute_groups_independent() {
        let mut cs = vec![
            Connector::input("in-1"),
            Connector::output("out-1"),
            Connector::input("in-2"),
        ];
        redistribute_connectors(&mut cs);
        assert_eq!(
            positions(&cs, ConnectorKind::Input, Side::Left),
            vec![100.0 / 3.0, 200.0 / 3.0]
        );
        assert_eq!(positions(&cs, ConnectorKind::Output, Side::Right), vec![50.0]);
    }

    #[test]
    fn test_redistribute_after_removal_sequence() {
        let mut cs: Vec<Connector> =
            (0..5).map(|i| Connector::input(format!("in-{i}"))).collect();
        redistribute_connectors(&mut cs);

        // Remove the middle connector; remaining four re-spread evenly.
        cs.retain(|c| c.id != "in-2");
        redistribute_connectors(&mut cs);
        assert_eq!(
            positions(&cs, ConnectorKind::Input, Side::Left),
            vec![20.0, 40.0, 60.0, 80.0]
        );
    }

    // ── Node geometry ───────────────────────────────────────────────────

    #[test]
    fn test_new_node_enforces_min_size_and_bounds() {
        let n = Node::new(NodeId::new(), Rect::new(-100.0, -100.0, 10.0, 10.0), "t");
        assert_eq!(n.width, MIN_NODE_SIZE);
        assert_eq!(n.height, MIN_NODE_SIZE);
        assert!(n.rect().within_canvas());
    }

    #[test]
    fn test_set_position_clamps() {
        let mut n = Node::new(NodeId::new(), Rect::new(0.0, 0.0, 100.0, 100.0), "t");
        n.set_position(CANVAS_MAX_X + 500.0, -30.0);
        assert_eq!(n.x + n.width, CANVAS_MAX_X);
        assert_eq!(n.y, CANVAS_MIN_Y);
        assert!(n.rect().within_canvas());
    }

    #[test]
    fn test_estimate_hours() {
        let mut n = Node::new(NodeId::new(), Rect::new(0.0, 0.0, 100.0, 100.0), "t");
        assert_eq!(n.estimate_hours(), 0.0);
        n.time_estimate = Some(2.0);
        n.time_unit = TimeUnit::Days;
        assert_eq!(n.estimate_hours(), 48.0);
    }

    #[test]
    fn test_node_json_defaults() {
        // Minimal wire record — everything optional falls back to defaults.
        let json = format!(
            r#"{{"id":"{}","x":1.0,"y":2.0,"width":50.0,"height":60.0,"text":"hi"}}"#,
            NodeId::new()
        );
        let n: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(n.status, NodeStatus::NotReady);
        assert_eq!(n.time_unit, TimeUnit::Hours);
        assert!(n.connectors.is_empty());
    }
}
