//! Shared identity and canvas entity types for Corkboard.
//!
//! This crate is the relational foundation: typed IDs, nodes, connectors,
//! edges, cursors, and the canvas coordinate space. It has **no internal
//! corkboard dependencies** — a pure leaf crate that other crates build on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Node (NodeId) ← a positioned rectangle on the bounded canvas
//!     └── owns Connector (string id, unique within the node)
//!     └── endpoint of Edge (EdgeId, source → target)
//!
//! Edge (EdgeId)
//!     └── source/target reference Node
//!     └── source_handle/target_handle optionally reference Connector ids
//!
//! SessionIdentity (SessionId) ← per-browser-tab identity
//!     └── stamps Cursor samples relayed to peers
//! ```

pub mod cursor;
pub mod edge;
pub mod geometry;
pub mod ids;
pub mod node;

// Re-export primary types at crate root for convenience.
pub use cursor::{Cursor, SessionIdentity};
pub use edge::Edge;
pub use geometry::{
    Point, Rect, Viewport, CANVAS_MAX_X, CANVAS_MAX_Y, CANVAS_MIN_X, CANVAS_MIN_Y, MIN_NODE_SIZE,
};
pub use ids::{EdgeId, NodeId, SessionId};
pub use node::{
    redistribute_connectors, Connector, ConnectorKind, Node, NodeStatus, Side, TimeUnit,
};

/// Current time as Unix milliseconds. Used by constructors throughout the
/// workspace.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
