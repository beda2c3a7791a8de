//! The two-phase node-creation gesture.
//!
//! Local, UI-thread-only state; nothing is persisted until the final
//! pointer-up. Pointer coordinates come in as screen pixels and are converted
//! to canvas space only when the blueprint is finalized.
//!
//! # State Machine
//!
//! ```text
//! +----------+  pointer_down            +----------+
//! |   Idle   | ------------------------>|  Sizing  |  rubber-band rect
//! +----------+                          +----+-----+
//!      ^                                     | pointer_up, extent >= MIN_NODE_SIZE
//!      |  pointer_up (too small: discard)    v
//!      |                           +-------------------+
//!      +---------------------------| PlacingConnectors |  count from drag distance
//!         pointer_up (finalize)    +-------------------+
//! ```
//!
//! In `PlacingConnectors` the connector count tracks the pointer live:
//! `clamp(floor(distance(release, current) / CONNECTOR_DISTANCE_FACTOR),
//! MIN_CONNECTORS, MAX_CONNECTORS)`.

use corkboard_types::{
    redistribute_connectors, Connector, Point, Rect, Viewport, MIN_NODE_SIZE,
};

/// Screen-pixels of drag per additional input connector.
pub const CONNECTOR_DISTANCE_FACTOR: f64 = 20.0;
/// Fewest input connectors a created node can have.
pub const MIN_CONNECTORS: usize = 1;
/// Most input connectors a created node can have.
pub const MAX_CONNECTORS: usize = 8;

/// Everything needed to materialize a gestured node: its canvas-space
/// rectangle (already clamped into bounds) and its initial connectors.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeBlueprint {
    pub rect: Rect,
    pub connectors: Vec<Connector>,
}

/// The gesture state machine. All coordinates are screen-space.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CreateGesture {
    #[default]
    Idle,
    Sizing {
        start: Point,
        current: Point,
    },
    PlacingConnectors {
        rect: Rect,
        release: Point,
        current: Point,
    },
}

impl CreateGesture {
    pub fn new() -> Self {
        CreateGesture::Idle
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CreateGesture::Idle)
    }

    /// The rubber-band rectangle while sizing, or the fixed rectangle while
    /// placing connectors (screen-space).
    pub fn preview_rect(&self) -> Option<Rect> {
        match self {
            CreateGesture::Idle => None,
            CreateGesture::Sizing { start, current } => {
                Some(Rect::from_corners(*start, *current))
            }
            CreateGesture::PlacingConnectors { rect, .. } => Some(*rect),
        }
    }

    /// Live connector count while placing; `None` in other states.
    pub fn connector_count(&self) -> Option<usize> {
        match self {
            CreateGesture::PlacingConnectors { release, current, .. } => {
                Some(count_for_distance(release.distance(*current)))
            }
            _ => None,
        }
    }

    /// Begin sizing. Only meaningful from `Idle` — the caller gates on the
    /// active tool and on not being over a connector.
    pub fn pointer_down(&mut self, at: Point) {
        if self.is_idle() {
            *self = CreateGesture::Sizing { start: at, current: at };
        }
    }

    pub fn pointer_move(&mut self, at: Point) {
        match self {
            CreateGesture::Idle => {}
            CreateGesture::Sizing { current, .. } => *current = at,
            CreateGesture::PlacingConnectors { current, .. } => *current = at,
        }
    }

    /// Advance the gesture on pointer release.
    ///
    /// - Sizing → PlacingConnectors when both extents reach [`MIN_NODE_SIZE`],
    ///   otherwise the gesture is discarded. Returns `None` either way.
    /// - PlacingConnectors → Idle, returning the finalized blueprint with the
    ///   rectangle converted through `viewport` and clamped into canvas
    ///   bounds.
    pub fn pointer_up(&mut self, at: Point, viewport: &Viewport) -> Option<NodeBlueprint> {
        match std::mem::take(self) {
            CreateGesture::Idle => None,
            CreateGesture::Sizing { start, .. } => {
                let rect = Rect::from_corners(start, at);
                if rect.width >= MIN_NODE_SIZE && rect.height >= MIN_NODE_SIZE {
                    *self = CreateGesture::PlacingConnectors {
                        rect,
                        release: at,
                        current: at,
                    };
                }
                None
            }
            CreateGesture::PlacingConnectors { rect, release, .. } => {
                let inputs = count_for_distance(release.distance(at));
                let canvas_rect = viewport.rect_to_canvas(rect).clamp_to_canvas();
                Some(NodeBlueprint {
                    rect: canvas_rect,
                    connectors: initial_connectors(inputs),
                })
            }
        }
    }
}

fn count_for_distance(distance: f64) -> usize {
    let raw = (distance / CONNECTOR_DISTANCE_FACTOR).floor() as usize;
    raw.clamp(MIN_CONNECTORS, MAX_CONNECTORS)
}

/// `n` evenly spaced input connectors on the left plus one output centered
/// on the right.
fn initial_connectors(inputs: usize) -> Vec<Connector> {
    let mut connectors: Vec<Connector> = (0..inputs)
        .map(|i| Connector::input(format!("in-{}", i + 1)))
        .collect();
    connectors.push(Connector::output("out-1"));
    redistribute_connectors(&mut connectors);
    connectors
}

// ============================================================================
// Tests
// ============================================================================
