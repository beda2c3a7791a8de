//! Canvas coordinate space: points, rectangles, and the viewport transform.
//!
//! The canvas is a fixed bounded plane. Every node's full extent must stay
//! inside [`CANVAS_MIN_X`]..=[`CANVAS_MAX_X`] × [`CANVAS_MIN_Y`]..=[`CANVAS_MAX_Y`]
//! after placement or movement; `Rect::clamp_to_canvas` is the single place
//! that enforces it.
//!
//! Pointer events arrive in screen pixels; [`Viewport`] converts them into
//! canvas coordinates (pan offset + uniform zoom).

use serde::{Deserialize, Serialize};

/// Left canvas bound.
pub const CANVAS_MIN_X: f64 = 0.0;
/// Right canvas bound.
pub const CANVAS_MAX_X: f64 = 5000.0;
/// Top canvas bound.
pub const CANVAS_MIN_Y: f64 = 0.0;
/// Bottom canvas bound.
pub const CANVAS_MAX_Y: f64 = 5000.0;

/// Minimum width and height for a node created by the sizing gesture.
pub const MIN_NODE_SIZE: f64 = 40.0;

/// A point in canvas (or screen) coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An axis-aligned rectangle (origin = top-left corner).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Build from two arbitrary corners (any drag direction).
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    /// Translate the rectangle so its full extent lies within canvas bounds.
    ///
    /// Oversized rectangles (wider/taller than the canvas itself) are pinned
    /// to the min corner.
    pub fn clamp_to_canvas(self) -> Self {
        let max_x = (CANVAS_MAX_X - self.width).max(CANVAS_MIN_X);
        let max_y = (CANVAS_MAX_Y - self.height).max(CANVAS_MIN_Y);
        Self {
            x: self.x.clamp(CANVAS_MIN_X, max_x),
            y: self.y.clamp(CANVAS_MIN_Y, max_y),
            ..self
        }
    }

    /// Whether the full extent lies within canvas bounds.
    pub fn within_canvas(&self) -> bool {
        self.x >= CANVAS_MIN_X
            && self.y >= CANVAS_MIN_Y
            && self.x + self.width <= CANVAS_MAX_X
            && self.y + self.height <= CANVAS_MAX_Y
    }
}

/// Screen → canvas transform: pan offset plus uniform zoom.
///
/// `canvas = screen / zoom + pan`. A default viewport is the identity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Viewport {
    /// Convert a screen-space point into canvas coordinates.
    pub fn screen_to_canvas(&self, p: Point) -> Point {
        Point::new(p.x / self.zoom + self.pan_x, p.y / self.zoom + self.pan_y)
    }

    /// Convert a screen-space rectangle into canvas coordinates.
    pub fn rect_to_canvas(&self, r: Rect) -> Rect {
        let origin = self.screen_to_canvas(Point::new(r.x, r.y));
        Rect::new(origin.x, origin.y, r.width / self.zoom, r.height / self.zoom)
    }
}

// ============================================================================
// Tests
// ============================================================================
