//! Pure coordinate math shared by placement and choreography.
//!
//! Screen space is measured in pixels with the origin at the top-left corner.
//! Normalized space maps the screen onto `[0, 1] x [0, 1]`.

use serde::{Deserialize, Serialize};

/// Dimensions of the drawing surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

impl ScreenSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Full-screen rectangle.
    pub fn bounds(self) -> Rect {
        Rect::new(Point::ORIGIN, Size::new(self.width, self.height))
    }
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self::new(390.0, 844.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn right(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn bottom(&self) -> f64 {
        self.origin.y + self.size.height
    }

    /// Returns `true` when `self` lies entirely inside `outer`.
    pub fn is_within(&self, outer: &Rect) -> bool {
        self.origin.x >= outer.origin.x
            && self.origin.y >= outer.origin.y
            && self.right() <= outer.right()
            && self.bottom() <= outer.bottom()
    }
}

/// Maps a normalized point onto the screen.
pub fn normalized_to_screen(point: Point, screen: ScreenSize) -> Point {
    Point::new(point.x * screen.width, point.y * screen.height)
}

/// Maps a screen point into normalized space.
///
/// Degenerate screens map everything to the origin.
pub fn screen_to_normalized(point: Point, screen: ScreenSize) -> Point {
    let nx = if screen.width > 0.0 { point.x / screen.width } else { 0.0 };
    let ny = if screen.height > 0.0 { point.y / screen.height } else { 0.0 };
    Point::new(nx, ny)
}

/// Translates `origin` so that a box of `size` stays inside the screen.
///
/// The size is assumed to already fit; oversized boxes are pinned to the
/// top-left corner.
pub fn clamp_origin(origin: Point, size: Size, screen: ScreenSize) -> Point {
    let max_x = (screen.width - size.width).max(0.0);
    let max_y = (screen.height - size.height).max(0.0);
    Point::new(origin.x.clamp(0.0, max_x), origin.y.clamp(0.0, max_y))
}

/// Re-expresses a rectangle composed on `from` in the coordinates of `to`.
///
/// Widths scale with the horizontal ratio and heights follow so that the
/// aspect ratio of the content is preserved.
pub fn remap_rect(rect: Rect, from: ScreenSize, to: ScreenSize) -> Rect {
    if from == to {
        return rect;
    }
    let origin = normalized_to_screen(screen_to_normalized(rect.origin, from), to);
    let ratio = if from.width > 0.0 { to.width / from.width } else { 1.0 };
    let size = Size::new(rect.size.width * ratio, rect.size.height * ratio);
    Rect::new(clamp_origin(origin, size, to), size)
}
