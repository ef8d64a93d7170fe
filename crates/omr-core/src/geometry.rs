//! Page geometry vocabulary: pixel and fractional rectangles, corner roles
//! and the four-corner quadrilateral used for perspective correction.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates (`x`, `y` = top-left).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning `[x0, x1) x [y0, y1)`; inverted bounds give an empty rect.
    pub fn from_bounds(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    #[inline]
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn center(&self) -> Point2<f32> {
        Point2::new(
            self.x as f32 + self.width as f32 * 0.5,
            self.y as f32 + self.height as f32 * 0.5,
        )
    }

    /// Width over height (0 for an empty rect).
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Shrink by `pad` on every side; collapses to an empty rect at the center.
    pub fn inset(&self, pad: usize) -> Self {
        if self.width <= 2 * pad || self.height <= 2 * pad {
            let c = self.center();
            return Self::new(c.x as usize, c.y as usize, 0, 0);
        }
        Self::new(
            self.x + pad,
            self.y + pad,
            self.width - 2 * pad,
            self.height - 2 * pad,
        )
    }

    /// Intersection with the `[0, w) x [0, h)` image frame.
    pub fn clip(&self, w: usize, h: usize) -> Self {
        let x0 = self.x.min(w);
        let y0 = self.y.min(h);
        let x1 = self.right().min(w);
        let y1 = self.bottom().min(h);
        Self::from_bounds(x0, y0, x1, y1)
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Self) -> Self {
        Self::from_bounds(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// True if any side touches the `[0, w) x [0, h)` frame border.
    pub fn touches_border(&self, w: usize, h: usize) -> bool {
        self.x == 0 || self.y == 0 || self.right() >= w || self.bottom() >= h
    }
}

/// Rectangle expressed as fractions of a page's width and height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FracRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl FracRect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub const FULL: FracRect = FracRect::new(0.0, 0.0, 1.0, 1.0);

    /// Pixel rectangle for a `w x h` page, clamped to the page.
    pub fn to_pixels(&self, w: usize, h: usize) -> PixelRect {
        let fx = |f: f32| ((f.clamp(0.0, 1.0) * w as f32).round() as usize).min(w);
        let fy = |f: f32| ((f.clamp(0.0, 1.0) * h as f32).round() as usize).min(h);
        PixelRect::from_bounds(fx(self.x0), fy(self.y0), fx(self.x1), fy(self.y1))
    }

    /// Fractional rect of `r` inside a `w x h` page.
    pub fn from_pixels(r: &PixelRect, w: usize, h: usize) -> Self {
        let (w, h) = (w.max(1) as f32, h.max(1) as f32);
        Self::new(
            r.x as f32 / w,
            r.y as f32 / h,
            r.right() as f32 / w,
            r.bottom() as f32 / h,
        )
    }
}

/// Which page (or block) corner a marker belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CornerRole {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl CornerRole {
    /// Clockwise from top-left.
    pub const ALL: [CornerRole; 4] = [
        CornerRole::TopLeft,
        CornerRole::TopRight,
        CornerRole::BottomRight,
        CornerRole::BottomLeft,
    ];

    /// Outward direction of the corner as unit signs `(sx, sy)`.
    #[inline]
    pub fn signs(self) -> (f32, f32) {
        match self {
            CornerRole::TopLeft => (-1.0, -1.0),
            CornerRole::TopRight => (1.0, -1.0),
            CornerRole::BottomRight => (1.0, 1.0),
            CornerRole::BottomLeft => (-1.0, 1.0),
        }
    }

    /// Role of a point relative to a center; points on an axis go left/top.
    pub fn from_offset(dx: f32, dy: f32) -> Self {
        match (dx > 0.0, dy > 0.0) {
            (false, false) => CornerRole::TopLeft,
            (true, false) => CornerRole::TopRight,
            (true, true) => CornerRole::BottomRight,
            (false, true) => CornerRole::BottomLeft,
        }
    }

    /// Corner of `rect` this role points at.
    pub fn corner_of(self, rect: &PixelRect) -> Point2<f32> {
        let (x0, y0) = (rect.x as f32, rect.y as f32);
        let (x1, y1) = (rect.right() as f32, rect.bottom() as f32);
        match self {
            CornerRole::TopLeft => Point2::new(x0, y0),
            CornerRole::TopRight => Point2::new(x1, y0),
            CornerRole::BottomRight => Point2::new(x1, y1),
            CornerRole::BottomLeft => Point2::new(x0, y1),
        }
    }
}

/// Four optional corner points. Only a complete quadrilateral can drive a
/// homography.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub top_left: Option<Point2<f32>>,
    pub top_right: Option<Point2<f32>>,
    pub bottom_right: Option<Point2<f32>>,
    pub bottom_left: Option<Point2<f32>>,
}

impl Quadrilateral {
    pub fn from_corners(c: [Point2<f32>; 4]) -> Self {
        Self {
            top_left: Some(c[0]),
            top_right: Some(c[1]),
            bottom_right: Some(c[2]),
            bottom_left: Some(c[3]),
        }
    }

    /// Axis-aligned quad covering `[0, w] x [0, h]`.
    pub fn from_size(w: usize, h: usize) -> Self {
        let (w, h) = (w as f32, h as f32);
        Self::from_corners([
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ])
    }

    pub fn get(&self, role: CornerRole) -> Option<Point2<f32>> {
        match role {
            CornerRole::TopLeft => self.top_left,
            CornerRole::TopRight => self.top_right,
            CornerRole::BottomRight => self.bottom_right,
            CornerRole::BottomLeft => self.bottom_left,
        }
    }

    pub fn set(&mut self, role: CornerRole, p: Point2<f32>) {
        let slot = match role {
            CornerRole::TopLeft => &mut self.top_left,
            CornerRole::TopRight => &mut self.top_right,
            CornerRole::BottomRight => &mut self.bottom_right,
            CornerRole::BottomLeft => &mut self.bottom_left,
        };
        *slot = Some(p);
    }

    pub fn present(&self) -> usize {
        CornerRole::ALL
            .iter()
            .filter(|r| self.get(**r).is_some())
            .count()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.present() == 4
    }

    /// Corners in TL, TR, BR, BL order, or `None` when any is missing.
    pub fn corners(&self) -> Option<[Point2<f32>; 4]> {
        Some([
            self.top_left?,
            self.top_right?,
            self.bottom_right?,
            self.bottom_left?,
        ])
    }

    /// Width and height of the axis-aligned hull of the present corners.
    pub fn spread(&self) -> (f32, f32) {
        let pts: Vec<Point2<f32>> = CornerRole::ALL.iter().filter_map(|r| self.get(*r)).collect();
        if pts.is_empty() {
            return (0.0, 0.0);
        }
        let (mut x0, mut y0) = (f32::INFINITY, f32::INFINITY);
        let (mut x1, mut y1) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in &pts {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        (x1 - x0, y1 - y0)
    }
}
