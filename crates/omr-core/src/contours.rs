//! Contour-based search for near-rectangular regions.

use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::{BinaryMask, PixelRect};

/// Acceptance window for [`find_rectangles`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectangleFilter {
    /// Polygon area over mask area.
    pub min_area_frac: f32,
    pub max_area_frac: f32,
    /// Vertex count after Douglas-Peucker simplification.
    pub min_vertices: usize,
    pub max_vertices: usize,
    /// Simplification tolerance as a fraction of the contour perimeter.
    pub epsilon_frac: f32,
}

impl Default for RectangleFilter {
    fn default() -> Self {
        Self {
            min_area_frac: 0.0,
            max_area_frac: 1.0,
            min_vertices: 4,
            max_vertices: 8,
            epsilon_frac: 0.02,
        }
    }
}

/// Outer contour that simplified to a near-rectangle.
#[derive(Clone, Debug, PartialEq)]
pub struct RectangleCandidate {
    /// Simplified polygon in mask pixel coordinates.
    pub polygon: Vec<Point2<f32>>,
    /// Area enclosed by the raw contour.
    pub area: f32,
    pub perimeter: f32,
    pub bbox: PixelRect,
}

impl RectangleCandidate {
    pub fn vertices(&self) -> usize {
        self.polygon.len()
    }

    /// `4 pi A / P^2`; 1 for a circle.
    pub fn circularity(&self) -> f32 {
        circularity(self.area, self.perimeter)
    }
}

pub(crate) fn circularity(area: f32, perimeter: f32) -> f32 {
    if perimeter <= 0.0 {
        0.0
    } else {
        4.0 * std::f32::consts::PI * area / (perimeter * perimeter)
    }
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(pts: &[Point2<f32>]) -> f32 {
    if pts.len() < 3 {
        return 0.0;
    }
    let twice: f32 = pts
        .iter()
        .zip(pts.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    twice.abs() * 0.5
}

/// Outer contours of every foreground component with area, perimeter and
/// bounding box. No shape filtering.
pub fn outer_contours(mask: &BinaryMask) -> Vec<RectangleCandidate> {
    if mask.is_empty() {
        return Vec::new();
    }
    find_contours::<i32>(&mask.to_luma())
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| {
            let pts: Vec<Point2<f32>> = c
                .points
                .iter()
                .map(|p| Point2::new(p.x as f32, p.y as f32))
                .collect();
            RectangleCandidate {
                area: polygon_area(&pts),
                perimeter: arc_length(&c.points, true) as f32,
                bbox: bbox_of(&c.points),
                polygon: pts,
            }
        })
        .collect()
}

fn bbox_of(points: &[Point<i32>]) -> PixelRect {
    let (mut x0, mut y0, mut x1, mut y1) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
    for p in points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    if points.is_empty() {
        return PixelRect::default();
    }
    PixelRect::from_bounds(
        x0.max(0) as usize,
        y0.max(0) as usize,
        (x1 + 1) as usize,
        (y1 + 1) as usize,
    )
}

// Douglas-Peucker on the open chain, then drop the tail points that only
// close the loop back onto the start.
fn simplify_closed(points: &[Point<i32>], eps: f64) -> Vec<Point<i32>> {
    if points.len() < 3 || eps <= 0.0 {
        return points.to_vec();
    }
    let mut poly = approximate_polygon_dp(points, eps, false);
    let first = poly[0];
    while poly.len() > 1 {
        let last = poly[poly.len() - 1];
        let d = ((last.x - first.x) as f64).hypot((last.y - first.y) as f64);
        if d > eps {
            break;
        }
        poly.pop();
    }
    poly
}

/// Outer contours whose area fraction and simplified vertex count pass
/// `filter`, largest first (ties broken top-to-bottom, then left-to-right).
pub fn find_rectangles(mask: &BinaryMask, filter: &RectangleFilter) -> Vec<RectangleCandidate> {
    let page_area = (mask.width * mask.height) as f32;
    if page_area == 0.0 {
        return Vec::new();
    }
    let mut out: Vec<RectangleCandidate> = find_contours::<i32>(&mask.to_luma())
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= 4)
        .filter_map(|c| {
            let pts: Vec<Point2<f32>> = c
                .points
                .iter()
                .map(|p| Point2::new(p.x as f32, p.y as f32))
                .collect();
            let area = polygon_area(&pts);
            let frac = area / page_area;
            if frac < filter.min_area_frac || frac > filter.max_area_frac {
                return None;
            }
            let perimeter = arc_length(&c.points, true);
            let eps = filter.epsilon_frac as f64 * perimeter;
            let poly = simplify_closed(&c.points, eps);
            if poly.len() < filter.min_vertices || poly.len() > filter.max_vertices {
                return None;
            }
            Some(RectangleCandidate {
                polygon: poly
                    .iter()
                    .map(|p| Point2::new(p.x as f32, p.y as f32))
                    .collect(),
                area,
                perimeter: perimeter as f32,
                bbox: bbox_of(&c.points),
            })
        })
        .collect();

    out.sort_by(|a, b| {
        b.area
            .total_cmp(&a.area)
            .then(a.bbox.y.cmp(&b.bbox.y))
            .then(a.bbox.x.cmp(&b.bbox.x))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke_rect(m: &mut BinaryMask, r: PixelRect, t: usize) {
        for y in r.y..r.bottom() {
            for x in r.x..r.right() {
                let edge = x < r.x + t || x >= r.right() - t || y < r.y + t || y >= r.bottom() - t;
                if edge {
                    m.set(x, y, true);
                }
            }
        }
    }

    #[test]
    fn shoelace_area_of_unit_square() {
        let sq = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 3.0),
            Point2::new(0.0, 3.0),
        ];
        assert_eq!(polygon_area(&sq), 6.0);
    }

    #[test]
    fn finds_bordered_box_largest_first() {
        let mut m = BinaryMask::new(200, 200);
        stroke_rect(&mut m, PixelRect::new(20, 100, 150, 80), 3);
        stroke_rect(&mut m, PixelRect::new(20, 10, 60, 40), 3);
        let found = find_rectangles(&m, &RectangleFilter::default());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].bbox, PixelRect::new(20, 100, 150, 80));
        assert_eq!(found[0].vertices(), 4);
        assert!(found[0].area > found[1].area);
    }

    #[test]
    fn area_window_rejects_small_boxes() {
        let mut m = BinaryMask::new(200, 200);
        stroke_rect(&mut m, PixelRect::new(20, 10, 60, 40), 3);
        let filter = RectangleFilter {
            min_area_frac: 0.2,
            max_area_frac: 0.7,
            ..RectangleFilter::default()
        };
        assert!(find_rectangles(&m, &filter).is_empty());
    }

    #[test]
    fn disk_is_round() {
        let mut m = BinaryMask::new(40, 40);
        for y in 0..40 {
            for x in 0..40 {
                let (dx, dy) = (x as f32 - 20.0, y as f32 - 20.0);
                if dx * dx + dy * dy <= 100.0 {
                    m.set(x, y, true);
                }
            }
        }
        let c = outer_contours(&m);
        assert_eq!(c.len(), 1);
        assert!(c[0].circularity() > 0.75, "circularity {}", c[0].circularity());
    }
}
