use ::image::Luma;
use imageproc::region_labelling::{connected_components, Connectivity};
use nalgebra::Point2;

use crate::{BinaryMask, PixelRect};

/// Connected foreground component with basic shape statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    pub centroid: Point2<f32>,
    /// Pixel count.
    pub area: usize,
    pub bbox: PixelRect,
}

impl Blob {
    /// Bounding-box width over height.
    pub fn aspect(&self) -> f32 {
        self.bbox.aspect()
    }

    /// Fraction of the bounding box covered by the blob.
    pub fn fill_ratio(&self) -> f32 {
        let a = self.bbox.area();
        if a == 0 {
            0.0
        } else {
            self.area as f32 / a as f32
        }
    }
}

#[derive(Clone, Copy)]
struct Accum {
    first: (usize, usize),
    n: usize,
    sx: u64,
    sy: u64,
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl Accum {
    fn new() -> Self {
        Self {
            first: (0, 0),
            n: 0,
            sx: 0,
            sy: 0,
            x0: usize::MAX,
            y0: usize::MAX,
            x1: 0,
            y1: 0,
        }
    }

    fn push(&mut self, x: usize, y: usize) {
        if self.n == 0 {
            self.first = (y, x);
        }
        self.n += 1;
        self.sx += x as u64;
        self.sy += y as u64;
        self.x0 = self.x0.min(x);
        self.y0 = self.y0.min(y);
        self.x1 = self.x1.max(x);
        self.y1 = self.y1.max(y);
    }
}

/// 8-connected components of `mask`, in raster order of each component's
/// first pixel.
///
/// Centroids are pixel-center averages (`x + 0.5`).
pub fn extract_blobs(mask: &BinaryMask) -> Vec<Blob> {
    extract_blobs_with(mask, Connectivity::Eight)
}

pub(crate) fn extract_blobs_with(mask: &BinaryMask, conn: Connectivity) -> Vec<Blob> {
    if mask.is_empty() {
        return Vec::new();
    }
    let labels = connected_components(&mask.to_luma(), conn, Luma([0u8]));

    let mut acc: Vec<Accum> = Vec::new();
    for (x, y, px) in labels.enumerate_pixels() {
        let label = px[0] as usize;
        if label == 0 {
            continue;
        }
        if acc.len() < label {
            acc.resize(label, Accum::new());
        }
        acc[label - 1].push(x as usize, y as usize);
    }

    acc.retain(|a| a.n > 0);
    acc.sort_by_key(|a| a.first);
    acc.into_iter()
        .map(|a| Blob {
            centroid: Point2::new(
                a.sx as f32 / a.n as f32 + 0.5,
                a.sy as f32 / a.n as f32 + 0.5,
            ),
            area: a.n,
            bbox: PixelRect::from_bounds(a.x0, a.y0, a.x1 + 1, a.y1 + 1),
        })
        .collect()
}
