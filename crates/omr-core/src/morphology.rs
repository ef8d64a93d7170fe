//! Binary morphology on [`BinaryMask`]s.

use ::image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::BinaryMask;

/// Erosion with a square `(2r+1) x (2r+1)` element. `radius == 0` is a copy.
pub fn erode(mask: &BinaryMask, radius: u8) -> BinaryMask {
    if radius == 0 || mask.is_empty() {
        return mask.clone();
    }
    let eroded = imageproc::morphology::erode(&mask.to_luma(), Norm::LInf, radius);
    BinaryMask::from_luma(&eroded)
}

/// Opening with a horizontal line element of `len` pixels: keeps only
/// foreground runs at least `len` long.
pub fn keep_horizontal_runs(mask: &BinaryMask, len: usize) -> BinaryMask {
    let mut out = BinaryMask::new(mask.width, mask.height);
    for y in 0..mask.height {
        let mut x = 0;
        while x < mask.width {
            if !mask.is_set(x, y) {
                x += 1;
                continue;
            }
            let start = x;
            while x < mask.width && mask.is_set(x, y) {
                x += 1;
            }
            if x - start >= len {
                for xx in start..x {
                    out.set(xx, y, true);
                }
            }
        }
    }
    out
}

/// Vertical counterpart of [`keep_horizontal_runs`].
pub fn keep_vertical_runs(mask: &BinaryMask, len: usize) -> BinaryMask {
    let mut out = BinaryMask::new(mask.width, mask.height);
    for x in 0..mask.width {
        let mut y = 0;
        while y < mask.height {
            if !mask.is_set(x, y) {
                y += 1;
                continue;
            }
            let start = y;
            while y < mask.height && mask.is_set(x, y) {
                y += 1;
            }
            if y - start >= len {
                for yy in start..y {
                    out.set(x, yy, true);
                }
            }
        }
    }
    out
}

/// Set every background region that does not reach the mask border.
pub fn fill_holes(mask: &BinaryMask) -> BinaryMask {
    if mask.is_empty() {
        return mask.clone();
    }
    let (w, h) = (mask.width, mask.height);
    let labels = connected_components(&mask.inverted().to_luma(), Connectivity::Four, Luma([0u8]));

    let mut open = vec![false; 1];
    let mut mark = |label: u32| {
        let l = label as usize;
        if open.len() <= l {
            open.resize(l + 1, false);
        }
        open[l] = true;
    };
    for x in 0..w as u32 {
        mark(labels.get_pixel(x, 0)[0]);
        mark(labels.get_pixel(x, h as u32 - 1)[0]);
    }
    for y in 0..h as u32 {
        mark(labels.get_pixel(0, y)[0]);
        mark(labels.get_pixel(w as u32 - 1, y)[0]);
    }

    let mut out = mask.clone();
    for (x, y, px) in labels.enumerate_pixels() {
        let l = px[0] as usize;
        if l != 0 && !open.get(l).copied().unwrap_or(false) {
            out.set(x as usize, y as usize, true);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline(w: usize, h: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> BinaryMask {
        let mut m = BinaryMask::new(w, h);
        for x in x0..=x1 {
            m.set(x, y0, true);
            m.set(x, y1, true);
        }
        for y in y0..=y1 {
            m.set(x0, y, true);
            m.set(x1, y, true);
        }
        m
    }

    #[test]
    fn holes_inside_closed_outline_are_filled() {
        let m = outline(20, 20, 3, 3, 12, 12);
        let filled = fill_holes(&m);
        assert_eq!(filled.count(), 100);
        assert!(!filled.is_set(15, 15));
    }

    #[test]
    fn open_outline_is_not_filled() {
        let mut m = outline(20, 20, 3, 3, 12, 12);
        m.set(7, 3, false);
        assert_eq!(fill_holes(&m).count(), m.count());
    }

    #[test]
    fn line_opening_keeps_long_strokes_only() {
        let mut m = outline(30, 30, 2, 2, 25, 25);
        m.set(10, 10, true);
        let h = keep_horizontal_runs(&m, 10);
        assert_eq!(h.count(), 48);
        let v = keep_vertical_runs(&m, 10);
        assert_eq!(v.count(), 48);
        assert_eq!(h.and(&v).count(), 4);
    }

    #[test]
    fn erosion_removes_thin_lines() {
        let mut m = outline(20, 20, 2, 2, 17, 17);
        for y in 6..12 {
            for x in 6..12 {
                m.set(x, y, true);
            }
        }
        let e = erode(&m, 1);
        assert_eq!(e.count(), 16);
    }
}
