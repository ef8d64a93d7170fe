//! L-shaped page-corner markers.

use nalgebra::Point2;
use omr_core::morphology::fill_holes;
use omr_core::{extract_blobs, BinaryMask, Blob, CornerRole, PixelRect};

use crate::{Fiducial, FiducialKind, LMarkerParams};

/// Page-corner window scanned for the marker of `role`.
pub(crate) fn quadrant(role: CornerRole, w: usize, h: usize, frac: f32) -> PixelRect {
    let qw = ((w as f32 * frac).round() as usize).clamp(1, w);
    let qh = ((h as f32 * frac).round() as usize).clamp(1, h);
    match role {
        CornerRole::TopLeft => PixelRect::new(0, 0, qw, qh),
        CornerRole::TopRight => PixelRect::new(w - qw, 0, qw, qh),
        CornerRole::BottomRight => PixelRect::new(w - qw, h - qh, qw, qh),
        CornerRole::BottomLeft => PixelRect::new(0, h - qh, qw, qh),
    }
}

/// Band and inner-block densities of an L whose elbow sits at the `role`
/// corner of `bbox`. Returns `(horizontal band, vertical band, inner block)`.
fn l_profile(
    mask: &BinaryMask,
    bbox: &PixelRect,
    role: CornerRole,
    band_frac: f32,
) -> (f32, f32, f32) {
    let bw = ((bbox.width as f32 * band_frac).round() as usize).clamp(1, bbox.width);
    let bh = ((bbox.height as f32 * band_frac).round() as usize).clamp(1, bbox.height);
    let (top, left) = match role {
        CornerRole::TopLeft => (true, true),
        CornerRole::TopRight => (true, false),
        CornerRole::BottomRight => (false, false),
        CornerRole::BottomLeft => (false, true),
    };

    let band_y = if top { bbox.y } else { bbox.bottom() - bh };
    let band_x = if left { bbox.x } else { bbox.right() - bw };
    let horizontal = PixelRect::new(bbox.x, band_y, bbox.width, bh);
    let vertical = PixelRect::new(band_x, bbox.y, bw, bbox.height);

    let inner_x = if left { bbox.x + bw } else { bbox.x };
    let inner_y = if top { bbox.y + bh } else { bbox.y };
    let inner = PixelRect::new(inner_x, inner_y, bbox.width - bw, bbox.height - bh);

    (
        mask.density(&horizontal),
        mask.density(&vertical),
        mask.density(&inner),
    )
}

fn score_candidate(
    mask: &BinaryMask,
    blob: &Blob,
    role: CornerRole,
    short_side: f32,
    params: &LMarkerParams,
) -> Option<f32> {
    let (w, h) = (blob.bbox.width as f32, blob.bbox.height as f32);
    let min_side = params.min_side_frac * short_side;
    let max_side = params.max_side_frac * short_side;
    if w < min_side || h < min_side || w > max_side || h > max_side {
        return None;
    }
    if w.max(h) / w.min(h).max(1.0) > params.max_aspect {
        return None;
    }

    let (hb, vb, inner) = l_profile(mask, &blob.bbox, role, params.band_frac);
    if hb < params.min_band_density
        || vb < params.min_band_density
        || inner > params.max_inner_density
    {
        return None;
    }
    Some(0.5 * (hb + vb) - inner)
}

/// Scan each page quadrant for an L whose elbow faces that page corner.
/// At most one result per quadrant; 0 to 4 overall.
pub(crate) fn find_page_corners(mask: &BinaryMask, params: &LMarkerParams) -> Vec<Fiducial> {
    let (w, h) = (mask.width, mask.height);
    if mask.is_empty() {
        return Vec::new();
    }
    let short_side = w.min(h) as f32;
    let mut out = Vec::with_capacity(4);

    for role in CornerRole::ALL {
        let q = quadrant(role, w, h, params.quadrant_frac);
        let local = fill_holes(&mask.crop(&q));
        let page_corner = role.corner_of(&mask.frame());

        let mut best: Option<(f32, f32, Fiducial)> = None;
        for blob in extract_blobs(&local) {
            let Some(score) = score_candidate(&local, &blob, role, short_side, params) else {
                continue;
            };
            let bbox = PixelRect::new(
                blob.bbox.x + q.x,
                blob.bbox.y + q.y,
                blob.bbox.width,
                blob.bbox.height,
            );
            let anchor = role.corner_of(&bbox);
            let dist = distance(anchor, page_corner);
            let better = match &best {
                None => true,
                Some((s, d, _)) => score > *s || (score == *s && dist < *d),
            };
            if better {
                best = Some((
                    score,
                    dist,
                    Fiducial {
                        kind: FiducialKind::LShaped,
                        bbox,
                        role: Some(role),
                        anchor,
                        score,
                    },
                ));
            }
        }

        match best {
            Some((_, _, f)) => {
                log::debug!(
                    "{role:?} corner marker at ({:.1}, {:.1}), score {:.2}",
                    f.anchor.x,
                    f.anchor.y,
                    f.score
                );
                out.push(f);
            }
            None => log::debug!("no {role:?} corner marker"),
        }
    }
    out
}

#[inline]
fn distance(a: Point2<f32>, b: Point2<f32>) -> f32 {
    (a.x - b.x).hypot(a.y - b.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_l(mask: &mut BinaryMask, bbox: PixelRect, role: CornerRole, t: usize) {
        let (top, left) = match role {
            CornerRole::TopLeft => (true, true),
            CornerRole::TopRight => (true, false),
            CornerRole::BottomRight => (false, false),
            CornerRole::BottomLeft => (false, true),
        };
        for y in bbox.y..bbox.bottom() {
            for x in bbox.x..bbox.right() {
                let in_h = if top { y < bbox.y + t } else { y >= bbox.bottom() - t };
                let in_v = if left { x < bbox.x + t } else { x >= bbox.right() - t };
                if in_h || in_v {
                    mask.set(x, y, true);
                }
            }
        }
    }

    #[test]
    fn profile_of_a_clean_l() {
        let mut m = BinaryMask::new(60, 60);
        let bbox = PixelRect::new(6, 6, 48, 48);
        draw_l(&mut m, bbox, CornerRole::TopLeft, 12);
        let (hb, vb, inner) = l_profile(&m, &bbox, CornerRole::TopLeft, 1.0 / 3.0);
        assert!((hb - 0.8125).abs() < 1e-6);
        assert!((vb - 0.8125).abs() < 1e-6);
        assert_eq!(inner, 0.0);
    }

    #[test]
    fn elbow_must_face_the_page_corner() {
        let mut m = BinaryMask::new(400, 400);
        draw_l(&mut m, PixelRect::new(10, 10, 48, 48), CornerRole::BottomRight, 12);
        assert!(find_page_corners(&m, &LMarkerParams::default()).is_empty());
    }

    #[test]
    fn quadrants_cover_page_corners() {
        assert_eq!(
            quadrant(CornerRole::BottomRight, 1000, 1400, 0.25),
            PixelRect::new(750, 1050, 250, 350)
        );
    }
}
