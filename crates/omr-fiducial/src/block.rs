//! Rectangular markers around the answer block.

use omr_core::morphology::fill_holes;
use omr_core::{extract_blobs, BinaryMask, CornerRole, PixelRect};

use crate::{Fiducial, FiducialKind, RectMarkerParams};

pub(crate) fn find_block_markers(mask: &BinaryMask, params: &RectMarkerParams) -> Vec<Fiducial> {
    if mask.is_empty() {
        return Vec::new();
    }
    let page_area = (mask.width * mask.height) as f32;
    let search = params.search.to_pixels(mask.width, mask.height);
    let local = fill_holes(&mask.crop(&search));

    let candidates: Vec<Fiducial> = extract_blobs(&local)
        .into_iter()
        .filter(|b| {
            let frac = b.area as f32 / page_area;
            let aspect = b.aspect();
            // shapes cut by the search band are not markers
            !b.bbox.touches_border(local.width, local.height)
                && frac >= params.min_area_frac
                && frac <= params.max_area_frac
                && aspect >= params.min_aspect
                && aspect <= params.max_aspect
                && b.fill_ratio() >= params.min_fill
        })
        .map(|b| {
            let bbox = PixelRect::new(
                b.bbox.x + search.x,
                b.bbox.y + search.y,
                b.bbox.width,
                b.bbox.height,
            );
            Fiducial {
                kind: FiducialKind::Rectangular,
                bbox,
                role: None,
                anchor: bbox.center(),
                score: b.fill_ratio(),
            }
        })
        .collect();

    if candidates.is_empty() {
        log::debug!("no block markers in {search:?}");
        return candidates;
    }

    let n = candidates.len() as f32;
    let (mx, my) = candidates.iter().fold((0.0, 0.0), |(sx, sy), f| {
        (sx + f.anchor.x / n, sy + f.anchor.y / n)
    });

    // Most extreme candidate along each role's diagonal; earlier wins ties.
    let mut best: [Option<(f32, usize)>; 4] = [None; 4];
    for (i, f) in candidates.iter().enumerate() {
        let (dx, dy) = (f.anchor.x - mx, f.anchor.y - my);
        let role = CornerRole::from_offset(dx, dy);
        let (sx, sy) = role.signs();
        let reach = sx * dx + sy * dy;
        let slot = &mut best[role_index(role)];
        if slot.is_none_or(|(r, _)| reach > r) {
            *slot = Some((reach, i));
        }
    }

    let out: Vec<Fiducial> = CornerRole::ALL
        .iter()
        .filter_map(|&role| {
            let (_, i) = best[role_index(role)]?;
            let mut f = candidates[i].clone();
            f.role = Some(role);
            Some(f)
        })
        .collect();
    log::debug!(
        "block markers: {} candidates, {} role-tagged",
        candidates.len(),
        out.len()
    );
    out
}

#[inline]
fn role_index(role: CornerRole) -> usize {
    match role {
        CornerRole::TopLeft => 0,
        CornerRole::TopRight => 1,
        CornerRole::BottomRight => 2,
        CornerRole::BottomLeft => 3,
    }
}
