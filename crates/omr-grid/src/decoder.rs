use omr_core::morphology::erode;
use omr_core::{extract_blobs, BinaryMask, Blob};

use crate::density::{cell_density, judge, Verdict};
use crate::{
    DecodeResult, GridCell, GridDecodeParams, GridGeometry, GridSpec, Resolution, Symbol,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Blob assigned to a grid cell, competing for one position.
#[derive(Clone, Copy, Debug)]
struct Contender {
    blob: usize,
    /// Row (column-wise reading) or column (row-wise reading).
    index: usize,
    cell: GridCell,
    score: f32,
}

enum BlobOutcome {
    Decided(Symbol),
    Open,
}

/// Decodes filled bubbles of a logical grid from an ink mask.
#[derive(Clone, Debug, Default)]
pub struct GridDecoder {
    params: GridDecodeParams,
}

impl GridDecoder {
    pub fn new(params: GridDecodeParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GridDecodeParams {
        &self.params
    }

    /// Decode `spec` from `mask` (ink = foreground).
    ///
    /// Blobs decide positions first; positions they leave open fall back to
    /// density sampling on the un-eroded mask. Always returns exactly
    /// `spec.positions()` symbols.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, mask, spec),
            fields(columns = spec.columns, rows = spec.rows, w = mask.width, h = mask.height)
        )
    )]
    pub fn decode(&self, mask: &BinaryMask, spec: &GridSpec) -> DecodeResult {
        let positions = spec.positions();
        if mask.is_empty() || spec.columns == 0 || spec.rows == 0 {
            return DecodeResult::unresolved(positions);
        }
        let p = &self.params;

        let blobs = self.candidate_blobs(mask);
        let origin_x = self.origin_x(&blobs, mask.width, spec.columns);
        let geom = GridGeometry::new(
            mask.width,
            mask.height,
            origin_x,
            spec,
            p.row_slots.unwrap_or(spec.rows),
            p.first_row_slot,
        );

        let mut contests: Vec<Vec<Contender>> = vec![Vec::new(); positions];
        for (i, b) in blobs.iter().enumerate() {
            let Some(cell) = geom.cell_of(b.centroid.x, b.centroid.y) else {
                continue;
            };
            let (pos, index) = spec.position_of(cell);
            contests[pos].push(Contender {
                blob: i,
                index,
                cell,
                score: 0.0,
            });
        }

        let median = median_area(&blobs);
        let mut symbols = Vec::with_capacity(positions);
        let mut resolutions = Vec::with_capacity(positions);
        for (pos, contest) in contests.iter_mut().enumerate() {
            match self.resolve_blobs(contest, &blobs, &geom, spec, median) {
                BlobOutcome::Decided(s) => {
                    symbols.push(s);
                    resolutions.push(Resolution::Blob);
                }
                BlobOutcome::Open => {
                    let s = self.resolve_density(mask, &geom, spec, pos);
                    resolutions.push(if s.is_resolved() {
                        Resolution::Density
                    } else {
                        Resolution::Unresolved
                    });
                    symbols.push(s);
                }
            }
        }

        let result = DecodeResult::new(symbols, resolutions);
        log::debug!(
            "grid {}x{}: {} blobs, origin {:.1}, decoded {:?} (confidence {:.2})",
            spec.columns,
            spec.rows,
            blobs.len(),
            origin_x,
            result.text(),
            result.confidence
        );
        result
    }

    /// Eroded, labelled and shape-filtered bubble candidates.
    fn candidate_blobs(&self, mask: &BinaryMask) -> Vec<Blob> {
        let p = &self.params;
        let eroded = erode(mask, p.erosion_radius);
        extract_blobs(&eroded)
            .into_iter()
            .filter(|b| {
                let aspect = b.aspect();
                b.area >= p.min_blob_area
                    && b.area <= p.max_blob_area
                    && aspect >= p.min_aspect
                    && aspect <= p.max_aspect
                    && b.fill_ratio() >= p.min_fill_ratio
            })
            .collect()
    }

    /// Left edge of column 0.
    ///
    /// The leftmost bubble-like blob past the label margin is taken as the
    /// center of column 0 when that keeps column 0 inside the default first
    /// column; otherwise the configured default offset is used.
    fn origin_x(&self, blobs: &[Blob], width: usize, columns: usize) -> f32 {
        let o = &self.params.origin;
        let w = width as f32;
        let default = o.default_offset_frac * w;
        let anchor = blobs
            .iter()
            .filter(|b| b.centroid.x >= o.min_label_x_frac * w && b.area >= o.min_origin_area)
            .min_by(|a, b| a.centroid.x.total_cmp(&b.centroid.x));
        let Some(anchor) = anchor else {
            return default;
        };

        // c = o + (w - o) / (2n)  =>  o = (2n c - w) / (2n - 1)
        let n = columns as f32;
        let derived = ((2.0 * n * anchor.centroid.x - w) / (2.0 * n - 1.0)).max(0.0);
        let pitch = (w - default) / n;
        if derived <= default + 0.5 * pitch {
            derived
        } else {
            default
        }
    }

    fn resolve_blobs(
        &self,
        contest: &mut [Contender],
        blobs: &[Blob],
        geom: &GridGeometry,
        spec: &GridSpec,
        median_area: f32,
    ) -> BlobOutcome {
        if contest.is_empty() {
            return BlobOutcome::Open;
        }
        let s = &self.params.scoring;
        let max_area = contest
            .iter()
            .map(|c| blobs[c.blob].area)
            .max()
            .unwrap_or(1)
            .max(1) as f32;

        if spec.allows_multiple() {
            let mut filled: Vec<usize> = contest
                .iter()
                .filter(|c| blobs[c.blob].area as f32 >= s.multiple_area_frac * max_area)
                .map(|c| c.index)
                .collect();
            filled.sort_unstable();
            filled.dedup();
            if filled.len() >= 2 {
                return BlobOutcome::Decided(Symbol::Multiple);
            }
        }

        for c in contest.iter_mut() {
            let b = &blobs[c.blob];
            let rect = geom.cell_rect(c.cell);
            let (cx, cy) = rect.center();
            let dx = (b.centroid.x - cx).abs() / rect.w;
            let dy = (b.centroid.y - cy).abs() / rect.h;
            let mut score = s.area_weight * b.area as f32 / max_area
                + s.center_weight * (1.0 - dx - dy)
                - s.distance_weight * dx.hypot(dy);
            if median_area > 0.0 && b.area as f32 > s.merge_area_factor * median_area {
                score -= (1.0 - s.merge_penalty) * score.abs();
            }
            c.score = score;
        }

        contest.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.index.cmp(&b.index))
                .then(a.blob.cmp(&b.blob))
        });
        let best = contest[0];
        if let Some(runner) = contest.iter().find(|c| c.index != best.index) {
            if best.score - runner.score < s.min_margin {
                log::debug!(
                    "low-margin contest: {:?} {:.3} vs {:?} {:.3}",
                    best.cell,
                    best.score,
                    runner.cell,
                    runner.score
                );
                return BlobOutcome::Open;
            }
        }
        BlobOutcome::Decided(spec.symbol(best.index))
    }

    fn resolve_density(
        &self,
        mask: &BinaryMask,
        geom: &GridGeometry,
        spec: &GridSpec,
        position: usize,
    ) -> Symbol {
        let d = &self.params.density;
        let densities: Vec<f32> = spec
            .candidates(position)
            .into_iter()
            .map(|cell| cell_density(mask, &geom.cell_rect(cell), d))
            .collect();
        match judge(&densities, d, spec.allows_multiple()) {
            Verdict::Single(i) => spec.symbol(i),
            Verdict::Multiple => Symbol::Multiple,
            Verdict::Blank | Verdict::Ambiguous => Symbol::Unresolved,
        }
    }
}

fn median_area(blobs: &[Blob]) -> f32 {
    if blobs.is_empty() {
        return 0.0;
    }
    let mut areas: Vec<usize> = blobs.iter().map(|b| b.area).collect();
    areas.sort_unstable();
    areas[areas.len() / 2] as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(mask: &mut BinaryMask, cx: f32, cy: f32, r: f32) {
        let (x0, x1) = ((cx - r).floor() as usize, (cx + r).ceil() as usize);
        let (y0, y1) = ((cy - r).floor() as usize, (cy + r).ceil() as usize);
        for y in y0..=y1.min(mask.height - 1) {
            for x in x0..=x1.min(mask.width - 1) {
                let (dx, dy) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
                if dx * dx + dy * dy <= r * r {
                    mask.set(x, y, true);
                }
            }
        }
    }

    #[test]
    fn label_margin_moves_origin() {
        // 4 columns of 30 px after a 40 px label margin
        let mut mask = BinaryMask::new(160, 30);
        disk(&mut mask, 12.0, 15.0, 6.0); // label text
        disk(&mut mask, 55.0, 15.0, 7.0); // column 0
        let params = GridDecodeParams {
            origin: crate::OriginParams {
                min_label_x_frac: 0.2,
                min_origin_area: 40,
                default_offset_frac: 0.2,
            },
            ..GridDecodeParams::default()
        };
        let dec = GridDecoder::new(params);
        let blobs = dec.candidate_blobs(&mask);
        let o = dec.origin_x(&blobs, mask.width, 4);
        assert!((o - 40.0).abs() < 1.0, "origin {o}");
    }

    #[test]
    fn blob_far_right_does_not_become_origin() {
        let mut mask = BinaryMask::new(300, 30);
        disk(&mut mask, 255.0, 15.0, 7.0);
        let dec = GridDecoder::default();
        let blobs = dec.candidate_blobs(&mask);
        assert_eq!(dec.origin_x(&blobs, mask.width, 10), 0.0);
    }

    #[test]
    fn oversized_blob_loses_to_a_clean_one() {
        // middle column holds a clean bubble in row 2 and a merged smear in row 5
        let mut mask = BinaryMask::new(90, 300);
        disk(&mut mask, 15.0, 45.0, 7.0);
        disk(&mut mask, 45.0, 75.0, 7.0);
        disk(&mut mask, 75.0, 105.0, 7.0);
        for y in 150..170 {
            for x in 32..58 {
                mask.set(x, y, true);
            }
        }
        let dec = GridDecoder::default();
        let r = dec.decode(&mask, &GridSpec::digits(3, 10));
        assert_eq!(r.text(), "234");
        assert_eq!(r.resolutions[1], Resolution::Blob);
    }
}
