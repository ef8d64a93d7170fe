//! Direct foreground-density sampling and the best-vs-runner-up judge shared
//! by grid and row decoding.

use omr_core::BinaryMask;
use serde::{Deserialize, Serialize};

use crate::{CellRect, DensityParams};

/// Outcome of comparing candidate densities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// One candidate clearly wins.
    Single(usize),
    /// Two or more candidates are filled (only when allowed).
    Multiple,
    /// Nothing reaches the minimum density.
    Blank,
    /// Marked, but the winner does not clear the margin.
    Ambiguous,
}

/// Best index and value, then runner-up value. Ties keep the lower index.
pub(crate) fn best_two(values: &[f32]) -> Option<(usize, f32, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if best.is_none_or(|(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    let (bi, bv) = best?;
    let runner = values
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != bi)
        .map(|(_, &v)| v)
        .fold(0.0_f32, f32::max);
    Some((bi, bv, runner))
}

/// Judge candidate densities: the best must reach `min_density` and beat the
/// runner-up by `rel_margin * best` or `abs_margin`. With `allow_multiple`, a
/// runner-up that is itself filled and close to the best yields `Multiple`.
pub fn judge(densities: &[f32], params: &DensityParams, allow_multiple: bool) -> Verdict {
    let Some((bi, best, runner)) = best_two(densities) else {
        return Verdict::Blank;
    };
    if best < params.min_density {
        return Verdict::Blank;
    }
    if allow_multiple
        && runner >= params.min_density
        && runner >= params.multiple_ratio * best
    {
        return Verdict::Multiple;
    }
    let gap = best - runner;
    if gap >= params.rel_margin * best || gap >= params.abs_margin {
        Verdict::Single(bi)
    } else {
        Verdict::Ambiguous
    }
}

/// Mean foreground density over the configured offset windows of `cell`.
pub fn cell_density(mask: &BinaryMask, cell: &CellRect, params: &DensityParams) -> f32 {
    if params.offsets.is_empty() {
        return mask.density(&cell.window(params.window_frac, [0.0, 0.0]));
    }
    let sum: f32 = params
        .offsets
        .iter()
        .map(|&o| mask.density(&cell.window(params.window_frac, o)))
        .sum();
    sum / params.offsets.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_winner_is_single() {
        let p = DensityParams::default();
        assert_eq!(judge(&[0.1, 0.8, 0.2, 0.05], &p, false), Verdict::Single(1));
    }

    #[test]
    fn faint_marks_are_blank() {
        let p = DensityParams::default();
        assert_eq!(judge(&[0.1, 0.3, 0.2], &p, true), Verdict::Blank);
        assert_eq!(judge(&[], &p, true), Verdict::Blank);
    }

    #[test]
    fn two_filled_choices_are_multiple_only_when_allowed() {
        let p = DensityParams::default();
        assert_eq!(judge(&[0.9, 0.1, 0.85, 0.0], &p, true), Verdict::Multiple);
        assert_eq!(judge(&[0.9, 0.1, 0.88, 0.0], &p, false), Verdict::Ambiguous);
    }

    #[test]
    fn equal_densities_tie_to_ambiguous() {
        let p = DensityParams::default();
        assert_eq!(judge(&[0.7, 0.7], &p, false), Verdict::Ambiguous);
    }

    #[test]
    fn relative_margin_accepts_a_modest_lead() {
        let p = DensityParams::default();
        // 0.80 vs 0.74: gap 0.06 >= 5% of 0.80
        assert_eq!(judge(&[0.74, 0.80], &p, false), Verdict::Single(1));
        // 0.80 vs 0.78: gap 0.02 < 0.04
        assert_eq!(judge(&[0.78, 0.80], &p, false), Verdict::Ambiguous);
    }
}
