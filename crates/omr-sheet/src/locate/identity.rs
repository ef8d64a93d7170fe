//! Identification block tiers: ruled box interiors, then template positions.

use omr_core::morphology::{keep_horizontal_runs, keep_vertical_runs};
use omr_core::{extract_blobs, Blob};

use super::{Cascade, LocateContext, LocateStrategy, LocatedRegion, RegionTier};
use crate::config::{IdentityRegionParams, LineBoxParams};
use crate::observer::RegionKind;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Interiors of the student and test identification boxes.
#[derive(Clone, Debug)]
pub struct IdentityRegions {
    pub student: LocatedRegion,
    pub test: LocatedRegion,
}

/// LineBoxes, then TemplatePosition.
pub fn identity_cascade(params: &IdentityRegionParams) -> Cascade<IdentityRegions> {
    Cascade::new(RegionKind::Identity)
        .with(LineBoxes::new(params.line_boxes.clone()))
        .with(TemplatePosition::new(params.clone()))
}

/// Box interiors as the cells left between long ruled lines.
#[derive(Clone, Debug, Default)]
pub struct LineBoxes {
    params: LineBoxParams,
}

impl LineBoxes {
    pub fn new(params: LineBoxParams) -> Self {
        Self { params }
    }

    fn accepts(&self, b: &Blob, w: usize, h: usize) -> bool {
        let p = &self.params;
        let frac = b.area as f32 / (w * h) as f32;
        let aspect = b.bbox.aspect();
        let c = b.bbox.center();
        !b.bbox.touches_border(w, h)
            && frac >= p.min_area_frac
            && frac <= p.max_area_frac
            && b.bbox.width.min(b.bbox.height) >= p.min_side_px
            && aspect >= p.min_aspect
            && aspect <= p.max_aspect
            && (b.bbox.x as f32) < p.max_left_frac * w as f32
            && c.y < p.max_center_y_frac * h as f32
    }
}

impl LocateStrategy for LineBoxes {
    type Output = IdentityRegions;

    fn tier(&self) -> RegionTier {
        RegionTier::LineBoxes
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    fn locate(&self, ctx: &LocateContext<'_>) -> Option<IdentityRegions> {
        let (w, h) = (ctx.mask.width, ctx.mask.height);
        let len = ((self.params.line_len_frac * w as f32).round() as usize).max(2);
        let horizontal = keep_horizontal_runs(ctx.mask, len);
        let vertical = keep_vertical_runs(ctx.mask, len);
        let cells = horizontal.inverted().and(&vertical.inverted());

        let mut boxes: Vec<Blob> = extract_blobs(&cells)
            .into_iter()
            .filter(|b| self.accepts(b, w, h))
            .collect();
        boxes.sort_by(|a, b| {
            b.area
                .cmp(&a.area)
                .then(a.bbox.y.cmp(&b.bbox.y))
                .then(a.bbox.x.cmp(&b.bbox.x))
        });
        log::debug!("{} ruled box interiors", boxes.len());
        let [student, test, ..] = boxes.as_slice() else {
            return None;
        };
        Some(IdentityRegions {
            student: LocatedRegion::crop(ctx, self.tier(), &student.bbox)?,
            test: LocatedRegion::crop(ctx, self.tier(), &test.bbox)?,
        })
    }
}

/// Fixed template rectangles, inset past the box border.
#[derive(Clone, Debug, Default)]
pub struct TemplatePosition {
    params: IdentityRegionParams,
}

impl TemplatePosition {
    pub fn new(params: IdentityRegionParams) -> Self {
        Self { params }
    }
}

impl LocateStrategy for TemplatePosition {
    type Output = IdentityRegions;

    fn tier(&self) -> RegionTier {
        RegionTier::TemplatePosition
    }

    fn locate(&self, ctx: &LocateContext<'_>) -> Option<IdentityRegions> {
        let p = &self.params;
        let (w, h) = (ctx.gray.width, ctx.gray.height);
        let student = p.student_box.to_pixels(w, h).inset(p.box_padding_px);
        let test = p.test_box.to_pixels(w, h).inset(p.box_padding_px);
        Some(IdentityRegions {
            student: LocatedRegion::crop(ctx, self.tier(), &student)?,
            test: LocatedRegion::crop(ctx, self.tier(), &test)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{render_sheet, SheetConfig, SheetLayout, SheetMarks};
    use omr_core::{BinaryMask, PerspectiveCorrector, PixelRect, Preprocessor};

    #[test]
    fn line_boxes_find_both_interiors() {
        let layout = SheetLayout::default();
        let cfg = SheetConfig::default();
        let gray = render_sheet(&layout, &SheetMarks::new("0123456789", "4321", &[]));
        let pre = Preprocessor::default();
        let mask = pre.binarize(&gray);
        let corr = PerspectiveCorrector::default();
        let ctx = LocateContext {
            gray: &gray,
            mask: &mask,
            block_markers: &[],
            preprocessor: &pre,
            corrector: &corr,
        };
        let found = LineBoxes::new(cfg.identity_region.line_boxes.clone())
            .locate(&ctx)
            .expect("both boxes");
        let close = |a: PixelRect, b: PixelRect| {
            a.x.abs_diff(b.x) <= 2
                && a.y.abs_diff(b.y) <= 2
                && a.width.abs_diff(b.width) <= 3
                && a.height.abs_diff(b.height) <= 3
        };
        let student = layout.id_interior(&layout.student_box_px());
        let test = layout.id_interior(&layout.test_box_px());
        assert!(close(found.student.bounds, student), "{:?}", found.student.bounds);
        assert!(close(found.test.bounds, test), "{:?}", found.test.bounds);
    }

    #[test]
    fn line_boxes_need_two_boxes() {
        let mut mask = BinaryMask::new(400, 400);
        for i in 0..200 {
            for t in 0..3 {
                mask.set(50 + i, 50 + t, true);
                mask.set(50 + i, 247 + t, true);
                mask.set(50 + t, 50 + i, true);
                mask.set(247 + t, 50 + i, true);
            }
        }
        let gray = mask.to_gray();
        let pre = Preprocessor::default();
        let corr = PerspectiveCorrector::default();
        let ctx = LocateContext {
            gray: &gray,
            mask: &mask,
            block_markers: &[],
            preprocessor: &pre,
            corrector: &corr,
        };
        let params = LineBoxParams {
            max_center_y_frac: 1.0,
            ..LineBoxParams::default()
        };
        assert!(LineBoxes::new(params).locate(&ctx).is_none());

        let fallback = TemplatePosition::default().locate(&ctx).expect("template");
        assert_eq!(fallback.student.tier, RegionTier::TemplatePosition);
    }
}
