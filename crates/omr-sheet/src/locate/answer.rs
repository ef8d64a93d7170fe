//! Answer block tiers: block-marker quad, printed border, fixed fraction.

use omr_core::{adaptive_target_size, expand_quad, find_rectangles, FracRect, PixelRect};
use omr_fiducial::{corner_quad, fiducial_bounds};

use super::{Cascade, LocateContext, LocateStrategy, LocatedRegion, RegionTier};
use crate::config::{AnswerRegionParams, BorderedParams, FiducialQuadParams};
use crate::observer::RegionKind;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// FiducialQuad, then BorderedRectangle, then FixedRatio.
pub fn answer_cascade(params: &AnswerRegionParams) -> Cascade<LocatedRegion> {
    Cascade::new(RegionKind::Answers)
        .with(FiducialQuad::new(params.fiducial_quad.clone()))
        .with(BorderedRectangle::new(params.bordered.clone()))
        .with(FixedRatio::new(params.fixed))
}

/// Warp of the area framed by four role-tagged block markers.
#[derive(Clone, Debug, Default)]
pub struct FiducialQuad {
    params: FiducialQuadParams,
}

impl FiducialQuad {
    pub fn new(params: FiducialQuadParams) -> Self {
        Self { params }
    }
}

impl LocateStrategy for FiducialQuad {
    type Output = LocatedRegion;

    fn tier(&self) -> RegionTier {
        RegionTier::FiducialQuad
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, ctx), fields(markers = ctx.block_markers.len()))
    )]
    fn locate(&self, ctx: &LocateContext<'_>) -> Option<LocatedRegion> {
        let p = &self.params;
        let quad = corner_quad(ctx.block_markers);
        if !quad.is_valid() {
            log::debug!("block quad incomplete: {} of 4 corners", quad.present());
            return None;
        }
        let spread = fiducial_bounds(ctx.block_markers)?;
        let (w, h) = (ctx.gray.width as f32, ctx.gray.height as f32);
        if (spread.width as f32) < p.min_spread_w_frac * w
            || (spread.height as f32) < p.min_spread_h_frac * h
        {
            log::debug!(
                "block markers too clustered: {}x{} px spread",
                spread.width,
                spread.height
            );
            return None;
        }

        let expanded = expand_quad(&quad, p.margin_px);
        let target = adaptive_target_size(&spread, p.margin_px.round() as usize, p.floor);
        let rectified = match ctx.corrector.correct(&ctx.gray.view(), &expanded, target) {
            Ok(r) => r,
            Err(e) => {
                log::debug!("block warp failed: {e}");
                return None;
            }
        };
        let mask = ctx.preprocessor.binarize(&rectified.image);
        let bounds = quad_bounds(&expanded.corners()?).clip(ctx.gray.width, ctx.gray.height);
        Some(LocatedRegion {
            tier: self.tier(),
            bounds,
            image: rectified.image,
            mask,
        })
    }
}

fn quad_bounds(corners: &[nalgebra::Point2<f32>; 4]) -> PixelRect {
    let (mut x0, mut y0) = (f32::INFINITY, f32::INFINITY);
    let (mut x1, mut y1) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for c in corners {
        x0 = x0.min(c.x);
        y0 = y0.min(c.y);
        x1 = x1.max(c.x);
        y1 = y1.max(c.y);
    }
    PixelRect::from_bounds(
        x0.floor().max(0.0) as usize,
        y0.floor().max(0.0) as usize,
        x1.ceil().max(0.0) as usize,
        y1.ceil().max(0.0) as usize,
    )
}

/// Largest printed rectangle in the lower page half.
#[derive(Clone, Debug, Default)]
pub struct BorderedRectangle {
    params: BorderedParams,
}

impl BorderedRectangle {
    pub fn new(params: BorderedParams) -> Self {
        Self { params }
    }
}

impl LocateStrategy for BorderedRectangle {
    type Output = LocatedRegion;

    fn tier(&self) -> RegionTier {
        RegionTier::BorderedRectangle
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    fn locate(&self, ctx: &LocateContext<'_>) -> Option<LocatedRegion> {
        let p = &self.params;
        let min_cy = p.min_center_y_frac * ctx.mask.height as f32;
        let border = find_rectangles(ctx.mask, &p.filter)
            .into_iter()
            .find(|r| r.bbox.center().y >= min_cy)?;
        log::debug!(
            "answer border {:?}, {} vertices, area {:.0}",
            border.bbox,
            border.vertices(),
            border.area
        );
        LocatedRegion::crop(ctx, self.tier(), &border.bbox.inset(p.padding_px))
    }
}

/// Template position of the answer block. Succeeds on any non-empty page.
#[derive(Clone, Debug)]
pub struct FixedRatio {
    rect: FracRect,
}

impl FixedRatio {
    pub fn new(rect: FracRect) -> Self {
        Self { rect }
    }
}

impl LocateStrategy for FixedRatio {
    type Output = LocatedRegion;

    fn tier(&self) -> RegionTier {
        RegionTier::FixedRatio
    }

    fn locate(&self, ctx: &LocateContext<'_>) -> Option<LocatedRegion> {
        let rect = self.rect.to_pixels(ctx.gray.width, ctx.gray.height);
        LocatedRegion::crop(ctx, self.tier(), &rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{render_sheet, SheetConfig, SheetLayout, SheetMarks};
    use omr_core::{PerspectiveCorrector, Preprocessor};
    use omr_fiducial::FiducialDetector;

    struct Page {
        gray: omr_core::GrayImage,
        mask: omr_core::BinaryMask,
    }

    fn page(layout: &SheetLayout) -> Page {
        let gray = render_sheet(layout, &SheetMarks::default());
        let mask = Preprocessor::default().binarize(&gray);
        Page { gray, mask }
    }

    #[test]
    fn bordered_rectangle_finds_the_answer_box() {
        let layout = SheetLayout::default();
        let cfg = SheetConfig::default();
        let p = page(&layout);
        let pre = Preprocessor::default();
        let corr = PerspectiveCorrector::new(cfg.canonical);
        let ctx = LocateContext {
            gray: &p.gray,
            mask: &p.mask,
            block_markers: &[],
            preprocessor: &pre,
            corrector: &corr,
        };
        let r = BorderedRectangle::new(cfg.answer_region.bordered.clone())
            .locate(&ctx)
            .expect("answer border");
        let expected = layout.answer_box_px().inset(6);
        assert!(r.bounds.x.abs_diff(expected.x) <= 2, "{:?}", r.bounds);
        assert!(r.bounds.y.abs_diff(expected.y) <= 2, "{:?}", r.bounds);
        assert!(r.bounds.width.abs_diff(expected.width) <= 3);
        assert_eq!((r.mask.width, r.mask.height), (r.bounds.width, r.bounds.height));
    }

    #[test]
    fn fiducial_quad_needs_four_spread_markers() {
        let layout = SheetLayout::default();
        let cfg = SheetConfig::default();
        let p = page(&layout);
        let pre = Preprocessor::default();
        let corr = PerspectiveCorrector::new(cfg.canonical);
        let markers = FiducialDetector::default().find_block_markers(&p.mask);
        assert_eq!(markers.len(), 4);

        let ctx = LocateContext {
            gray: &p.gray,
            mask: &p.mask,
            block_markers: &markers,
            preprocessor: &pre,
            corrector: &corr,
        };
        let tier = FiducialQuad::new(cfg.answer_region.fiducial_quad.clone());
        let r = tier.locate(&ctx).expect("block warp");
        assert!(r.image.width >= 900 && r.image.height >= 730);
        assert_eq!((r.mask.width, r.mask.height), (r.image.width, r.image.height));

        let three = &markers[..3];
        let ctx = LocateContext {
            block_markers: three,
            ..ctx
        };
        assert!(tier.locate(&ctx).is_none());
    }
}
