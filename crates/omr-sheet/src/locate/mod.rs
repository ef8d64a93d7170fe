//! Region location with ordered fallback tiers.
//!
//! Each tier is a [`LocateStrategy`]; a [`Cascade`] tries them in order and
//! the first one whose validity checks pass wins. The winning tier is
//! reported so callers can tell a clean read from a degraded one.

mod answer;
mod identity;

pub use answer::{answer_cascade, BorderedRectangle, FiducialQuad, FixedRatio};
pub use identity::{identity_cascade, IdentityRegions, LineBoxes, TemplatePosition};

use omr_core::{BinaryMask, GrayImage, PerspectiveCorrector, PixelRect, Preprocessor};
use omr_fiducial::Fiducial;
use serde::{Deserialize, Serialize};

use crate::observer::{PipelineEvent, PipelineObserver, RegionKind};

/// Fallback tier that produced a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionTier {
    FiducialQuad,
    BorderedRectangle,
    FixedRatio,
    LineBoxes,
    TemplatePosition,
}

impl RegionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            RegionTier::FiducialQuad => "fiducial_quad",
            RegionTier::BorderedRectangle => "bordered_rectangle",
            RegionTier::FixedRatio => "fixed_ratio",
            RegionTier::LineBoxes => "line_boxes",
            RegionTier::TemplatePosition => "template_position",
        }
    }

    /// True for the last-resort tiers that trust template positions only.
    pub fn is_fallback(self) -> bool {
        matches!(self, RegionTier::FixedRatio | RegionTier::TemplatePosition)
    }
}

/// Everything a strategy may look at. All images are the (possibly
/// perspective-corrected) page.
pub struct LocateContext<'a> {
    pub gray: &'a GrayImage,
    pub mask: &'a BinaryMask,
    pub block_markers: &'a [Fiducial],
    pub preprocessor: &'a Preprocessor,
    pub corrector: &'a PerspectiveCorrector,
}

/// Sub-image cut out of the page, with its own ink mask.
#[derive(Clone, Debug)]
pub struct LocatedRegion {
    pub tier: RegionTier,
    /// Page-pixel extent the region was taken from.
    pub bounds: PixelRect,
    pub image: GrayImage,
    pub mask: BinaryMask,
}

impl LocatedRegion {
    /// Crop of both page rasters; `None` when `rect` misses the page.
    pub fn crop(ctx: &LocateContext<'_>, tier: RegionTier, rect: &PixelRect) -> Option<Self> {
        let bounds = rect.clip(ctx.gray.width, ctx.gray.height);
        if bounds.is_empty() {
            return None;
        }
        Some(Self {
            tier,
            bounds,
            image: ctx.gray.crop(&bounds),
            mask: ctx.mask.crop(&bounds),
        })
    }
}

/// One fallback tier.
pub trait LocateStrategy {
    type Output;

    fn tier(&self) -> RegionTier;

    /// `None` when this tier's validity checks fail.
    fn locate(&self, ctx: &LocateContext<'_>) -> Option<Self::Output>;
}

/// Ordered strategies sharing an output type.
pub struct Cascade<T> {
    region: RegionKind,
    tiers: Vec<Box<dyn LocateStrategy<Output = T> + Send + Sync>>,
}

impl<T> Cascade<T> {
    pub fn new(region: RegionKind) -> Self {
        Self {
            region,
            tiers: Vec::new(),
        }
    }

    pub fn with<S>(mut self, strategy: S) -> Self
    where
        S: LocateStrategy<Output = T> + Send + Sync + 'static,
    {
        self.tiers.push(Box::new(strategy));
        self
    }

    pub fn tiers(&self) -> Vec<RegionTier> {
        self.tiers.iter().map(|t| t.tier()).collect()
    }

    /// First successful tier and its output.
    pub fn run(
        &self,
        ctx: &LocateContext<'_>,
        observer: &dyn PipelineObserver,
    ) -> Option<(RegionTier, T)> {
        for strategy in &self.tiers {
            let tier = strategy.tier();
            match strategy.locate(ctx) {
                Some(out) => return Some((tier, out)),
                None => observer.on_event(&PipelineEvent::TierRejected {
                    region: self.region,
                    tier,
                }),
            }
        }
        None
    }
}
