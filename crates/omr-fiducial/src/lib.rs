//! Alignment-marker detection for bubble sheets.
//!
//! Two independent marker families are searched on the same ink mask:
//!
//! - four L-shaped page-corner marks, one per page quadrant, whose outer
//!   elbows define the page quadrilateral;
//! - up to four small filled rectangles framing the answer block.
//!
//! Both searches are soft: they return whatever they find (0 to 4 markers)
//! and callers decide whether that is enough to warp.

mod block;
mod lshape;
mod types;

pub use types::{
    corner_quad, fiducial_bounds, Fiducial, FiducialKind, FiducialParams, LMarkerParams,
    RectMarkerParams,
};

use omr_core::BinaryMask;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Finds page-corner and block markers in an ink mask.
#[derive(Clone, Debug, Default)]
pub struct FiducialDetector {
    params: FiducialParams,
}

impl FiducialDetector {
    pub fn new(params: FiducialParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FiducialParams {
        &self.params
    }

    /// L-shaped marks, at most one per quadrant, in TL, TR, BR, BL order.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, mask), fields(w = mask.width, h = mask.height))
    )]
    pub fn find_page_corners(&self, mask: &BinaryMask) -> Vec<Fiducial> {
        lshape::find_page_corners(mask, &self.params.corners)
    }

    /// Filled rectangles inside the configured search band, one per role.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, mask), fields(w = mask.width, h = mask.height))
    )]
    pub fn find_block_markers(&self, mask: &BinaryMask) -> Vec<Fiducial> {
        block::find_block_markers(mask, &self.params.blocks)
    }
}
