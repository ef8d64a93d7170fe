//! Perspective correction of a quadrilateral region onto an upright rectangle.

use crate::{homography_from_4pt, warp_perspective_gray, GrayImage, GrayImageView, Homography};
use crate::{PixelRect, Quadrilateral};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RectifyError {
    #[error("quadrilateral is incomplete ({present} of 4 corners)")]
    IncompleteQuad { present: usize },
    #[error("homography estimation failed for the given corners")]
    HomographyFailed,
    #[error("target size {width}x{height} has zero area")]
    EmptyTarget { width: usize, height: usize },
}

/// Output raster size of a correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: usize,
    pub height: usize,
}

impl TargetSize {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        Self::new(1000, 1400)
    }
}

/// Corrected raster plus the map back into the source image.
#[derive(Clone, Debug)]
pub struct RectifiedImage {
    pub image: GrayImage,
    /// `p_src ~ H * p_rectified`
    pub h_src_from_rect: Homography,
}

impl RectifiedImage {
    pub fn to_source(&self, p: Point2<f32>) -> Point2<f32> {
        self.h_src_from_rect.apply(p)
    }
}

/// Warps quadrilateral regions to upright rectangles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerspectiveCorrector {
    pub canonical: TargetSize,
}

impl PerspectiveCorrector {
    pub fn new(canonical: TargetSize) -> Self {
        Self { canonical }
    }

    /// Map `quad` (TL, TR, BR, BL in source pixels) onto a `target` rectangle.
    ///
    /// The output is always exactly `target` in size.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, src), fields(w = target.width, h = target.height))
    )]
    pub fn correct(
        &self,
        src: &GrayImageView<'_>,
        quad: &Quadrilateral,
        target: TargetSize,
    ) -> Result<RectifiedImage, RectifyError> {
        let corners = quad.corners().ok_or(RectifyError::IncompleteQuad {
            present: quad.present(),
        })?;
        if target.width == 0 || target.height == 0 {
            return Err(RectifyError::EmptyTarget {
                width: target.width,
                height: target.height,
            });
        }

        let (w, h) = (target.width as f32, target.height as f32);
        let rect = [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ];
        let h_src_from_rect =
            homography_from_4pt(&rect, &corners).ok_or(RectifyError::HomographyFailed)?;

        let image = warp_perspective_gray(src, h_src_from_rect, target.width, target.height);
        log::debug!(
            "rectified {}x{} -> {}x{}",
            src.width,
            src.height,
            target.width,
            target.height
        );
        Ok(RectifiedImage {
            image,
            h_src_from_rect,
        })
    }

    /// [`correct`](Self::correct) onto the configured canonical page size.
    pub fn correct_to_canonical(
        &self,
        src: &GrayImageView<'_>,
        quad: &Quadrilateral,
    ) -> Result<RectifiedImage, RectifyError> {
        self.correct(src, quad, self.canonical)
    }
}

/// Push every present corner outward by `margin` pixels along its diagonal.
pub fn expand_quad(quad: &Quadrilateral, margin: f32) -> Quadrilateral {
    let mut out = Quadrilateral::default();
    for role in crate::CornerRole::ALL {
        if let Some(p) = quad.get(role) {
            let (sx, sy) = role.signs();
            out.set(role, Point2::new(p.x + sx * margin, p.y + sy * margin));
        }
    }
    out
}

/// Destination size for an inner block warp: the marker bounding box grown
/// by `margin` on every side, never smaller than `floor`.
pub fn adaptive_target_size(bbox: &PixelRect, margin: usize, floor: TargetSize) -> TargetSize {
    TargetSize::new(
        (bbox.width + 2 * margin).max(floor.width),
        (bbox.height + 2 * margin).max(floor.height),
    )
}
