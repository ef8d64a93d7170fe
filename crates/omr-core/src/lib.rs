//! Core types and utilities for bubble-sheet reading.
//!
//! This crate owns the lightweight image types shared by every stage
//! (`RasterImage`, `GrayImage`, `BinaryMask`), the page geometry vocabulary
//! (`PixelRect`, `FracRect`, `Quadrilateral`, `CornerRole`), and the generic
//! steps the decoders are built from:
//!
//! - [`Preprocessor`]: grayscale, blur and local-mean binarization,
//! - [`PerspectiveCorrector`]: 4-point homography and resampling,
//! - [`extract_blobs`]: connected components with simple shape statistics,
//! - [`find_rectangles`]: contour-based near-rectangular region search,
//! - [`morphology`]: erosion, line opening and hole filling on masks.
//!
//! Low-level primitives (gaussian blur, component labelling, contour tracing,
//! erosion, polygon approximation) are delegated to `imageproc`.

mod blob;
mod contours;
mod geometry;
mod homography;
mod mask;
pub mod morphology;
mod preprocess;
mod raster;
mod rectify;
#[cfg(feature = "tracing")]
mod trace;

pub use blob::{extract_blobs, Blob};
pub use contours::{
    find_rectangles, outer_contours, polygon_area, RectangleCandidate, RectangleFilter,
};
pub use geometry::{CornerRole, FracRect, PixelRect, Quadrilateral};
pub use homography::{homography_from_4pt, warp_perspective_gray, Homography};
pub use mask::{BinaryMask, MaskRegion, FOREGROUND};
pub use preprocess::{local_mean_threshold, PreprocessParams, Preprocessor};
pub use raster::{sample_bilinear, GrayImage, GrayImageView, ImageError, RasterImage};
pub use rectify::{
    adaptive_target_size, expand_quad, PerspectiveCorrector, RectifiedImage, RectifyError,
    TargetSize,
};

#[cfg(feature = "tracing")]
pub use trace::{init_tracing, DEFAULT_FILTER};
