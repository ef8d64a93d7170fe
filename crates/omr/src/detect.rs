use crate::core::{GrayImage, RasterImage};
use crate::sheet::{PipelineError, ProcessResult, SheetPipeline, SheetReading};
use image::DynamicImage;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid grayscale image dimensions (width={width}, height={height})")]
    InvalidGrayDimensions { width: u32, height: u32 },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Adapt any decoded `image` raster into the interleaved `omr-core` raster.
///
/// 8-bit gray, gray+alpha, RGB and RGBA are passed through untouched; every
/// other pixel format is converted to RGBA8 first.
pub fn raster_from_dynamic(img: &DynamicImage) -> RasterImage {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let (channels, data) = match img {
        DynamicImage::ImageLuma8(b) => (1, b.as_raw().clone()),
        DynamicImage::ImageLumaA8(b) => (2, b.as_raw().clone()),
        DynamicImage::ImageRgb8(b) => (3, b.as_raw().clone()),
        DynamicImage::ImageRgba8(b) => (4, b.as_raw().clone()),
        other => (4, other.to_rgba8().into_raw()),
    };
    RasterImage {
        width,
        height,
        channels,
        data,
    }
}

/// Convert an `image::GrayImage` into a single-channel raster.
pub fn raster_from_gray(img: &::image::GrayImage) -> RasterImage {
    RasterImage::from_gray(GrayImage::from_luma(img))
}

/// Read one sheet end-to-end. Failures are folded into the result.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, pipeline), fields(width = img.width(), height = img.height()))
)]
pub fn read_sheet(img: &DynamicImage, pipeline: &SheetPipeline) -> ProcessResult {
    pipeline.process(&raster_from_dynamic(img))
}

/// Convenience overload using the default sheet layout.
pub fn read_sheet_default(img: &DynamicImage) -> ProcessResult {
    read_sheet(img, &SheetPipeline::default())
}

/// Build an `image::GrayImage` from a raw grayscale buffer.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, DetectError> {
    let w = usize::try_from(width).ok();
    let h = usize::try_from(height).ok();
    let Some((w, h)) = w.zip(h) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    let Some(expected) = w.checked_mul(h) else {
        return Err(DetectError::InvalidGrayDimensions { width, height });
    };
    if pixels.len() != expected {
        return Err(DetectError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec())
        .ok_or(DetectError::InvalidGrayDimensions { width, height })
}

/// Read a sheet from a raw 8-bit grayscale buffer, surfacing fatal errors.
pub fn read_sheet_from_gray_u8(
    width: u32,
    height: u32,
    pixels: &[u8],
    pipeline: &SheetPipeline,
) -> Result<SheetReading, DetectError> {
    let img = gray_image_from_slice(width, height, pixels)?;
    Ok(pipeline.try_process(&raster_from_gray(&img))?)
}
