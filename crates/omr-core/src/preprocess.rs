//! Grayscale conversion, blur and local-mean binarization.

use crate::{BinaryMask, GrayImage, ImageError, RasterImage};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParams {
    /// Gaussian sigma; blur is skipped when `<= 0`.
    pub blur_sigma: f32,
    /// Side of the local-mean window in pixels (odd values are symmetric).
    pub block_size: usize,
    /// A pixel is ink when it is at least `bias` levels darker than its window mean.
    pub bias: i32,
    /// Images whose median intensity is below this are treated as negatives.
    pub negative_median_max: u8,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            block_size: 15,
            bias: 5,
            negative_median_max: 80,
        }
    }
}

/// Turns input rasters into ink-foreground masks.
#[derive(Clone, Debug, Default)]
pub struct Preprocessor {
    params: PreprocessParams,
}

impl Preprocessor {
    pub fn new(params: PreprocessParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PreprocessParams {
        &self.params
    }

    /// Grayscale, polarity fix, blur and adaptive threshold.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image), fields(w = image.width, h = image.height))
    )]
    pub fn normalize(&self, image: &RasterImage) -> Result<BinaryMask, ImageError> {
        let gray = image.to_gray()?;
        Ok(self.binarize(&gray))
    }

    /// Same as [`normalize`](Self::normalize) for an image that is already gray.
    pub fn binarize(&self, gray: &GrayImage) -> BinaryMask {
        if gray.width == 0 || gray.height == 0 {
            return BinaryMask::new(gray.width, gray.height);
        }
        let oriented = self.fix_polarity(gray);
        let smoothed = self.blur(oriented.as_ref().unwrap_or(gray));
        local_mean_threshold(&smoothed, self.params.block_size, self.params.bias)
    }

    /// Inverted copy for photographic negatives, `None` if already dark-on-light.
    pub fn fix_polarity(&self, gray: &GrayImage) -> Option<GrayImage> {
        let median = gray.median();
        if median >= self.params.negative_median_max {
            return None;
        }
        log::debug!("median intensity {median}: treating input as a negative");
        Some(GrayImage {
            width: gray.width,
            height: gray.height,
            data: gray.data.iter().map(|&v| 255 - v).collect(),
        })
    }

    fn blur(&self, gray: &GrayImage) -> GrayImage {
        if self.params.blur_sigma <= 0.0 {
            return gray.clone();
        }
        let blurred = imageproc::filter::gaussian_blur_f32(&gray.to_luma(), self.params.blur_sigma);
        GrayImage::from_luma(&blurred)
    }
}

/// Ink where `value <= mean(window) - bias`; the window is clipped at the
/// borders. Uses an integral image, so cost is independent of `block_size`.
pub fn local_mean_threshold(gray: &GrayImage, block_size: usize, bias: i32) -> BinaryMask {
    let (w, h) = (gray.width, gray.height);
    let mut mask = BinaryMask::new(w, h);
    if w == 0 || h == 0 {
        return mask;
    }

    let stride = w + 1;
    let mut integral = vec![0u64; stride * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += gray.data[y * w + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let half = block_size.max(1) / 2;
    for y in 0..h {
        let y0 = y.saturating_sub(half);
        let y1 = (y + half + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(half);
            let x1 = (x + half + 1).min(w);
            let count = ((x1 - x0) * (y1 - y0)) as i64;
            let sum = (integral[y1 * stride + x1] + integral[y0 * stride + x0]) as i64
                - (integral[y0 * stride + x1] + integral[y1 * stride + x0]) as i64;
            let v = gray.data[y * w + x] as i64;
            if v * count <= sum - bias as i64 * count {
                mask.set(x, y, true);
            }
        }
    }
    mask
}
