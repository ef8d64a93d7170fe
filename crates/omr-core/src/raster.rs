use serde::{Deserialize, Serialize};

use crate::PixelRect;

/// Errors raised when an input raster cannot be used.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("image has zero area ({width}x{height})")]
    EmptyImage { width: usize, height: usize },
    #[error("pixel buffer length mismatch (expected {expected} bytes, got {got})")]
    BufferLength { expected: usize, got: usize },
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(usize),
}

/// Decoded input raster, row-major and interleaved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterImage {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<u8>,
}

impl RasterImage {
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        if !(1..=4).contains(&channels) {
            return Err(ImageError::UnsupportedChannels(channels));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or(ImageError::EmptyImage { width, height })?;
        if data.len() != expected {
            return Err(ImageError::BufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn from_gray(img: GrayImage) -> Self {
        Self {
            width: img.width,
            height: img.height,
            channels: 1,
            data: img.data,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Single-channel intensity using Rec.601 luma weights.
    ///
    /// Alpha is ignored. Fails on zero area.
    pub fn to_gray(&self) -> Result<GrayImage, ImageError> {
        if self.is_empty() {
            return Err(ImageError::EmptyImage {
                width: self.width,
                height: self.height,
            });
        }
        let n = self.width * self.height;
        let data = match self.channels {
            1 => self.data.clone(),
            2 => self.data.chunks_exact(2).map(|px| px[0]).collect(),
            3 | 4 => self
                .data
                .chunks_exact(self.channels)
                .map(|px| luma(px[0], px[1], px[2]))
                .collect(),
            c => return Err(ImageError::UnsupportedChannels(c)),
        };
        debug_assert_eq!(data.len(), n);
        Ok(GrayImage {
            width: self.width,
            height: self.height,
            data,
        })
    }
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Uniform image filled with `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Copy of the pixels inside `rect` (clipped to the image).
    pub fn crop(&self, rect: &PixelRect) -> GrayImage {
        let r = rect.clip(self.width, self.height);
        let mut data = Vec::with_capacity(r.area());
        for y in r.y..r.bottom() {
            let row = y * self.width;
            data.extend_from_slice(&self.data[row + r.x..row + r.right()]);
        }
        GrayImage {
            width: r.width,
            height: r.height,
            data,
        }
    }

    /// Median intensity (0 for an empty image).
    pub fn median(&self) -> u8 {
        if self.data.is_empty() {
            return 0;
        }
        let mut hist = [0usize; 256];
        for &v in &self.data {
            hist[v as usize] += 1;
        }
        let half = self.data.len().div_ceil(2);
        let mut acc = 0usize;
        for (v, &h) in hist.iter().enumerate() {
            acc += h;
            if acc >= half {
                return v as u8;
            }
        }
        255
    }

    pub fn to_luma(&self) -> ::image::GrayImage {
        ::image::GrayImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
            .unwrap_or_else(|| ::image::GrayImage::new(self.width as u32, self.height as u32))
    }

    pub fn from_luma(img: &::image::GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().clone(),
        }
    }
}

#[inline]
fn get_gray_clamped(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    let x = x.clamp(0, src.width as i32 - 1) as usize;
    let y = y.clamp(0, src.height as i32 - 1) as usize;
    src.data[y * src.width + x]
}

/// Bilinear sample with pixel centers at integer coordinates; out-of-range
/// coordinates replicate the border.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    if src.width == 0 || src.height == 0 {
        return 0.0;
    }
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray_clamped(src, x0, y0) as f32;
    let p10 = get_gray_clamped(src, x0 + 1, y0) as f32;
    let p01 = get_gray_clamped(src, x0, y0 + 1) as f32;
    let p11 = get_gray_clamped(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub(crate) fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).round().clamp(0.0, 255.0) as u8
}
