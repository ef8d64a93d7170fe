use crate::{GrayImage, PixelRect};

/// Binary ink mask: 255 = foreground (ink), 0 = background.
///
/// Regardless of the photo polarity, marks are always foreground.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

pub const FOREGROUND: u8 = 255;

impl BinaryMask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Pixels at or below `threshold` become foreground.
    pub fn from_gray_threshold(gray: &GrayImage, threshold: u8) -> Self {
        Self {
            width: gray.width,
            height: gray.height,
            data: gray
                .data
                .iter()
                .map(|&v| if v <= threshold { FOREGROUND } else { 0 })
                .collect(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        self.data[y * self.width + x] = if on { FOREGROUND } else { 0 };
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn frame(&self) -> PixelRect {
        PixelRect::new(0, 0, self.width, self.height)
    }

    /// Borrowed window over `rect` (clipped to the mask).
    pub fn region(&self, rect: &PixelRect) -> MaskRegion<'_> {
        MaskRegion {
            mask: self,
            rect: rect.clip(self.width, self.height),
        }
    }

    /// Foreground fraction inside `rect`; 0 for an empty window.
    pub fn density(&self, rect: &PixelRect) -> f32 {
        self.region(rect).density()
    }

    /// Owned copy of `rect` (clipped to the mask).
    pub fn crop(&self, rect: &PixelRect) -> BinaryMask {
        let r = rect.clip(self.width, self.height);
        let mut data = Vec::with_capacity(r.area());
        for y in r.y..r.bottom() {
            let row = y * self.width;
            data.extend_from_slice(&self.data[row + r.x..row + r.right()]);
        }
        BinaryMask {
            width: r.width,
            height: r.height,
            data,
        }
    }

    /// Foreground and background swapped.
    pub fn inverted(&self) -> BinaryMask {
        BinaryMask {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .map(|&v| if v != 0 { 0 } else { FOREGROUND })
                .collect(),
        }
    }

    /// Pixel-wise AND.
    pub fn and(&self, other: &BinaryMask) -> BinaryMask {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        BinaryMask {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| if a != 0 && b != 0 { FOREGROUND } else { 0 })
                .collect(),
        }
    }

    pub fn to_luma(&self) -> ::image::GrayImage {
        ::image::GrayImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
            .unwrap_or_else(|| ::image::GrayImage::new(self.width as u32, self.height as u32))
    }

    /// Any non-zero pixel becomes foreground.
    pub fn from_luma(img: &::image::GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img
                .as_raw()
                .iter()
                .map(|&v| if v != 0 { FOREGROUND } else { 0 })
                .collect(),
        }
    }

    /// Mask rendered as a gray image, ink black on white.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| if v != 0 { 0 } else { 255 }).collect(),
        }
    }
}

/// Borrowed rectangular window into a [`BinaryMask`].
#[derive(Clone, Copy, Debug)]
pub struct MaskRegion<'a> {
    mask: &'a BinaryMask,
    rect: PixelRect,
}

impl MaskRegion<'_> {
    #[inline]
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    pub fn count(&self) -> usize {
        let w = self.mask.width;
        (self.rect.y..self.rect.bottom())
            .map(|y| {
                self.mask.data[y * w + self.rect.x..y * w + self.rect.right()]
                    .iter()
                    .filter(|&&v| v != 0)
                    .count()
            })
            .sum()
    }

    pub fn density(&self) -> f32 {
        let area = self.rect.area();
        if area == 0 {
            0.0
        } else {
            self.count() as f32 / area as f32
        }
    }
}
