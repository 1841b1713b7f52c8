//! In-memory pixel buffers.
//!
//! A [`Raster`] is the decoded form of a tile: `width × height` pixels with
//! `bands` interleaved `f32` samples each. Samples use the 0..=255 scale of the
//! 8-bit images tiles are stored as, but are not clamped until encoding.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

use crate::error::TileError;

/// Default number of bands (RGB).
pub const DEFAULT_BANDS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    bands: usize,
    data: Vec<f32>,
}

impl Raster {
    /// Create a zero-filled raster.
    pub fn new(width: usize, height: usize, bands: usize) -> Self {
        Self {
            width,
            height,
            bands,
            data: vec![0.0; width * height * bands],
        }
    }

    /// Create a raster by evaluating `f(x, y, band)` for every sample.
    pub fn from_fn(
        width: usize,
        height: usize,
        bands: usize,
        mut f: impl FnMut(usize, usize, usize) -> f32,
    ) -> Self {
        let mut data = Vec::with_capacity(width * height * bands);
        for y in 0..height {
            for x in 0..width {
                for band in 0..bands {
                    data.push(f(x, y, band));
                }
            }
        }
        Self {
            width,
            height,
            bands,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    fn index(&self, x: usize, y: usize, band: usize) -> Result<usize, TileError> {
        if x >= self.width || y >= self.height || band >= self.bands {
            return Err(TileError::PixelAccess {
                x,
                y,
                band,
                width: self.width,
                height: self.height,
                bands: self.bands,
            });
        }
        Ok((y * self.width + x) * self.bands + band)
    }

    /// Read one sample.
    pub fn get(&self, x: usize, y: usize, band: usize) -> Result<f32, TileError> {
        let idx = self.index(x, y, band)?;
        Ok(self.data[idx])
    }

    /// Write one sample.
    pub fn set(&mut self, x: usize, y: usize, band: usize, value: f32) -> Result<(), TileError> {
        let idx = self.index(x, y, band)?;
        self.data[idx] = value;
        Ok(())
    }

    /// Read one sample at signed coordinates, re-wrapped against this raster's
    /// own dimensions.
    ///
    /// This is the edge policy for tile lookups: a neighbour pixel that lands
    /// just outside the buffer wraps back into it instead of failing.
    pub fn get_wrapped(&self, x: i64, y: i64, band: usize) -> Result<f32, TileError> {
        if self.width == 0 || self.height == 0 {
            return self.get(0, 0, band);
        }
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        self.get(x, y, band)
    }

    /// Convert to an 8-bit image, clamping and rounding every sample.
    ///
    /// 1 band becomes luma, 3 become RGB, 4 become RGBA. Other band counts
    /// keep their first band as luma.
    pub fn to_dynamic_image(&self) -> DynamicImage {
        let w = self.width as u32;
        let h = self.height as u32;
        let q = |x: u32, y: u32, b: usize| -> u8 {
            let v = self.data[((y as usize) * self.width + x as usize) * self.bands + b];
            v.round().clamp(0.0, 255.0) as u8
        };
        match self.bands {
            3 => DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
                Rgb([q(x, y, 0), q(x, y, 1), q(x, y, 2)])
            })),
            4 => DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
                Rgba([q(x, y, 0), q(x, y, 1), q(x, y, 2), q(x, y, 3)])
            })),
            0 => DynamicImage::ImageLuma8(GrayImage::new(w, h)),
            _ => DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| Luma([q(x, y, 0)]))),
        }
    }

    /// Build a raster from a decoded image with the requested band count.
    pub fn from_dynamic_image(img: &DynamicImage, bands: usize) -> Self {
        let width = img.width() as usize;
        let height = img.height() as usize;
        match bands {
            1 => {
                let luma = img.to_luma8();
                Self::from_fn(width, height, 1, |x, y, _| {
                    luma.get_pixel(x as u32, y as u32).0[0] as f32
                })
            }
            4 => {
                let rgba = img.to_rgba8();
                Self::from_fn(width, height, 4, |x, y, b| {
                    rgba.get_pixel(x as u32, y as u32).0[b] as f32
                })
            }
            _ => {
                let rgb = img.to_rgb8();
                Self::from_fn(width, height, bands, |x, y, b| {
                    rgb.get_pixel(x as u32, y as u32).0[b.min(2)] as f32
                })
            }
        }
    }
}
