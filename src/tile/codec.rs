//! Tile codec.
//!
//! Converts between decoded [`Raster`]s and the byte blobs handed to the
//! store. The engine only relies on the codec being able to read back what it
//! wrote; JPEG is the default for interoperability with existing pyramids,
//! PNG is available when tiles must round-trip losslessly.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageFormat, ImageReader};

use super::raster::{Raster, DEFAULT_BANDS};
use crate::error::TileError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Stored tile format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Jpeg { quality: u8 },
    Png,
}

/// Encoder/decoder for stored tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCodec {
    format: TileFormat,
    bands: usize,
}

impl Default for TileCodec {
    fn default() -> Self {
        Self::jpeg(DEFAULT_JPEG_QUALITY)
    }
}

impl TileCodec {
    /// JPEG codec at the given quality (clamped to 1-100).
    pub fn jpeg(quality: u8) -> Self {
        Self {
            format: TileFormat::Jpeg {
                quality: clamp_quality(quality),
            },
            bands: DEFAULT_BANDS,
        }
    }

    /// Lossless PNG codec.
    pub fn png() -> Self {
        Self {
            format: TileFormat::Png,
            bands: DEFAULT_BANDS,
        }
    }

    /// Set the number of bands decoded tiles are expanded to.
    pub fn with_bands(mut self, bands: usize) -> Self {
        self.bands = bands.max(1);
        self
    }

    pub fn format(&self) -> TileFormat {
        self.format
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// File extension used in tile names.
    pub fn extension(&self) -> &'static str {
        match self.format {
            TileFormat::Jpeg { .. } => "jpg",
            TileFormat::Png => "png",
        }
    }

    /// Encode a raster into a stored blob.
    pub fn encode(&self, raster: &Raster) -> Result<Bytes, TileError> {
        let mut img = raster.to_dynamic_image();
        // Zero-sized rasters cannot be encoded by either format
        if img.width() == 0 || img.height() == 0 {
            return Err(TileError::Encode {
                message: format!("empty raster {}x{}", img.width(), img.height()),
            });
        }
        let mut output = Vec::new();

        match self.format {
            TileFormat::Jpeg { quality } => {
                // JPEG has no alpha channel
                if raster.bands() == 4 {
                    img = image::DynamicImage::ImageRgb8(img.to_rgb8());
                }
                JpegEncoder::new_with_quality(&mut output, quality)
                    .write_image(img.as_bytes(), img.width(), img.height(), img.color().into())
                    .map_err(|e| TileError::Encode {
                        message: e.to_string(),
                    })?;
            }
            TileFormat::Png => {
                PngEncoder::new(&mut output)
                    .write_image(img.as_bytes(), img.width(), img.height(), img.color().into())
                    .map_err(|e| TileError::Encode {
                        message: e.to_string(),
                    })?;
            }
        }

        Ok(Bytes::from(output))
    }

    /// Decode a stored blob.
    ///
    /// `location` is only used for error reporting.
    pub fn decode(&self, location: &str, data: &[u8]) -> Result<Raster, TileError> {
        let format = match self.format {
            TileFormat::Jpeg { .. } => ImageFormat::Jpeg,
            TileFormat::Png => ImageFormat::Png,
        };
        let reader = ImageReader::with_format(Cursor::new(data), format);

        let img = reader.decode().map_err(|e| TileError::Decode {
            location: location.to_string(),
            message: e.to_string(),
        })?;

        Ok(Raster::from_dynamic_image(&img, self.bands))
    }
}

/// Validate JPEG quality parameter.
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}
