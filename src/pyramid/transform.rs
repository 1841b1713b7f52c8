//! Pixel transforms applied during layer builds.
//!
//! A transform takes a whole raster and returns a new one, possibly with
//! different dimensions. The upscaling build feeds it padded tiles. The
//! reducing build feeds it `2 × tile_size` squares and expects `tile_size`
//! squares back. Transforms are synchronous and may be slow; the scheduler
//! runs them on the blocking pool.

use crate::error::TransformError;
use crate::tile::Raster;

/// A caller-supplied raster transform.
pub trait PixelTransform: Send + Sync {
    fn apply(&self, input: Raster) -> Result<Raster, TransformError>;
}

impl<F> PixelTransform for F
where
    F: Fn(Raster) -> Result<Raster, TransformError> + Send + Sync,
{
    fn apply(&self, input: Raster) -> Result<Raster, TransformError> {
        self(input)
    }
}

/// 2×2 box filter: each output sample is the mean of the 2×2 input block it
/// covers. Odd trailing rows/columns are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxFilter;

impl PixelTransform for BoxFilter {
    fn apply(&self, input: Raster) -> Result<Raster, TransformError> {
        Ok(downsample2x2_mean(&input))
    }
}

/// Halve a raster by 2×2 block averaging.
pub fn downsample2x2_mean(src: &Raster) -> Raster {
    let dst_w = src.width() / 2;
    let dst_h = src.height() / 2;
    let bands = src.bands();
    let row_stride = src.width() * bands;
    let data = src.data();

    Raster::from_fn(dst_w, dst_h, bands, |x, y, b| {
        let top = (2 * y) * row_stride + (2 * x) * bands + b;
        let bottom = top + row_stride;
        (data[top] + data[top + bands] + data[bottom] + data[bottom + bands]) * 0.25
    })
}

/// Nearest-neighbour enlargement by an integer factor.
///
/// Stands in for an expensive external transform when a level only needs to be
/// enlarged, not restyled.
#[derive(Debug, Clone, Copy)]
pub struct NearestUpscale {
    pub factor: usize,
}

impl NearestUpscale {
    pub fn new(factor: usize) -> Self {
        Self { factor }
    }
}

impl PixelTransform for NearestUpscale {
    fn apply(&self, input: Raster) -> Result<Raster, TransformError> {
        if self.factor == 0 {
            return Err(TransformError::new("upscale factor must be at least 1"));
        }
        let f = self.factor;
        let bands = input.bands();
        let src_w = input.width();
        let data = input.data();
        Ok(Raster::from_fn(
            input.width() * f,
            input.height() * f,
            bands,
            |x, y, b| data[((y / f) * src_w + x / f) * bands + b],
        ))
    }
}
