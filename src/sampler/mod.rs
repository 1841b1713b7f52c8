//! Value samplers.
//!
//! A sampler is a total function `(u, v, band) → sample` over the continuous
//! image plane. Samplers never leave holes: absent data degrades to a coarser
//! level or, at the very bottom, to `0`.
//!
//! The variants are a closed set, so they are modelled as an enum rather than
//! trait objects:
//!
//! - [`RasterSampler`]: one in-memory raster, either covering the whole plane
//!   (*direct*) or scoped to a single transformed tile
//! - [`PyramidSampler`]: tiles of a [`PyramidLevel`](crate::pyramid::PyramidLevel)
//!   with fallback down to level 0
//! - [`QuadtreeSampler`]: tiles named by quadrant-letter codes, with fallback
//!   to parent quadrants

mod pyramid;
pub mod quadtree;
mod raster;

pub use pyramid::PyramidSampler;
pub use quadtree::QuadtreeSampler;
pub use raster::RasterSampler;

#[derive(Debug, Clone)]
pub enum ValueSampler {
    Raster(RasterSampler),
    Pyramid(PyramidSampler),
    Quadtree(QuadtreeSampler),
}

impl ValueSampler {
    /// Sample `band` at continuous coordinates `(u, v)`.
    pub async fn sample(&self, u: f64, v: f64, band: usize) -> f32 {
        match self {
            ValueSampler::Raster(s) => s.sample(u, v, band),
            ValueSampler::Pyramid(s) => s.sample(u, v, band).await,
            ValueSampler::Quadtree(s) => s.sample(u, v, band).await,
        }
    }
}

impl From<RasterSampler> for ValueSampler {
    fn from(s: RasterSampler) -> Self {
        ValueSampler::Raster(s)
    }
}

impl From<PyramidSampler> for ValueSampler {
    fn from(s: PyramidSampler) -> Self {
        ValueSampler::Pyramid(s)
    }
}

impl From<QuadtreeSampler> for ValueSampler {
    fn from(s: QuadtreeSampler) -> Self {
        ValueSampler::Quadtree(s)
    }
}
