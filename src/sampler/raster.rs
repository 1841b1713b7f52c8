use std::sync::Arc;

use tracing::warn;

use crate::pyramid::coords::{level_scale, wrap};
use crate::pyramid::PyramidLevel;
use crate::tile::Raster;

/// Sampler backed by one in-memory raster.
///
/// The raster is placed on the continuous plane by an origin and a pixel
/// density per axis. Lookups use nearest-neighbour addressing with the tile
/// edge policy: pixels outside the raster wrap against its own dimensions.
#[derive(Debug, Clone)]
pub struct RasterSampler {
    raster: Arc<Raster>,
    origin_u: f64,
    origin_v: f64,
    pixels_per_u: f64,
    pixels_per_v: f64,
    /// Wrap periods `(u, v)` applied before addressing, for whole-plane rasters
    periods: Option<(f64, f64)>,
}

impl RasterSampler {
    /// A raster covering the whole image plane.
    ///
    /// The aspect ratio is taken from the raster (`height / width`), so `u`
    /// wraps modulo 1 and `v` modulo that aspect.
    pub fn direct(raster: Arc<Raster>) -> Self {
        let width = raster.width().max(1) as f64;
        let height = raster.height().max(1) as f64;
        let aspect = height / width;
        Self {
            raster,
            origin_u: 0.0,
            origin_v: 0.0,
            pixels_per_u: width,
            pixels_per_v: height / aspect,
            periods: Some((1.0, aspect)),
        }
    }

    /// A raster holding the transformed output of one padded tile.
    ///
    /// The transform consumed a `(tile_size + 2·padding)²` raster centred on
    /// tile `(row, col)` of `level` and may have changed its size; the scale
    /// factor between the two is applied per axis. No plane wrap is applied:
    /// callers only sample inside the tile's footprint.
    pub fn for_transformed_tile(
        raster: Arc<Raster>,
        level: &PyramidLevel,
        row: u32,
        col: u32,
        padding: u32,
    ) -> Self {
        let ts = level.tile_size() as f64;
        let scale = level_scale(level.level());
        let padded = ts + 2.0 * padding as f64;
        let pad_units = padding as f64 / ts;

        Self {
            origin_u: (col as f64 - pad_units) / scale,
            origin_v: (row as f64 - pad_units) / scale,
            pixels_per_u: raster.width() as f64 / padded * ts * scale,
            pixels_per_v: raster.height() as f64 / padded * ts * scale,
            periods: None,
            raster,
        }
    }

    pub fn raster(&self) -> &Arc<Raster> {
        &self.raster
    }

    /// Aspect ratio of the plane this sampler covers, if it covers the whole plane.
    pub fn aspect(&self) -> Option<f64> {
        self.periods.map(|(_, v)| v)
    }

    pub fn sample(&self, u: f64, v: f64, band: usize) -> f32 {
        let (u, v) = match self.periods {
            Some((pu, pv)) => (wrap(u, pu), wrap(v, pv)),
            None => (u, v),
        };
        let x = ((u - self.origin_u) * self.pixels_per_u).floor() as i64;
        let y = ((v - self.origin_v) * self.pixels_per_v).floor() as i64;

        match self.raster.get_wrapped(x, y, band) {
            Ok(value) => value,
            Err(e) => {
                warn!(u, v, x, y, error = %e, "pixel access failed, using default");
                0.0
            }
        }
    }
}
