//! Pyramid levels, coordinate mapping and layer construction.
//!
//! - [`coords`]: continuous ↔ tile addressing with wraparound
//! - [`PyramidLevel`]: one zoom level and its render/enlarge/reduce operations
//! - [`TileScheduler`]: bounded row-parallel fan-out over a level's tiles
//! - [`PixelTransform`]: the injected per-tile raster transform
//! - [`TileSourceDescriptor`]: what an external viewer needs to know

pub mod coords;
mod descriptor;
mod level;
mod scheduler;
mod transform;

pub use coords::{parse_tile_name, tile_name, TileAddress};
pub use descriptor::TileSourceDescriptor;
pub use level::{BuildOptions, LayerReport, PyramidLevel, MAX_LEVEL};
pub use scheduler::{BatchReport, TileFailure, TileScheduler};
pub use transform::{downsample2x2_mean, BoxFilter, NearestUpscale, PixelTransform};
