//! Tile layer.
//!
//! Everything between raw stored bytes and pixel samples:
//!
//! - [`Raster`]: decoded pixel buffer (`width × height × bands` of `f32`)
//! - [`TileCodec`]: encodes rasters to JPEG/PNG blobs and back
//! - [`TileCache`]: per-sampler cache of decoded tiles with a missing sentinel
//! - [`TileRepository`]: store + codec, the decoded-tile adapter used by
//!   samplers and build passes

mod cache;
mod codec;
mod raster;
mod repository;

pub use cache::{CacheLookup, CachedTile, TileCache, DEFAULT_TILE_CACHE_CAPACITY};
pub use codec::{
    clamp_quality, is_valid_quality, TileCodec, TileFormat, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use raster::{Raster, DEFAULT_BANDS};
pub use repository::TileRepository;
