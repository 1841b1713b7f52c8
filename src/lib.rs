//! # Tile Pyramid
//!
//! A multiresolution image pyramid engine.
//!
//! A large raster is stored as a hierarchy of fixed-size tiles across zoom
//! levels: level `L` is `2^L` tiles wide and `ceil(2^L · aspect)` tiles tall.
//! The engine samples the image at continuous coordinates, falling back to
//! coarser levels wherever fine tiles are missing, and builds new levels from
//! existing ones, either finer (through a caller-supplied transform) or coarser
//! (through box filtering).
//!
//! ## Features
//!
//! - **Wraparound addressing**: both axes wrap, so panoramas are seamless
//! - **Total samplers**: sparse or partially built pyramids answer every
//!   coordinate at the best resolution available
//! - **Decode-once caching**: concurrent lookups of one tile share a single
//!   fetch, and absent tiles are remembered
//! - **Bounded parallel builds**: tiles render row-parallel with per-tile
//!   failure isolation
//! - **Pluggable storage**: local filesystem, S3-compatible object storage, or
//!   memory
//!
//! ## Architecture
//!
//! - [`io`] - byte-level tile stores
//! - [`tile`] - rasters, tile codec, decoded-tile cache and repository
//! - [`pyramid`] - coordinate mapping, pyramid levels, layer builds, scheduler
//! - [`sampler`] - value samplers over rasters, pyramid levels and quadtree tile services
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tile_pyramid::{MemoryStore, PyramidLevel, TileRepository, TileScheduler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let repo = TileRepository::new(Arc::new(MemoryStore::new()));
//!     let top = PyramidLevel::new(256, 4, 0.5, "pano/");
//!
//!     // Regenerate levels 3..=0 from a populated level 4
//!     top.rebuild(&repo, &TileScheduler::default(), 0, true).await.unwrap();
//!
//!     // Sample anywhere; missing tiles fall back to coarser levels
//!     let sampler = top.sampler(&repo);
//!     let red = sampler.sample(0.25, 0.1, 0).await;
//!     println!("{red}");
//! }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod pyramid;
pub mod sampler;
pub mod tile;

// Re-export commonly used types
pub use error::{BuildError, StoreError, TileError, TransformError};
pub use io::{create_s3_client, FsStore, MemoryStore, S3Store, TileStore};
pub use pyramid::{
    parse_tile_name, tile_name, BatchReport, BoxFilter, BuildOptions, LayerReport, NearestUpscale,
    PixelTransform, PyramidLevel, TileAddress, TileFailure, TileScheduler, TileSourceDescriptor,
    MAX_LEVEL,
};
pub use sampler::{PyramidSampler, QuadtreeSampler, RasterSampler, ValueSampler};
pub use tile::{
    CacheLookup, CachedTile, Raster, TileCache, TileCodec, TileFormat, TileRepository,
    DEFAULT_BANDS, DEFAULT_JPEG_QUALITY, DEFAULT_TILE_CACHE_CAPACITY,
};
