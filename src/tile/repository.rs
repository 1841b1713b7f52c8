//! Decoded-tile access on top of a byte store.
//!
//! `TileRepository` pairs an injected [`TileStore`] with a [`TileCodec`]. The
//! samplers read through it, and every build pass writes through it.

use std::fmt;
use std::sync::Arc;

use crate::error::TileError;
use crate::io::TileStore;

use super::cache::{TileCache, DEFAULT_TILE_CACHE_CAPACITY};
use super::codec::TileCodec;
use super::raster::Raster;

#[derive(Clone)]
pub struct TileRepository {
    store: Arc<dyn TileStore>,
    codec: TileCodec,
    cache_capacity: usize,
}

impl fmt::Debug for TileRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileRepository")
            .field("store", &self.store.identifier())
            .field("codec", &self.codec)
            .field("cache_capacity", &self.cache_capacity)
            .finish()
    }
}

impl TileRepository {
    /// Create a repository with the default JPEG codec and cache capacity.
    pub fn new(store: Arc<dyn TileStore>) -> Self {
        Self {
            store,
            codec: TileCodec::default(),
            cache_capacity: DEFAULT_TILE_CACHE_CAPACITY,
        }
    }

    pub fn with_codec(mut self, codec: TileCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set how many decoded tiles each sampler built on this repository keeps.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn store(&self) -> &Arc<dyn TileStore> {
        &self.store
    }

    pub fn codec(&self) -> &TileCodec {
        &self.codec
    }

    pub fn extension(&self) -> &'static str {
        self.codec.extension()
    }

    /// A fresh, empty cache sized for this repository.
    pub fn new_cache(&self) -> Arc<TileCache> {
        Arc::new(TileCache::with_capacity(self.cache_capacity))
    }

    /// Fetch and decode the tile at `location`.
    ///
    /// `NotFound` and `Decode` errors mean the tile is unusable; samplers
    /// fall back on either.
    pub async fn read_tile(&self, location: &str) -> Result<Raster, TileError> {
        let data = self.store.get(location).await?;
        self.codec.decode(location, &data)
    }

    /// Encode and store a tile at `location`.
    pub async fn write_tile(&self, location: &str, raster: &Raster) -> Result<(), TileError> {
        let data = self.codec.encode(raster)?;
        self.store.put(location, data).await?;
        Ok(())
    }
}
