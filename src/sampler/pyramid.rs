//! Tile-backed sampler with coarse-level fallback.
//!
//! A `PyramidSampler` for level `L` carries the whole fallback chain
//! `L, L-1, …, 0` up front. A lookup walks the chain from fine to coarse and
//! answers from the first level whose owning tile is present. Missing or
//! undecodable tiles are remembered in the cache as the missing sentinel, so a
//! sparse pyramid costs one store round trip per absent tile, not per pixel.
//! If no level has the tile the sample is `0`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::pyramid::PyramidLevel;
use crate::tile::{CachedTile, TileCache, TileRepository};

#[derive(Debug, Clone)]
pub struct PyramidSampler {
    /// Requested level first, then each coarser level down to 0
    chain: Vec<PyramidLevel>,
    repo: TileRepository,
    cache: Arc<TileCache>,
}

impl PyramidSampler {
    /// Create a sampler for `level` with a fresh cache.
    pub fn new(level: PyramidLevel, repo: TileRepository) -> Self {
        let cache = repo.new_cache();
        Self::with_cache(level, repo, cache)
    }

    /// Create a sampler sharing an existing cache.
    ///
    /// Cache keys are full tile locations, so one cache can serve samplers of
    /// different levels and prefixes.
    pub fn with_cache(level: PyramidLevel, repo: TileRepository, cache: Arc<TileCache>) -> Self {
        let chain = (0..=level.level())
            .rev()
            .map(|l| level.with_level(l))
            .collect();
        Self { chain, repo, cache }
    }

    /// The level this sampler answers for.
    pub fn level(&self) -> &PyramidLevel {
        &self.chain[0]
    }

    /// The next-coarser level consulted on a miss, if any.
    pub fn upper_level(&self) -> Option<&PyramidLevel> {
        self.chain.get(1)
    }

    /// Every level in fallback order.
    pub fn chain(&self) -> &[PyramidLevel] {
        &self.chain
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    /// Sample `band` at `(u, v)`, falling back to coarser levels as needed.
    pub async fn sample(&self, u: f64, v: f64, band: usize) -> f32 {
        self.sample_with_source(u, v, band)
            .await
            .map(|(value, _)| value)
            .unwrap_or(0.0)
    }

    /// The level that would answer a sample at `(u, v)`, or `None` if the whole
    /// chain is missing there.
    pub async fn source_level(&self, u: f64, v: f64) -> Option<u32> {
        self.sample_with_source(u, v, 0)
            .await
            .map(|(_, level)| level)
    }

    async fn sample_with_source(&self, u: f64, v: f64, band: usize) -> Option<(f32, u32)> {
        for (depth, level) in self.chain.iter().enumerate() {
            let addr = level.address(u, v, 0);
            let location = level.tile_location(addr.row, addr.col, self.repo.extension());

            let entry = self
                .cache
                .get_or_load(&location, || self.repo.read_tile(&location))
                .await;

            if let CachedTile::Loaded(raster) = entry {
                if depth > 0 {
                    debug!(
                        requested = self.chain[0].level(),
                        answered = level.level(),
                        u,
                        v,
                        "sampled from coarser level"
                    );
                }
                let value = match raster.get_wrapped(addr.x, addr.y, band) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(tile = %location, x = addr.x, y = addr.y, error = %e, "pixel access failed, using default");
                        0.0
                    }
                };
                return Some((value, level.level()));
            }
        }
        None
    }
}
