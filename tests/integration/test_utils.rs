//! Test utilities for integration tests.
//!
//! This module provides store wrappers with injectable failures and helpers
//! for seeding pyramids from synthetic images.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use tile_pyramid::error::StoreError;
use tile_pyramid::{
    LayerReport, MemoryStore, PyramidLevel, Raster, RasterSampler, TileCodec, TileRepository,
    TileScheduler, TileStore, ValueSampler,
};

// =============================================================================
// Repositories and Images
// =============================================================================

/// A lossless in-memory repository.
pub fn png_repo() -> (Arc<MemoryStore>, TileRepository) {
    let store = Arc::new(MemoryStore::new());
    let repo = TileRepository::new(store.clone()).with_codec(TileCodec::png());
    (store, repo)
}

/// A 3-band image whose samples are distinct-ish integers in 0..=255.
pub fn gradient(width: usize, height: usize) -> Arc<Raster> {
    Arc::new(Raster::from_fn(width, height, 3, |x, y, b| {
        ((x * 7 + y * 13 + b * 50) % 256) as f32
    }))
}

/// An image in which every tile of `level` is a solid `tile_id(row, col)`.
pub fn tile_id_image(level: &PyramidLevel) -> Arc<Raster> {
    let ts = level.tile_size() as usize;
    let width = level.width_px() as usize;
    let height = level.height_tiles() as usize * ts;
    Arc::new(Raster::from_fn(width, height, 3, |x, y, _| {
        tile_id((y / ts) as u32, (x / ts) as u32)
    }))
}

pub fn tile_id(row: u32, col: u32) -> f32 {
    (row * 10 + col + 1) as f32
}

/// Render every tile of `level` from `image` and store it.
pub async fn seed_level(
    repo: &TileRepository,
    level: &PyramidLevel,
    image: Arc<Raster>,
) -> LayerReport {
    let sampler = Arc::new(ValueSampler::from(RasterSampler::direct(image)));
    level
        .render_layer(repo, &TileScheduler::new(4), sampler, true)
        .await
        .unwrap()
}

/// Every stored blob whose location starts with `prefix`, keyed by the rest of
/// the location.
pub async fn blobs_under(store: &MemoryStore, prefix: &str) -> HashMap<String, Bytes> {
    let mut blobs = HashMap::new();
    for location in store.locations().await {
        if let Some(name) = location.strip_prefix(prefix) {
            let data = store.get(&location).await.unwrap();
            blobs.insert(name.to_string(), data);
        }
    }
    blobs
}

// =============================================================================
// Store with Injectable Failures
// =============================================================================

/// A memory store that fails reads or writes for chosen locations.
///
/// Read failures are reported as connection errors, which the tile cache does
/// not remember, so healing a location makes the next read succeed.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_gets: Mutex<HashSet<String>>,
    failing_puts: Mutex<HashSet<String>>,
    get_failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_get(&self, location: impl Into<String>) {
        self.failing_gets.lock().unwrap().insert(location.into());
    }

    pub fn fail_put(&self, location: impl Into<String>) {
        self.failing_puts.lock().unwrap().insert(location.into());
    }

    pub fn heal(&self, location: &str) {
        self.failing_gets.lock().unwrap().remove(location);
        self.failing_puts.lock().unwrap().remove(location);
    }

    pub fn get_failures(&self) -> usize {
        self.get_failures.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl TileStore for FlakyStore {
    async fn get(&self, location: &str) -> Result<Bytes, StoreError> {
        if self.failing_gets.lock().unwrap().contains(location) {
            self.get_failures.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Connection(format!("injected read failure: {location}")));
        }
        self.inner.get(location).await
    }

    async fn put(&self, location: &str, data: Bytes) -> Result<(), StoreError> {
        if self.failing_puts.lock().unwrap().contains(location) {
            return Err(StoreError::Io(format!("injected write failure: {location}")));
        }
        self.inner.put(location, data).await
    }

    async fn exists(&self, location: &str) -> Result<bool, StoreError> {
        self.inner.exists(location).await
    }

    fn identifier(&self) -> &str {
        "flaky://"
    }
}
