//! Decoded tile cache.
//!
//! Each sampler owns a cache of decoded tiles keyed by tile location. An entry
//! is either a decoded raster or the *missing* sentinel, which records that the
//! tile was looked up and is absent or undecodable. The sentinel is distinct
//! from "not yet loaded": a missing entry short-circuits straight to fallback
//! without touching the store again.
//!
//! # Singleflight
//!
//! Many output pixels of a parallel tile job map onto the same source tile.
//! Concurrent loads for one key share a single fetch and decode: the first
//! caller becomes the leader, the rest wait on a `Notify` and re-read the cache.
//! At most one entry exists per key.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, warn};

use super::raster::Raster;
use crate::error::TileError;

/// Default number of decoded tiles kept per cache.
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 1024;

/// A cached tile.
#[derive(Debug, Clone)]
pub enum CachedTile {
    Loaded(Arc<Raster>),
    /// The tile is absent or undecodable
    Missing,
}

/// Result of a cache lookup that does not trigger a load.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    Hit(Arc<Raster>),
    /// The missing sentinel is cached
    NotFound,
    /// Nothing cached yet
    Miss,
}

/// LRU cache of decoded tiles with singleflight loading.
///
/// # Thread Safety
///
/// The cache is thread-safe and can be shared across tasks via `Arc`.
pub struct TileCache {
    /// Cached entries indexed by tile location
    cache: RwLock<LruCache<String, CachedTile>>,
    /// In-flight loads for singleflight. Never held across an await.
    in_flight: Mutex<HashMap<String, Arc<Notify>>>,
    capacity: usize,
}

impl TileCache {
    /// Create a cache with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `capacity` tiles (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            capacity: capacity.get(),
        }
    }

    /// Tri-state lookup without loading and without updating LRU order.
    pub async fn lookup(&self, key: &str) -> CacheLookup {
        match self.cache.read().await.peek(key) {
            Some(CachedTile::Loaded(raster)) => CacheLookup::Hit(raster.clone()),
            Some(CachedTile::Missing) => CacheLookup::NotFound,
            None => CacheLookup::Miss,
        }
    }

    /// Get the entry for `key`, loading it with `load` if nothing is cached.
    ///
    /// Load failures classified as missing (`NotFound`, `Decode`) are cached
    /// as the missing sentinel. Other failures (network, I/O) are reported as
    /// missing for this call only, so a later lookup retries the load.
    ///
    /// If the leading load is cancelled, its waiters are woken and one of them
    /// takes over the load.
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> CachedTile
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Raster, TileError>>,
    {
        let guard = loop {
            // Fast path: check cache
            if let Some(entry) = self.peek(key).await {
                return entry;
            }

            let existing = {
                let mut in_flight = self.lock_in_flight();
                match in_flight.get(key) {
                    Some(existing) => Some(existing.clone()),
                    None => {
                        // We're the leader for this tile
                        in_flight.insert(key.to_string(), Arc::new(Notify::new()));
                        None
                    }
                }
            };

            let Some(existing) = existing else {
                break InFlightGuard {
                    in_flight: &self.in_flight,
                    key,
                };
            };

            // Another task is loading this tile, wait for it
            let notified = existing.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            // The leader may have left between releasing the lock and registering
            if self.is_loading(key, &existing) {
                notified.await;
            }
        };

        // The previous leader stores its entry before leaving `in_flight`
        if let Some(entry) = self.peek(key).await {
            return entry;
        }

        let entry = match load().await {
            Ok(raster) => Some(CachedTile::Loaded(Arc::new(raster))),
            Err(e) if e.is_missing() => {
                debug!(tile = key, error = %e, "tile unavailable, caching missing sentinel");
                Some(CachedTile::Missing)
            }
            Err(e) => {
                warn!(tile = key, error = %e, "tile load failed, not cached");
                None
            }
        };

        if let Some(ref entry) = entry {
            self.cache.write().await.put(key.to_string(), entry.clone());
        }
        // Leave `in_flight` and wake waiters
        drop(guard);

        entry.unwrap_or(CachedTile::Missing)
    }

    fn is_loading(&self, key: &str, notify: &Arc<Notify>) -> bool {
        self.lock_in_flight()
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, notify))
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, Arc<Notify>>> {
        // The map is left consistent by every critical section, so a poisoned
        // lock is still usable
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn peek(&self, key: &str) -> Option<CachedTile> {
        self.cache.read().await.peek(key).cloned()
    }

    /// Insert an entry directly, replacing any previous one.
    pub async fn insert(&self, key: impl Into<String>, entry: CachedTile) {
        self.cache.write().await.put(key.into(), entry);
    }

    /// Drop an entry so the next lookup reloads it.
    pub async fn invalidate(&self, key: &str) -> Option<CachedTile> {
        self.cache.write().await.pop(key)
    }

    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Marks a key as being loaded. Dropping it, after the load finished or
/// because the leading future was cancelled, releases the key and wakes every
/// waiter.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<String, Arc<Notify>>>,
    key: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let notify = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(self.key);
        if let Some(notify) = notify {
            notify.notify_waiters();
        }
    }
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}
