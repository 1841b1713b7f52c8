use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Trait for reading and writing named tile blobs.
///
/// A location is the opaque string `location_prefix + tile_name`. The engine
/// never interprets it; each implementation maps it onto its own namespace.
/// Implementations must tolerate concurrent writes to distinct locations.
#[async_trait]
pub trait TileStore: Send + Sync {
    /// Read the full blob at `location`.
    ///
    /// Returns `StoreError::NotFound` when nothing is stored there.
    async fn get(&self, location: &str) -> Result<Bytes, StoreError>;

    /// Write `data` at `location`, replacing any previous blob.
    async fn put(&self, location: &str, data: Bytes) -> Result<(), StoreError>;

    /// Check whether a blob exists at `location`.
    async fn exists(&self, location: &str) -> Result<bool, StoreError> {
        match self.get(location).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get a unique identifier for this store (for logging).
    fn identifier(&self) -> &str;
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// In-memory tile store.
///
/// Used for tests and dry runs. Tracks how many reads were served so callers
/// can verify caching behaviour.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Bytes>>,
    read_count: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served so far, hits and misses alike.
    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }

    /// Sorted list of every stored location.
    pub async fn locations(&self) -> Vec<String> {
        let blobs = self.blobs.read().await;
        let mut names: Vec<String> = blobs.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    pub async fn remove(&self, location: &str) -> Option<Bytes> {
        self.blobs.write().await.remove(location)
    }
}

#[async_trait]
impl TileStore for MemoryStore {
    async fn get(&self, location: &str) -> Result<Bytes, StoreError> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .read()
            .await
            .get(location)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(location.to_string()))
    }

    async fn put(&self, location: &str, data: Bytes) -> Result<(), StoreError> {
        self.blobs.write().await.insert(location.to_string(), data);
        Ok(())
    }

    async fn exists(&self, location: &str) -> Result<bool, StoreError> {
        Ok(self.blobs.read().await.contains_key(location))
    }

    fn identifier(&self) -> &str {
        "memory://"
    }
}
