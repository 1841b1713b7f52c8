//! Local filesystem tile store.
//!
//! Locations are interpreted as relative paths under a root directory.
//! Parent directories are created on write, so a prefix such as `run1/`
//! becomes a sub-directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::TileStore;
use crate::error::StoreError;

/// Filesystem-backed implementation of `TileStore`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    identifier: String,
}

impl FsStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let identifier = format!("file://{}", root.display());
        Self { root, identifier }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a location to a path under the root.
    ///
    /// Absolute components and `..` are rejected so a location can never
    /// escape the root directory.
    fn path_for(&self, location: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(location);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || location.is_empty() {
            return Err(StoreError::Io(format!("invalid tile location: {location:?}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl TileStore for FsStore {
    async fn get(&self, location: &str) -> Result<Bytes, StoreError> {
        let path = self.path_for(location)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(StoreError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    async fn put(&self, location: &str, data: Bytes) -> Result<(), StoreError> {
        let path = self.path_for(location)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))
    }

    async fn exists(&self, location: &str) -> Result<bool, StoreError> {
        let path = self.path_for(location)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
