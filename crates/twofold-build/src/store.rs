//! Artifact stores.
//!
//! Compile output lands in an [`ArtifactStore`] chosen once when the
//! orchestrator is constructed. Development uses a shared in-memory store so
//! the asset middleware can serve bundles without touching disk; production
//! writes to the build directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Destination for compiled artifacts.
///
/// Keys are paths relative to the store root, normalized before lookup so
/// `server/../a.js` and `a.js` address the same artifact.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn write(&self, path: &Path, contents: Vec<u8>) -> Result<()>;

    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    async fn exists(&self, path: &Path) -> bool;
}

fn normalize(path: &Path) -> PathBuf {
    path.clean()
}

/// In-memory store backing the development pipeline. Never evicts; bounded
/// only by the hash-free development filename defaults.
#[derive(Default)]
pub struct MemoryStore {
    files: RwLock<FxHashMap<PathBuf, Arc<Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn write(&self, path: &Path, contents: Vec<u8>) -> Result<()> {
        self.files
            .write()
            .insert(normalize(path), Arc::new(contents));
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .read()
            .get(&normalize(path))
            .map(|c| c.as_ref().clone())
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.read().contains_key(&normalize(path))
    }
}

/// Disk-backed store rooted at the build output directory.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        self.root.join(normalize(path))
    }
}

#[async_trait]
impl ArtifactStore for DiskStore {
    async fn write(&self, path: &Path, contents: Vec<u8>) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, contents).await?;
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let full = self.full_path(path);
        match tokio::fs::read(&full).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(self.full_path(path))
            .await
            .unwrap_or(false)
    }
}
