//! Blob storage for uploaded media.
//!
//! Image, gallery, video, and slideshow payloads only hold URLs. The blob
//! store turns uploaded bytes into those URLs. Paths are always relative to
//! the store root and may not climb out of it.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};

/// One stored object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobEntry {
    /// Path relative to the store root, `/`-separated.
    pub path: String,
    pub size: u64,
    pub url: String,
}

/// Media object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`, replacing any existing object. Returns the
    /// public URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> StoreResult<String>;

    /// Objects under `prefix` (a directory path, empty for everything), sorted
    /// by path.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobEntry>>;

    /// Public URL for a path, whether or not it exists.
    fn public_url(&self, path: &str) -> StoreResult<String>;
}

/// Normalize a relative object path: strip leading `/`, drop `.`, reject `..`.
pub fn normalize_path(path: &str) -> StoreResult<String> {
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(part) => parts.push(part),
                None => return Err(StoreError::InvalidPath(path.to_string())),
            },
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir => return Err(StoreError::PathEscapesRoot(path.to_string())),
            Component::Prefix(_) => return Err(StoreError::InvalidPath(path.to_string())),
        }
    }
    Ok(parts.join("/"))
}

fn object_path(path: &str) -> StoreResult<String> {
    let normalized = normalize_path(path)?;
    if normalized.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(normalized)
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Blob store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    /// Create a store rooted at `root`, serving from `base_url`.
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> StoreResult<String> {
        let rel = object_path(path)?;
        let full = self.root.join(&rel);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, &bytes).await?;
        tracing::debug!(path = %rel, bytes = bytes.len(), "blob uploaded");
        Ok(join_url(&self.base_url, &rel))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobEntry>> {
        let prefix = normalize_path(prefix)?;
        let start = self.root.join(&prefix);
        if !tokio::fs::try_exists(&start).await? {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                let Ok(rel) = entry.path().strip_prefix(&self.root).map(Path::to_path_buf) else {
                    continue;
                };
                let rel: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                let rel = rel.join("/");
                let size = entry.metadata().await?.len();
                entries.push(BlobEntry {
                    url: join_url(&self.base_url, &rel),
                    path: rel,
                    size,
                });
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn public_url(&self, path: &str) -> StoreResult<String> {
        Ok(join_url(&self.base_url, &object_path(path)?))
    }
}

/// In-memory blob store for tests.
#[derive(Debug)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    base_url: String,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            base_url: base_url.into(),
        }
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let path = normalize_path(path).ok()?;
        self.objects.read().get(&path).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> StoreResult<String> {
        let rel = object_path(path)?;
        self.objects.write().insert(rel.clone(), bytes);
        Ok(join_url(&self.base_url, &rel))
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<BlobEntry>> {
        let prefix = normalize_path(prefix)?;
        Ok(self
            .objects
            .read()
            .iter()
            .filter(|(path, _)| under_prefix(path, &prefix))
            .map(|(path, bytes)| BlobEntry {
                path: path.clone(),
                size: bytes.len() as u64,
                url: join_url(&self.base_url, path),
            })
            .collect())
    }

    fn public_url(&self, path: &str) -> StoreResult<String> {
        Ok(join_url(&self.base_url, &object_path(path)?))
    }
}
