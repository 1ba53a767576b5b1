//! Filesystem-backed stores.
//!
//! ## Layout
//!
//! ```text
//! <data-dir>/
//!  ├─ files/        LocalBlobStore root (résumés + previews)
//!  └─ kv.json       FileKeyValueStore (one JSON object)
//! ```
//!
//! Every key-value mutation rewrites `kv.json` atomically (temp file +
//! rename) so a crash mid-write never leaves a half-written namespace.

use super::{BlobFile, BlobStore, FsItem, KeyValueStore, UploadedBlob};
use crate::error::ServiceError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Blob store rooted at a local directory.
#[derive(Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
    // Serialises name allocation so two uploads never pick the same file.
    upload_lock: Mutex<()>,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            upload_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a store path (`"resume.pdf"`, `"./"`) onto the root directory.
    fn resolve(&self, path: &str) -> Result<PathBuf, ServiceError> {
        let trimmed = path.trim_start_matches("./").trim_start_matches('/');
        let mut resolved = self.root.clone();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(ServiceError::InvalidPath(path.to_string())),
            }
        }
        Ok(resolved)
    }

    /// Pick a free file name, appending ` (n)` before the extension on clashes.
    async fn free_name(&self, name: &str) -> String {
        let (stem, ext) = match name.rfind('.') {
            Some(i) if i > 0 => (&name[..i], &name[i..]),
            _ => (name, ""),
        };
        let mut candidate = name.to_string();
        let mut n = 1;
        while tokio::fs::try_exists(self.root.join(&candidate))
            .await
            .unwrap_or(false)
        {
            candidate = format!("{stem} ({n}){ext}");
            n += 1;
        }
        candidate
    }
}

/// Keep only the final component of a client-supplied file name.
fn sanitize_name(name: &str) -> Result<&str, ServiceError> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ServiceError::InvalidPath(name.to_string()))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, files: &[BlobFile]) -> Result<Option<UploadedBlob>, ServiceError> {
        if files.is_empty() {
            return Ok(None);
        }
        let _guard = self.upload_lock.lock().await;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ServiceError::io(self.root.display(), e))?;

        let mut first = None;
        for file in files {
            let name = self.free_name(sanitize_name(&file.name)?).await;
            let target = self.root.join(&name);
            tokio::fs::write(&target, &file.data)
                .await
                .map_err(|e| ServiceError::io(target.display(), e))?;
            debug!("Stored {} ({} bytes)", name, file.data.len());
            first.get_or_insert(UploadedBlob { path: name });
        }
        Ok(first)
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, ServiceError> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ServiceError::io(path, e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), ServiceError> {
        let full = self.resolve(path)?;
        if full == self.root {
            return Err(ServiceError::InvalidPath(path.to_string()));
        }
        tokio::fs::remove_file(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ServiceError::NotFound(path.to_string())
            } else {
                ServiceError::io(path, e)
            }
        })
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<FsItem>, ServiceError> {
        let dir = self.resolve(path)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ServiceError::io(path, e)),
        };

        let prefix = dir
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut items = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ServiceError::io(path, e))?
        {
            let meta = entry
                .metadata()
                .await
                .map_err(|e| ServiceError::io(entry.path().display(), e))?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let rel = prefix.join(&name).to_string_lossy().to_string();
            items.push(FsItem {
                id: rel.clone(),
                name,
                path: rel,
                size: meta.len(),
            });
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}

/// Key-value store persisted as a single JSON object file.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, ServiceError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ServiceError::Backend(format!(
                    "key-value file '{}' is unreadable: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(ServiceError::io(self.path.display(), e)),
        }
    }

    /// Atomic write: temp file, then rename over the original.
    async fn save(&self, map: &BTreeMap<String, String>) -> Result<(), ServiceError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::io(parent.display(), e))?;
        }
        let raw = serde_json::to_string_pretty(map)
            .map_err(|e| ServiceError::Backend(format!("serialise key-value file: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| ServiceError::io(tmp.display(), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ServiceError::io(self.path.display(), e))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), value.to_string());
        self.save(&map).await
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        if map.remove(key).is_some() {
            self.save(&map).await?;
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .into_keys()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    async fn flush(&self) -> Result<(), ServiceError> {
        let _guard = self.lock.lock().await;
        self.save(&BTreeMap::new()).await
    }
}
