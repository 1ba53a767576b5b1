//! In-process stores. Nothing survives the process; useful for tests and
//! for embedding the pipeline where persistence is handled elsewhere.

use super::{BlobFile, BlobStore, FsItem, KeyValueStore, UploadedBlob};
use crate::error::ServiceError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

fn poisoned() -> ServiceError {
    ServiceError::Backend("store lock poisoned".into())
}

/// Blob store backed by a map of path → bytes.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, files: &[BlobFile]) -> Result<Option<UploadedBlob>, ServiceError> {
        let mut blobs = self.blobs.lock().map_err(|_| poisoned())?;
        let mut first = None;
        for file in files {
            let mut path = file.name.clone();
            let mut n = 1;
            while blobs.contains_key(&path) {
                path = format!("{n}-{}", file.name);
                n += 1;
            }
            blobs.insert(path.clone(), file.data.clone());
            first.get_or_insert(UploadedBlob { path });
        }
        Ok(first)
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, ServiceError> {
        let blobs = self.blobs.lock().map_err(|_| poisoned())?;
        Ok(blobs.get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<(), ServiceError> {
        let mut blobs = self.blobs.lock().map_err(|_| poisoned())?;
        blobs
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(path.to_string()))
    }

    async fn read_dir(&self, _path: &str) -> Result<Vec<FsItem>, ServiceError> {
        let blobs = self.blobs.lock().map_err(|_| poisoned())?;
        Ok(blobs
            .iter()
            .map(|(path, data)| FsItem {
                id: path.clone(),
                name: path.clone(),
                path: path.clone(),
                size: data.len() as u64,
            })
            .collect())
    }
}

/// Key-value store backed by an ordered map.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn flush(&self) -> Result<(), ServiceError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blob_round_trip_and_listing() {
        let store = MemoryBlobStore::new();
        let a = store
            .upload(&[BlobFile::new("cv.pdf", b"one".to_vec())])
            .await
            .unwrap()
            .unwrap();
        let b = store
            .upload(&[BlobFile::new("cv.pdf", b"two".to_vec())])
            .await
            .unwrap()
            .unwrap();
        assert_ne!(a.path, b.path);
        assert_eq!(store.read(&b.path).await.unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(store.read_dir("./").await.unwrap().len(), 2);

        store.delete(&a.path).await.unwrap();
        assert!(store.delete(&a.path).await.is_err());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn kv_flush_clears_everything() {
        let kv = MemoryKeyValueStore::new();
        kv.set("resume:a", "1").await.unwrap();
        kv.set("resume:b", "2").await.unwrap();
        assert_eq!(kv.list("resume:").await.unwrap().len(), 2);
        kv.flush().await.unwrap();
        assert_eq!(kv.get("resume:a").await.unwrap(), None);
    }
}
