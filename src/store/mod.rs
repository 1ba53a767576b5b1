//! Storage collaborators: blob store and key-value store.
//!
//! The pipeline only talks to the two traits below. [`local`] backs them
//! with a directory on disk (used by the CLI); [`memory`] keeps everything
//! in-process (tests, embedding).
//!
//! Both traits are object-safe and `Send + Sync` so they can be shared as
//! `Arc<dyn …>` between the analysis pipeline and the wipe coordinator.

pub mod local;
pub mod memory;

use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A named binary payload: the uploaded résumé or its preview image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl BlobFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// File name without its final extension (`"cv.v2.pdf"` → `"cv.v2"`).
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(i) if i > 0 => &self.name[..i],
            _ => &self.name,
        }
    }
}

/// Handle returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedBlob {
    pub path: String,
}

/// One stored blob as reported by a directory listing.
///
/// Recomputed on every listing; never cached beyond a wipe session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsItem {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
}

/// Path-addressed binary storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `files`; returns the handle of the first stored file, or
    /// `None` when the store accepted nothing.
    async fn upload(&self, files: &[BlobFile]) -> Result<Option<UploadedBlob>, ServiceError>;

    /// Read a blob; `None` if nothing is stored at `path`.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, ServiceError>;

    /// Delete one blob. Failures are per call.
    async fn delete(&self, path: &str) -> Result<(), ServiceError>;

    /// List the blobs directly under `path`.
    async fn read_dir(&self, path: &str) -> Result<Vec<FsItem>, ServiceError>;
}

/// String-keyed storage of JSON blobs.
///
/// Individual `get`/`set` calls are atomic per key; there are no
/// cross-key transactions.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), ServiceError>;

    async fn delete(&self, key: &str) -> Result<(), ServiceError>;

    /// Keys starting with `prefix`, in ascending order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ServiceError>;

    /// Remove every key in the namespace.
    async fn flush(&self) -> Result<(), ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_strips_last_extension() {
        assert_eq!(BlobFile::new("resume.pdf", vec![]).stem(), "resume");
        assert_eq!(BlobFile::new("cv.v2.pdf", vec![]).stem(), "cv.v2");
        assert_eq!(BlobFile::new("README", vec![]).stem(), "README");
        assert_eq!(BlobFile::new(".hidden", vec![]).stem(), ".hidden");
    }
}
