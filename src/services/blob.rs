// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Selfie blob storage.

use crate::error::AppError;
use async_trait::async_trait;
use axum::body::Bytes;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Directory (and key prefix) that holds selfies.
pub const SELFIE_PREFIX: &str = "selfies";

/// Metadata needed to name and describe a stored blob.
#[derive(Debug, Clone)]
pub struct BlobMetadata {
    pub extension: &'static str,
    pub content_type: &'static str,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist the bytes under a fresh unique key and return that key.
    async fn store(&self, bytes: &[u8], metadata: &BlobMetadata) -> Result<String, AppError>;

    /// Remove a blob. Deleting a missing key is not an error.
    async fn delete(&self, path: &str) -> Result<(), AppError>;
}

fn new_blob_key(metadata: &BlobMetadata) -> String {
    format!(
        "{}/{}.{}",
        SELFIE_PREFIX,
        uuid::Uuid::new_v4(),
        metadata.extension
    )
}

/// Stores blobs as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, bytes: &[u8], metadata: &BlobMetadata) -> Result<String, AppError> {
        let key = new_blob_key(metadata);
        let path = self.root.join(&key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create selfie directory: {}", e))
            })?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to write selfie: {}", e)))?;

        tracing::debug!(path = %key, size = bytes.len(), "Stored selfie");
        Ok(key)
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(anyhow::anyhow!(
                "Failed to delete selfie {}: {}",
                path,
                e
            ))),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Bytes,
    content_type: &'static str,
}

/// In-memory blob store for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<DashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.blobs.len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.contains_key(path)
    }

    /// Content type recorded for a stored blob.
    pub fn content_type(&self, path: &str) -> Option<&'static str> {
        self.blobs.get(path).map(|blob| blob.content_type)
    }

    pub fn len_of(&self, path: &str) -> Option<usize> {
        self.blobs.get(path).map(|blob| blob.bytes.len())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, bytes: &[u8], metadata: &BlobMetadata) -> Result<String, AppError> {
        let key = new_blob_key(metadata);
        self.blobs.insert(
            key.clone(),
            StoredBlob {
                bytes: Bytes::copy_from_slice(bytes),
                content_type: metadata.content_type,
            },
        );
        Ok(key)
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        self.blobs.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG: BlobMetadata = BlobMetadata {
        extension: "jpg",
        content_type: "image/jpeg",
    };

    #[tokio::test]
    async fn local_store_writes_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let store = LocalBlobStore::new(root);

        let key = store.store(b"\xFF\xD8\xFFdata", &JPEG).await.unwrap();
        assert!(key.starts_with("selfies/"));
        assert!(key.ends_with(".jpg"));

        let written = tokio::fs::read(root.join(&key)).await.unwrap();
        assert_eq!(written, b"\xFF\xD8\xFFdata");

        store.delete(&key).await.unwrap();
        assert!(!root.join(&key).exists());

        // Second delete is a no-op
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn keys_are_unique() {
        let store = MemoryBlobStore::new();
        let a = store.store(b"a", &JPEG).await.unwrap();
        let b = store.store(b"a", &JPEG).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(store.count(), 2);
        assert_eq!(store.content_type(&a), Some("image/jpeg"));
        assert_eq!(store.len_of(&a), Some(1));

        store.delete(&a).await.unwrap();
        assert!(!store.contains(&a));
        assert!(store.contains(&b));
    }
}
