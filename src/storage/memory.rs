//! In-memory blob container.
//!
//! Blobs live in a `tokio::sync::RwLock<BTreeMap<...>>` for the lifetime of
//! the process.  Listing order is lexicographic, like Azure's.  Useful for
//! local development and for exercising the HTTP layer in tests.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::container::{blob_url, BlobContainer, BlobError, BlobFuture};

/// A stored blob and its content type.
#[derive(Debug, Clone)]
pub struct MemoryBlob {
    pub data: Bytes,
    pub content_type: String,
}

/// Process-local implementation of [`BlobContainer`].
pub struct MemoryBlobContainer {
    /// Container name used in public URLs.
    container: String,
    /// Endpoint used in public URLs.
    endpoint: String,
    /// Whether `ensure_container()` has run.
    created: AtomicBool,
    /// blob name -> blob.
    blobs: tokio::sync::RwLock<BTreeMap<String, MemoryBlob>>,
}

impl MemoryBlobContainer {
    /// Create an empty container that renders URLs under `endpoint`.
    pub fn new(endpoint: &str, container: &str) -> Self {
        Self {
            container: container.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            created: AtomicBool::new(false),
            blobs: tokio::sync::RwLock::new(BTreeMap::new()),
        }
    }

    /// Fetch a blob by name.
    pub async fn get(&self, blob_name: &str) -> Option<MemoryBlob> {
        self.blobs.read().await.get(blob_name).cloned()
    }
}

impl BlobContainer for MemoryBlobContainer {
    fn name(&self) -> &str {
        &self.container
    }

    fn public_url(&self, blob_name: &str) -> String {
        blob_url(&self.endpoint, &self.container, blob_name)
    }

    fn ensure_container(&self) -> BlobFuture<'_, bool> {
        Box::pin(async move {
            let created = !self.created.swap(true, Ordering::SeqCst);
            if created {
                tracing::info!("Container '{}' created successfully.", self.container);
            }
            Ok(created)
        })
    }

    fn list_blobs(&self) -> BlobFuture<'_, Vec<String>> {
        Box::pin(async move { Ok(self.blobs.read().await.keys().cloned().collect()) })
    }

    fn upload(&self, blob_name: &str, data: Bytes, content_type: &str) -> BlobFuture<'_, ()> {
        let blob_name = blob_name.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            self.blobs
                .write()
                .await
                .insert(blob_name, MemoryBlob { data, content_type });
            Ok(())
        })
    }

    fn delete(&self, blob_name: &str) -> BlobFuture<'_, ()> {
        let blob_name = blob_name.to_string();
        Box::pin(async move {
            match self.blobs.write().await.remove(&blob_name) {
                Some(_) => Ok(()),
                None => Err(BlobError::NotFound { name: blob_name }),
            }
        })
    }
}
