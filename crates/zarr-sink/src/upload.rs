//! Upload of a finished store to S3-compatible object storage.
//!
//! The store is written to the local cache first and then copied out
//! file by file. Credentials arrive in an explicit config struct handed to
//! the client at construction; nothing reads or mutates the process
//! environment.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use object_store::{aws::AmazonS3Builder, path::Path as StorePath, ObjectStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SinkError};

/// Configuration for the object-storage destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3-compatible endpoint URL.
    pub endpoint: String,
    /// Bucket name.
    pub bucket: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Region (any value works for non-AWS endpoints).
    pub region: String,
    /// Allow plain HTTP endpoints.
    pub allow_http: bool,
}

/// Object storage client for finished stores.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create a client from explicit credentials.
    pub fn new(config: &ObjectStorageConfig) -> Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_region(&config.region);

        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| SinkError::Upload(format!("failed to create S3 client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// Write bytes to a path in the bucket.
    pub async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let location = StorePath::from(path);
        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| SinkError::Upload(format!("failed to write {path}: {e}")))?;
        Ok(())
    }

    /// Bucket this client writes into.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Upload a local store directory under a prefix in object storage.
///
/// Walks the directory and puts every file, preserving relative paths.
/// Returns the total bytes uploaded.
pub async fn upload_store(
    storage: &ObjectStorage,
    local_path: &Path,
    prefix: &str,
) -> Result<u64> {
    let mut total = 0u64;

    for entry in walkdir::WalkDir::new(local_path) {
        let entry = entry.map_err(|e| SinkError::Upload(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(local_path)
            .map_err(|e| SinkError::Upload(e.to_string()))?;
        let target = format!("{}/{}", prefix.trim_end_matches('/'), relative.display());

        let data = tokio::fs::read(entry.path()).await?;
        total += data.len() as u64;
        storage.put(&target, Bytes::from(data)).await?;
        debug!(path = %target, "uploaded store file");
    }

    info!(
        bucket = storage.bucket(),
        prefix,
        bytes = total,
        "store upload complete"
    );
    Ok(total)
}
