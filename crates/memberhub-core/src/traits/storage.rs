//! Blob storage trait for the bytes behind file nodes.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::result::AppResult;

/// Metadata about a stored blob.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlobMeta {
    /// Key within the storage provider.
    pub key: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modified timestamp.
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// A byte stream type used for reading blob contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Trait for blob storage backends.
///
/// Keys are relative, `/`-separated paths. File nodes store their content
/// under `<tenant schema>/documents/<node id>`.
#[async_trait]
pub trait StorageProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local").
    fn provider_type(&self) -> &str;

    /// Read a blob and return its byte stream.
    async fn read(&self, key: &str) -> AppResult<ByteStream>;

    /// Read a blob into memory.
    async fn read_bytes(&self, key: &str) -> AppResult<Bytes>;

    /// Write bytes under the given key, replacing any existing blob.
    async fn write(&self, key: &str, data: Bytes) -> AppResult<()>;

    /// Delete the blob under the given key. Missing blobs are not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Check whether a blob exists under the given key.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// List the blobs directly below a key prefix.
    async fn list(&self, prefix: &str) -> AppResult<Vec<BlobMeta>>;
}
