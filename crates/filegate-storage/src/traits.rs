//! Content store abstraction
//!
//! This module defines the ContentStore trait that all storage backends must implement.

use crate::range::ByteRange;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use filegate_core::{AppError, PresignedQuery};
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Range not satisfiable: {0}")]
    RangeNotSatisfiable(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("signature already expired")]
    Expired,

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("file {} not found", key)),
            StorageError::InvalidRange(msg) => AppError::InvalidInput(msg),
            StorageError::RangeNotSatisfiable(msg) => AppError::RangeNotSatisfiable(msg),
            StorageError::Forbidden(msg) => AppError::Forbidden(msg),
            StorageError::Expired => AppError::SignatureExpired,
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Chunked object body. Dropping it closes the underlying reader.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// A readable object, possibly a byte range of it.
pub struct ObjectResponse {
    /// 200 for the whole object, 206 for a range.
    pub status: u16,
    pub body: ByteStream,
    /// Length of `body`, not of the whole object.
    pub content_length: u64,
    pub etag: String,
    /// Backend-provided headers to pass through (`Content-Range`, ...).
    pub extra_headers: Vec<(String, String)>,
}

impl std::fmt::Debug for ObjectResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("etag", &self.etag)
            .field("extra_headers", &self.extra_headers)
            .finish_non_exhaustive()
    }
}

/// Content store abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait.
/// Paths use the `{bucket_id}/{file_id}` layout from [`crate::keys`].
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `content` at `path`, replacing anything already there.
    /// Returns the new entity tag.
    async fn put_file(&self, content: Bytes, path: &str, content_type: &str)
        -> StorageResult<String>;

    /// Open the object at `path`, optionally restricted to a byte range.
    async fn get_file(&self, path: &str, range: Option<&ByteRange>)
        -> StorageResult<ObjectResponse>;

    /// Sign a GET for `path`. Returns only the query string.
    async fn create_presigned_url(&self, path: &str, expires_in: Duration)
        -> StorageResult<String>;

    /// Read through a previously issued presigned query. The signature is
    /// checked by the backend.
    async fn get_file_with_presigned_url(
        &self,
        path: &str,
        query: &PresignedQuery,
        range: Option<&ByteRange>,
    ) -> StorageResult<ObjectResponse>;

    async fn delete_file(&self, path: &str) -> StorageResult<()>;

    /// Every object path in the store.
    async fn list_files(&self) -> StorageResult<Vec<String>>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
