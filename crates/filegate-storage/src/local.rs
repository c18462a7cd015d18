use crate::range::{content_range, ByteRange};
use crate::traits::{ByteStream, ContentStore, ObjectResponse, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use filegate_core::presigned::{self, PresignedQuery};
use filegate_core::AppError;
use hmac::{Hmac, Mac};
use futures::StreamExt;
use sha2::Sha256;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Algorithm name written into locally signed queries.
pub const LOCAL_SIGNING_ALGORITHM: &str = "FILEGATE-HMAC-SHA256";
const LOCAL_CREDENTIAL: &str = "local";

/// Local filesystem content store
///
/// Objects live under `base_path` at their key. Presigned queries use the
/// same `X-Amz-*` field names as S3 but are signed with an HMAC-SHA256 over
/// the method, the key and the unsigned fields.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    signing_key: Vec<u8>,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/filegate")
    /// * `signing_key` - Secret used to sign presigned queries
    pub async fn new(base_path: impl Into<PathBuf>, signing_key: impl Into<Vec<u8>>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            signing_key: signing_key.into(),
        })
    }

    /// Convert storage key to filesystem path, refusing anything that could
    /// escape the base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty()
            || storage_key.contains("..")
            || storage_key.starts_with('/')
            || storage_key.contains('\\')
        {
            return Err(StorageError::InvalidKey(format!(
                "Storage key contains invalid characters: {}",
                storage_key
            )));
        }

        let path = self.base_path.join(storage_key);
        if path.strip_prefix(&self.base_path).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Size and modification time, so reads never hash the object.
    fn etag_for(meta: &std::fs::Metadata) -> String {
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        format!("\"{:x}-{:x}\"", meta.len(), modified)
    }

    /// Sibling path the new content is written to before it replaces the
    /// object. Dot-prefixed so listings skip it.
    fn temp_path_for(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
    }

    fn mac_for(&self, path: &str, query: &PresignedQuery) -> StorageResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| StorageError::ConfigError(format!("invalid signing key: {}", e)))?;
        mac.update(b"GET\n");
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(presigned::canonical_unsigned(query).as_bytes());
        Ok(mac)
    }

    fn verify_signature(&self, path: &str, query: &PresignedQuery) -> StorageResult<()> {
        if query.algorithm != LOCAL_SIGNING_ALGORITHM {
            return Err(StorageError::Forbidden(format!(
                "unsupported signing algorithm {}",
                query.algorithm
            )));
        }
        let provided = hex::decode(&query.signature)
            .map_err(|_| StorageError::Forbidden("malformed signature".to_string()))?;
        self.mac_for(path, query)?
            .verify_slice(&provided)
            .map_err(|_| StorageError::Forbidden("signature does not match".to_string()))
    }

    async fn open_object(&self, storage_key: &str) -> StorageResult<(fs::File, std::fs::Metadata)> {
        let path = self.key_to_path(storage_key)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(storage_key.to_string()));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let meta = file.metadata().await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to stat file {}: {}", path.display(), e))
        })?;

        Ok((file, meta))
    }
}

/// Removes a temporary file that never made it into place.
struct TempFile {
    path: PathBuf,
    keep: bool,
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[async_trait]
impl ContentStore for LocalStorage {
    async fn put_file(
        &self,
        content: Bytes,
        storage_key: &str,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let size = content.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        // Written beside the object and renamed over it, so the old content
        // survives a failed or cancelled write.
        let mut temp = TempFile {
            path: Self::temp_path_for(&path),
            keep: false,
        };

        let mut file = fs::File::create(&temp.path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", temp.path.display(), e))
        })?;

        file.write_all(&content).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", temp.path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", temp.path.display(), e))
        })?;
        drop(file);

        fs::rename(&temp.path, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to move file into {}: {}", path.display(), e))
        })?;
        temp.keep = true;

        let meta = fs::metadata(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to stat file {}: {}", path.display(), e))
        })?;
        let etag = Self::etag_for(&meta);

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(etag)
    }

    async fn get_file(
        &self,
        storage_key: &str,
        range: Option<&ByteRange>,
    ) -> StorageResult<ObjectResponse> {
        let start = std::time::Instant::now();
        let (mut file, meta) = self.open_object(storage_key).await?;
        let size = meta.len();
        let etag = Self::etag_for(&meta);

        let (status, first, content_length, extra_headers) = match range {
            Some(range) => {
                let (first, last) = range.resolve(size)?;
                (
                    206,
                    first,
                    last - first + 1,
                    vec![
                        ("Content-Range".to_string(), content_range(first, last, size)),
                        ("Accept-Ranges".to_string(), "bytes".to_string()),
                    ],
                )
            }
            None => (
                200,
                0,
                size,
                vec![("Accept-Ranges".to_string(), "bytes".to_string())],
            ),
        };

        if first > 0 {
            file.seek(SeekFrom::Start(first)).await.map_err(|e| {
                StorageError::DownloadFailed(format!("Failed to seek {}: {}", storage_key, e))
            })?;
        }

        let stream: ByteStream = Box::pin(ReaderStream::new(file.take(content_length)).map(|chunk| {
            chunk.map_err(|e| StorageError::DownloadFailed(format!("Failed to read chunk: {}", e)))
        }));

        tracing::debug!(
            key = %storage_key,
            size_bytes = size,
            status = status,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage read"
        );

        Ok(ObjectResponse {
            status,
            body: stream,
            content_length,
            etag,
            extra_headers,
        })
    }

    async fn create_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.key_to_path(storage_key)?;

        let mut query = PresignedQuery {
            algorithm: LOCAL_SIGNING_ALGORITHM.to_string(),
            credential: LOCAL_CREDENTIAL.to_string(),
            date: presigned::format_date(Utc::now()),
            expires: expires_in.as_secs().to_string(),
            signed_headers: "host".to_string(),
            ..Default::default()
        };
        query.signature = hex::encode(self.mac_for(storage_key, &query)?.finalize().into_bytes());

        Ok(query.to_query_string())
    }

    async fn get_file_with_presigned_url(
        &self,
        storage_key: &str,
        query: &PresignedQuery,
        range: Option<&ByteRange>,
    ) -> StorageResult<ObjectResponse> {
        self.verify_signature(storage_key, query)?;

        match query.remaining_secs(Utc::now()) {
            Ok(_) => {}
            Err(AppError::SignatureExpired) => return Err(StorageError::Expired),
            Err(e) => return Err(StorageError::Forbidden(e.to_string())),
        }

        self.get_file(storage_key, range).await
    }

    async fn delete_file(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn list_files(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| {
                StorageError::ListFailed(format!("Failed to read {}: {}", dir.display(), e))
            })?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(&self.base_path) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    async fn storage() -> (TempDir, LocalStorage) {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), b"test-secret".to_vec())
            .await
            .unwrap();
        (dir, storage)
    }

    async fn collect(response: ObjectResponse) -> Vec<u8> {
        let chunks: Vec<Bytes> = response.body.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_dir, storage) = storage().await;
        let etag = storage
            .put_file(Bytes::from_static(b"hello world!"), "default/abc", "text/plain")
            .await
            .unwrap();

        let response = storage.get_file("default/abc", None).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.etag, etag);
        assert_eq!(response.content_length, 12);
        assert_eq!(collect(response).await, b"hello world!");
    }

    #[tokio::test]
    async fn test_cancelled_overwrite_keeps_previous_content() {
        let (dir, storage) = storage().await;
        storage
            .put_file(Bytes::from_static(b"old content"), "b/f", "text/plain")
            .await
            .unwrap();

        let large = Bytes::from(vec![7u8; 64 * 1024 * 1024]);
        let outcome = tokio::time::timeout(
            Duration::from_millis(5),
            storage.put_file(large.clone(), "b/f", "application/octet-stream"),
        )
        .await;

        let on_disk = std::fs::read(dir.path().join("b/f")).unwrap();
        match outcome {
            Err(_) => assert_eq!(on_disk, b"old content"),
            Ok(result) => {
                result.unwrap();
                assert_eq!(on_disk.len(), large.len());
            }
        }
        assert_eq!(storage.list_files().await.unwrap(), vec!["b/f"]);
    }

    #[tokio::test]
    async fn test_overwrite_changes_etag() {
        let (_dir, storage) = storage().await;
        let first = storage
            .put_file(Bytes::from_static(b"one"), "b/f", "text/plain")
            .await
            .unwrap();
        let second = storage
            .put_file(Bytes::from_static(b"three"), "b/f", "text/plain")
            .await
            .unwrap();

        assert_ne!(first, second);
        let response = storage.get_file("b/f", None).await.unwrap();
        assert_eq!(response.etag, second);
        assert_eq!(collect(response).await, b"three");
    }

    #[tokio::test]
    async fn test_get_suffix_range_streams_tail() {
        let (_dir, storage) = storage().await;
        storage
            .put_file(Bytes::from_static(b"0123456789"), "b/f", "text/plain")
            .await
            .unwrap();

        let response = storage
            .get_file("b/f", Some(&ByteRange::Suffix(3)))
            .await
            .unwrap();
        assert_eq!(response.status, 206);
        assert_eq!(response.content_length, 3);
        assert_eq!(collect(response).await, b"789");
    }

    #[tokio::test]
    async fn test_get_range() {
        let (_dir, storage) = storage().await;
        storage
            .put_file(Bytes::from_static(b"0123456789"), "b/f", "text/plain")
            .await
            .unwrap();

        let response = storage
            .get_file("b/f", Some(&ByteRange::FromTo(2, 4)))
            .await
            .unwrap();
        assert_eq!(response.status, 206);
        assert!(response
            .extra_headers
            .contains(&("Content-Range".to_string(), "bytes 2-4/10".to_string())));
        assert_eq!(collect(response).await, b"234");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let (_dir, storage) = storage().await;
        let err = storage.get_file("b/missing", None).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let (_dir, storage) = storage().await;
        for key in ["../etc/passwd", "/abs", "a/../../b"] {
            let err = storage
                .put_file(Bytes::from_static(b"x"), key, "text/plain")
                .await
                .unwrap_err();
            assert!(matches!(err, StorageError::InvalidKey(_)));
        }
    }

    #[tokio::test]
    async fn test_presigned_round_trip() {
        let (_dir, storage) = storage().await;
        storage
            .put_file(Bytes::from_static(b"signed"), "b/f", "text/plain")
            .await
            .unwrap();

        let raw = storage
            .create_presigned_url("b/f", Duration::from_secs(60))
            .await
            .unwrap();
        let query = PresignedQuery::parse(&raw).unwrap();
        let remaining = query.remaining_secs(Utc::now()).unwrap();
        assert!(remaining > 55 && remaining <= 60);

        let response = storage
            .get_file_with_presigned_url("b/f", &query, None)
            .await
            .unwrap();
        assert_eq!(collect(response).await, b"signed");
    }

    #[tokio::test]
    async fn test_presigned_signature_bound_to_key() {
        let (_dir, storage) = storage().await;
        storage
            .put_file(Bytes::from_static(b"other"), "b/g", "text/plain")
            .await
            .unwrap();
        let raw = storage
            .create_presigned_url("b/f", Duration::from_secs(60))
            .await
            .unwrap();
        let query = PresignedQuery::parse(&raw).unwrap();

        let err = storage
            .get_file_with_presigned_url("b/g", &query, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_presigned_tampered_expiry_rejected() {
        let (_dir, storage) = storage().await;
        let raw = storage
            .create_presigned_url("b/f", Duration::from_secs(60))
            .await
            .unwrap();
        let mut query = PresignedQuery::parse(&raw).unwrap();
        query.expires = "999999".to_string();

        let err = storage
            .get_file_with_presigned_url("b/f", &query, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (_dir, storage) = storage().await;
        for key in ["b1/x", "b1/y", "b2/z"] {
            storage
                .put_file(Bytes::from_static(b"x"), key, "text/plain")
                .await
                .unwrap();
        }
        assert_eq!(storage.list_files().await.unwrap(), vec!["b1/x", "b1/y", "b2/z"]);

        storage.delete_file("b1/y").await.unwrap();
        storage.delete_file("b1/y").await.unwrap();
        assert_eq!(storage.list_files().await.unwrap(), vec!["b1/x", "b2/z"]);
    }
}
