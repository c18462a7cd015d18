use crate::range::{content_range, ByteRange};
use crate::traits::{ByteStream, ContentStore, ObjectResponse, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use filegate_core::PresignedQuery;
use futures::{StreamExt, TryStreamExt};
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::time::Duration;

/// S3 content store
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    http: reqwest::Client,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http)
                .with_virtual_hosted_style_request(false);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            http,
            bucket,
            region,
            endpoint_url,
        })
    }

    /// Object URL without query. Path-style for custom endpoints, virtual-hosted for AWS.
    fn object_url(&self, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            )
        }
    }

    fn map_read_error(&self, storage_key: &str, err: ObjectStoreError) -> StorageError {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %storage_key,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        }
    }
}

#[async_trait]
impl ContentStore for S3Storage {
    async fn put_file(
        &self,
        content: bytes::Bytes,
        storage_key: &str,
        _content_type: &str,
    ) -> StorageResult<String> {
        let size = content.len() as u64;
        let location = Path::from(storage_key.to_string());
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.put(&location, PutPayload::from(content)).await;

        let put = result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(put.e_tag.unwrap_or_default())
    }

    async fn get_file(
        &self,
        storage_key: &str,
        range: Option<&ByteRange>,
    ) -> StorageResult<ObjectResponse> {
        let location = Path::from(storage_key.to_string());

        match range {
            None => {
                let result = self
                    .store
                    .get(&location)
                    .await
                    .map_err(|e| self.map_read_error(storage_key, e))?;

                let etag = result.meta.e_tag.clone().unwrap_or_default();
                let content_length = result.meta.size;
                let key = storage_key.to_string();
                let body: ByteStream = Box::pin(result.into_stream().map(move |res| {
                    res.map_err(|e| {
                        tracing::error!(key = %key, error = %e, "S3 stream download error");
                        StorageError::DownloadFailed(e.to_string())
                    })
                }));

                Ok(ObjectResponse {
                    status: 200,
                    body,
                    content_length,
                    etag,
                    extra_headers: vec![("Accept-Ranges".to_string(), "bytes".to_string())],
                })
            }
            Some(range) => {
                let meta = self
                    .store
                    .head(&location)
                    .await
                    .map_err(|e| self.map_read_error(storage_key, e))?;
                let (first, last) = range.resolve(meta.size)?;

                let bytes = self
                    .store
                    .get_range(&location, first..last + 1)
                    .await
                    .map_err(|e| self.map_read_error(storage_key, e))?;

                let content_length = bytes.len() as u64;
                let body: ByteStream = Box::pin(futures::stream::once(async move { Ok::<_, StorageError>(bytes) }));

                Ok(ObjectResponse {
                    status: 206,
                    body,
                    content_length,
                    etag: meta.e_tag.unwrap_or_default(),
                    extra_headers: vec![
                        (
                            "Content-Range".to_string(),
                            content_range(first, last, meta.size),
                        ),
                        ("Accept-Ranges".to_string(), "bytes".to_string()),
                    ],
                })
            }
        }
    }

    async fn create_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let location = Path::from(storage_key.to_string());
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result.map_err(|e| StorageError::BackendError(e.to_string()))?;

        Ok(url.query().unwrap_or_default().to_string())
    }

    async fn get_file_with_presigned_url(
        &self,
        storage_key: &str,
        query: &PresignedQuery,
        range: Option<&ByteRange>,
    ) -> StorageResult<ObjectResponse> {
        let url = format!("{}?{}", self.object_url(storage_key), query.to_query_string());

        let mut request = self.http.get(&url);
        if let Some(range) = range {
            request = request.header(http::header::RANGE, range.to_header());
        }

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        let status = response.status().as_u16();
        match status {
            200 | 206 => {}
            403 => {
                return Err(StorageError::Forbidden(
                    "presigned request rejected by storage".to_string(),
                ))
            }
            404 => return Err(StorageError::NotFound(storage_key.to_string())),
            416 => return Err(StorageError::RangeNotSatisfiable(storage_key.to_string())),
            other => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    status = other,
                    key = %storage_key,
                    body = %body,
                    "Unexpected status from presigned S3 request"
                );
                return Err(StorageError::DownloadFailed(format!(
                    "unexpected status {} from storage",
                    other
                )));
            }
        }

        let header = |name: http::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let etag = header(http::header::ETAG).unwrap_or_default();
        let content_length = header(http::header::CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        let mut extra_headers = vec![("Accept-Ranges".to_string(), "bytes".to_string())];
        if let Some(content_range) = header(http::header::CONTENT_RANGE) {
            extra_headers.push(("Content-Range".to_string(), content_range));
        }

        let body: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map_err(|e| StorageError::DownloadFailed(e.to_string())),
        );

        Ok(ObjectResponse {
            status,
            body,
            content_length,
            etag,
            extra_headers,
        })
    }

    async fn delete_file(&self, storage_key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());

        let result: ObjectResult<_> = self.store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn list_files(&self) -> StorageResult<Vec<String>> {
        let keys: Vec<String> = self
            .store
            .list(None)
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?;

        tracing::debug!(bucket = %self.bucket, count = keys.len(), "S3 list complete");

        Ok(keys)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
