//! Gateway facade: one method per endpoint, composing the catalog, the
//! content store, conditional evaluation and the image pipeline.

use crate::reconcile::{InventoryReport, ReconcileService};
use crate::scanner::VirusScanner;
use crate::upload::{BatchFailure, FileUpload, UploadService};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use filegate_core::conditional::{
    evaluate, parse_last_modified, STATUS_NOT_MODIFIED, STATUS_OK, STATUS_PRECONDITION_FAILED,
};
use filegate_core::constants::ADMIN_SECRET_HEADER;
use filegate_core::{
    AppError, FileRecord, FileRequestParams, FileSummary, ForwardedHeaders, PresignedQuery,
};
use filegate_metadata::MetadataStore;
use filegate_processing::{derivative_options, DerivativeOptions, ImagePipeline};
use filegate_storage::keys::file_key;
use filegate_storage::{ByteRange, ByteStream, ContentStore, ObjectResponse, StorageError};
use futures::TryStreamExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use tokio_util::io::StreamReader;
use uuid::Uuid;

/// What the HTTP layer should send for a read.
pub struct RenderedFile {
    /// 200, 206, 304 or 412.
    pub status: u16,
    /// Present only for 200 and 206.
    pub body: Option<ByteStream>,
    pub content_length: u64,
    pub filename: String,
    pub mime_type: String,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub cache_control: String,
    pub extra_headers: Vec<(String, String)>,
}

impl RenderedFile {
    /// Collect the body, for callers that need the bytes in memory.
    pub async fn into_bytes(self) -> Result<Bytes, AppError> {
        let Some(body) = self.body else {
            return Ok(Bytes::new());
        };
        let chunks: Vec<Bytes> = body.try_collect().await.map_err(AppError::from)?;
        Ok(Bytes::from(chunks.concat()))
    }
}

impl std::fmt::Debug for RenderedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedFile")
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .field("content_length", &self.content_length)
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("etag", &self.etag)
            .field("last_modified", &self.last_modified)
            .field("cache_control", &self.cache_control)
            .field("extra_headers", &self.extra_headers)
            .finish()
    }
}

/// Response to a presigned URL request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresignedUrl {
    pub url: String,
    /// Validity in seconds.
    pub expiration: i64,
}

enum Access<'a> {
    Direct,
    Presigned(&'a PresignedQuery),
}

#[derive(Clone)]
pub struct FileService {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
    uploads: UploadService,
    reconcile: ReconcileService,
    pipeline: ImagePipeline,
    public_url: String,
    admin_secret: Option<String>,
}

impl FileService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        content: Arc<dyn ContentStore>,
        scanner: Option<Arc<dyn VirusScanner>>,
        pipeline: ImagePipeline,
        public_url: impl Into<String>,
        admin_secret: Option<String>,
    ) -> Self {
        Self {
            uploads: UploadService::new(metadata.clone(), content.clone(), scanner),
            reconcile: ReconcileService::new(metadata.clone(), content.clone()),
            metadata,
            content,
            pipeline,
            public_url: public_url.into(),
            admin_secret,
        }
    }

    /// Constant-time check of the admin secret.
    pub fn verify_admin(&self, provided: Option<&str>) -> Result<(), AppError> {
        let expected = self
            .admin_secret
            .as_deref()
            .ok_or_else(|| AppError::Forbidden("admin secret is not configured".to_string()))?;
        let provided = provided.unwrap_or_default();
        if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            Err(AppError::Forbidden("you are not authorized".to_string()))
        }
    }

    /// Catalog headers for requests authorized by a signature rather than a
    /// session.
    fn service_headers(&self, headers: &ForwardedHeaders) -> ForwardedHeaders {
        match self.admin_secret {
            Some(ref secret) if headers.get(ADMIN_SECRET_HEADER).is_none() => {
                headers.clone().with(ADMIN_SECRET_HEADER, secret.clone())
            }
            _ => headers.clone(),
        }
    }

    async fn uploaded_file(
        &self,
        file_id: &Uuid,
        headers: &ForwardedHeaders,
    ) -> Result<FileRecord, AppError> {
        let record = self.metadata.get_file_by_id(file_id, headers).await?;
        if !record.is_uploaded {
            return Err(AppError::Forbidden("file not uploaded".to_string()));
        }
        Ok(record)
    }

    async fn open(
        &self,
        key: &str,
        access: &Access<'_>,
        range: Option<&ByteRange>,
    ) -> Result<ObjectResponse, AppError> {
        let object = match access {
            Access::Direct => self.content.get_file(key, range).await,
            Access::Presigned(query) => {
                self.content
                    .get_file_with_presigned_url(key, query, range)
                    .await
            }
        };
        object.map_err(AppError::from)
    }

    /// Download a file, optionally as an image derivative.
    #[tracing::instrument(skip(self, params, range, accept, headers), fields(file_id = %file_id))]
    pub async fn get_file<P>(
        &self,
        file_id: &Uuid,
        params: &P,
        range: Option<&str>,
        accept: &[String],
        headers: &ForwardedHeaders,
    ) -> Result<RenderedFile, AppError>
    where
        P: FileRequestParams + ?Sized,
    {
        let record = self.uploaded_file(file_id, headers).await?;
        let bucket = self
            .metadata
            .get_bucket_by_id(&record.bucket_id, headers)
            .await?;
        self.serve(record, bucket.cache_control, params, range, accept, Access::Direct)
            .await
    }

    /// Headers for a file without its body.
    #[tracing::instrument(skip(self, params, accept, headers), fields(file_id = %file_id))]
    pub async fn get_file_metadata<P>(
        &self,
        file_id: &Uuid,
        params: &P,
        accept: &[String],
        headers: &ForwardedHeaders,
    ) -> Result<RenderedFile, AppError>
    where
        P: FileRequestParams + ?Sized,
    {
        let record = self.uploaded_file(file_id, headers).await?;
        let bucket = self
            .metadata
            .get_bucket_by_id(&record.bucket_id, headers)
            .await?;

        let opts = derivative_options(params, &record.mime_type, accept, self.pipeline.max_dimension())?;
        if !opts.is_empty() {
            // Derivative headers depend on the rendered bytes.
            let mut rendered = self
                .serve(record, bucket.cache_control, params, None, accept, Access::Direct)
                .await?;
            rendered.body = None;
            return Ok(rendered);
        }

        let last_modified = parse_last_modified(&record.updated_at)?;
        let status = evaluate(&record.etag, last_modified, &params.predicates(), STATUS_OK);

        Ok(RenderedFile {
            status,
            body: None,
            content_length: record.size.max(0) as u64,
            filename: record.name,
            mime_type: record.mime_type,
            etag: record.etag,
            last_modified,
            cache_control: bucket.cache_control,
            extra_headers: vec![("Accept-Ranges".to_string(), "bytes".to_string())],
        })
    }

    /// Issue a presigned download URL valid for the bucket's download
    /// expiration.
    #[tracing::instrument(skip(self, headers), fields(file_id = %file_id))]
    pub async fn create_presigned_url(
        &self,
        file_id: &Uuid,
        headers: &ForwardedHeaders,
    ) -> Result<PresignedUrl, AppError> {
        let record = self.uploaded_file(file_id, headers).await?;
        let bucket = self
            .metadata
            .get_bucket_by_id(&record.bucket_id, headers)
            .await?;

        if !bucket.presigned_urls_enabled {
            return Err(AppError::Forbidden(
                "presigned URLs are not enabled on this bucket".to_string(),
            ));
        }

        let ttl = bucket.download_expiration.max(1);
        let key = file_key(&bucket.id, file_id);
        let query = self
            .content
            .create_presigned_url(&key, Duration::from_secs(ttl as u64))
            .await?;

        let url = format!(
            "{}/v1/files/{}/presignedurl/contents?{}",
            self.public_url.trim_end_matches('/'),
            file_id,
            query
        );

        tracing::debug!(file_id = %file_id, expiration = ttl, "Presigned URL issued");

        Ok(PresignedUrl {
            url,
            expiration: ttl,
        })
    }

    /// Download through a presigned URL. `raw_query` is the full request
    /// query; only the signed fields are passed on to storage.
    #[tracing::instrument(skip(self, raw_query, params, range, accept, headers), fields(file_id = %file_id))]
    pub async fn get_file_with_presigned_url<P>(
        &self,
        file_id: &Uuid,
        raw_query: &str,
        params: &P,
        range: Option<&str>,
        accept: &[String],
        headers: &ForwardedHeaders,
    ) -> Result<RenderedFile, AppError>
    where
        P: FileRequestParams + ?Sized,
    {
        let query = PresignedQuery::parse(raw_query)?;
        let remaining = query.remaining_secs(Utc::now())?;

        let headers = self.service_headers(headers);
        let record = self.uploaded_file(file_id, &headers).await?;

        self.serve(
            record,
            format!("max-age={}", remaining),
            params,
            range,
            accept,
            Access::Presigned(&query),
        )
        .await
    }

    async fn serve<P>(
        &self,
        record: FileRecord,
        cache_control: String,
        params: &P,
        range: Option<&str>,
        accept: &[String],
        access: Access<'_>,
    ) -> Result<RenderedFile, AppError>
    where
        P: FileRequestParams + ?Sized,
    {
        let opts = derivative_options(params, &record.mime_type, accept, self.pipeline.max_dimension())?;
        let last_modified = parse_last_modified(&record.updated_at)?;
        let predicates = params.predicates();
        let key = file_key(&record.bucket_id, &record.id);

        if !opts.is_empty() {
            return self
                .serve_derivative(record, cache_control, last_modified, &opts, &key, &access, params)
                .await;
        }

        let range = range.map(ByteRange::parse).transpose()?;
        let status = evaluate(&record.etag, last_modified, &predicates, STATUS_OK);
        if status == STATUS_NOT_MODIFIED || status == STATUS_PRECONDITION_FAILED {
            if let Access::Presigned(_) = access {
                // Opening the object is what checks the signature.
                drop(self.open(&key, &access, None).await?);
            }
            return Ok(RenderedFile {
                status,
                body: None,
                content_length: 0,
                filename: record.name,
                mime_type: record.mime_type,
                etag: record.etag,
                last_modified,
                cache_control,
                extra_headers: Vec::new(),
            });
        }

        let object = self.open(&key, &access, range.as_ref()).await?;

        Ok(RenderedFile {
            status: object.status,
            body: Some(object.body),
            content_length: object.content_length,
            filename: record.name,
            mime_type: record.mime_type,
            etag: record.etag,
            last_modified,
            cache_control,
            extra_headers: object.extra_headers,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn serve_derivative<P>(
        &self,
        record: FileRecord,
        cache_control: String,
        last_modified: DateTime<Utc>,
        opts: &DerivativeOptions,
        key: &str,
        access: &Access<'_>,
        params: &P,
    ) -> Result<RenderedFile, AppError>
    where
        P: FileRequestParams + ?Sized,
    {
        let start = Instant::now();
        let object = self.open(key, access, None).await?;
        let source = StreamReader::new(
            object
                .body
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut output = Vec::new();
        self.pipeline
            .render(source, object.content_length, &mut output, opts)
            .await?;

        let etag = format!("\"{}\"", hex::encode(Sha256::digest(&output)));
        let status = evaluate(&etag, last_modified, &params.predicates(), STATUS_OK);
        let content_length = output.len() as u64;
        let mime_type = opts
            .target_mime()
            .map(str::to_string)
            .unwrap_or(record.mime_type);

        tracing::debug!(
            file_id = %record.id,
            status,
            size_bytes = content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Derivative served"
        );

        let body: Option<ByteStream> = (status == STATUS_OK).then(|| {
            let bytes = Bytes::from(output);
            Box::pin(futures::stream::once(async move { Ok::<_, StorageError>(bytes) })) as ByteStream
        });

        Ok(RenderedFile {
            status,
            body,
            content_length: if status == STATUS_OK { content_length } else { 0 },
            filename: record.name,
            mime_type,
            etag,
            last_modified,
            cache_control,
            extra_headers: Vec::new(),
        })
    }

    pub async fn upload_files(
        &self,
        bucket_id: &str,
        files: Vec<FileUpload>,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<FileRecord>, BatchFailure> {
        self.uploads.upload_files(bucket_id, files, headers).await
    }

    pub async fn replace_file(
        &self,
        file_id: &Uuid,
        upload: FileUpload,
        headers: &ForwardedHeaders,
    ) -> Result<FileRecord, AppError> {
        self.uploads.replace_file(file_id, upload, headers).await
    }

    /// Remove the catalog record, then the object. An object left behind by
    /// a failed content delete shows up as an orphan.
    #[tracing::instrument(skip(self, headers), fields(file_id = %file_id))]
    pub async fn delete_file(
        &self,
        file_id: &Uuid,
        headers: &ForwardedHeaders,
    ) -> Result<(), AppError> {
        let record = self.metadata.get_file_by_id(file_id, headers).await?;
        self.metadata.delete_file_by_id(file_id, headers).await?;

        let key = file_key(&record.bucket_id, file_id);
        match self.content.delete_file(&key).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => {
                tracing::debug!(file_id = %file_id, key = %key, "No content to delete");
            }
            Err(e) => {
                tracing::error!(
                    file_id = %file_id,
                    key = %key,
                    error = %e,
                    "Content delete failed after metadata removal"
                );
                return Err(e.into());
            }
        }

        tracing::info!(file_id = %file_id, bucket_id = %record.bucket_id, "File deleted");
        Ok(())
    }

    pub async fn inventory_report(
        &self,
        admin_secret: Option<&str>,
        headers: &ForwardedHeaders,
    ) -> Result<InventoryReport, AppError> {
        self.verify_admin(admin_secret)?;
        self.reconcile.report(&self.service_headers(headers)).await
    }

    pub async fn list_broken_metadata(
        &self,
        admin_secret: Option<&str>,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<FileSummary>, AppError> {
        self.verify_admin(admin_secret)?;
        self.reconcile
            .list_broken_metadata(&self.service_headers(headers))
            .await
    }

    pub async fn delete_broken_metadata(
        &self,
        admin_secret: Option<&str>,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<FileSummary>, AppError> {
        self.verify_admin(admin_secret)?;
        self.reconcile
            .delete_broken_metadata(&self.service_headers(headers))
            .await
    }

    pub async fn list_orphans(
        &self,
        admin_secret: Option<&str>,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<String>, AppError> {
        self.verify_admin(admin_secret)?;
        self.reconcile
            .list_orphans(&self.service_headers(headers))
            .await
    }

    pub async fn delete_orphans(
        &self,
        admin_secret: Option<&str>,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<String>, AppError> {
        self.verify_admin(admin_secret)?;
        self.reconcile
            .delete_orphans(&self.service_headers(headers))
            .await
    }

    pub async fn list_not_uploaded(
        &self,
        admin_secret: Option<&str>,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<FileSummary>, AppError> {
        self.verify_admin(admin_secret)?;
        self.reconcile
            .list_not_uploaded(&self.service_headers(headers))
            .await
    }
}
