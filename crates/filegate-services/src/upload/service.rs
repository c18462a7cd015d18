use super::types::{BatchFailure, FileUpload};
use crate::content_type;
use crate::saga::Saga;
use crate::scanner::{ScanResult, VirusScanner};
use filegate_core::{
    AppError, BucketPolicy, FileRecord, FileUpdate, ForwardedHeaders, NewFile, VirusRecord,
};
use filegate_metadata::MetadataStore;
use filegate_storage::keys::file_key;
use filegate_storage::ContentStore;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Drives uploads through size checks, scanning, content storage and the
/// metadata catalog, compensating when content storage fails.
#[derive(Clone)]
pub struct UploadService {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
    scanner: Option<Arc<dyn VirusScanner>>,
}

impl UploadService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        content: Arc<dyn ContentStore>,
        scanner: Option<Arc<dyn VirusScanner>>,
    ) -> Self {
        Self {
            metadata,
            content,
            scanner,
        }
    }

    /// Upload every file into one bucket, stopping at the first failure.
    #[tracing::instrument(skip(self, files, headers), fields(file_count = files.len()))]
    pub async fn upload_files(
        &self,
        bucket_id: &str,
        files: Vec<FileUpload>,
        headers: &ForwardedHeaders,
    ) -> Result<Vec<FileRecord>, BatchFailure> {
        let bucket = match self.metadata.get_bucket_by_id(bucket_id, headers).await {
            Ok(bucket) => bucket,
            Err(error) => {
                return Err(BatchFailure {
                    processed: Vec::new(),
                    error,
                })
            }
        };

        let mut processed = Vec::with_capacity(files.len());
        for upload in files {
            match self.create_file(&bucket, upload, headers).await {
                Ok(record) => processed.push(record),
                Err(error) => {
                    tracing::warn!(
                        bucket_id = %bucket.id,
                        processed = processed.len(),
                        error = %error,
                        "Batch upload aborted"
                    );
                    return Err(BatchFailure { processed, error });
                }
            }
        }

        Ok(processed)
    }

    /// Store a new file.
    #[tracing::instrument(skip(self, bucket, upload, headers), fields(bucket_id = %bucket.id, filename = %upload.name))]
    pub async fn create_file(
        &self,
        bucket: &BucketPolicy,
        upload: FileUpload,
        headers: &ForwardedHeaders,
    ) -> Result<FileRecord, AppError> {
        let start = Instant::now();
        let file_id = upload.id.unwrap_or_else(Uuid::new_v4);

        check_size(bucket, &upload)?;
        let mime_type = content_type::resolve(upload.content_type.as_deref(), &upload.content);

        self.metadata
            .initialize_file(
                &NewFile {
                    id: file_id,
                    name: upload.name.clone(),
                    bucket_id: bucket.id.clone(),
                    mime_type: mime_type.clone(),
                },
                headers,
            )
            .await?;

        self.scan(&file_id, &upload, headers).await?;

        let key = file_key(&bucket.id, &file_id);
        let mut saga = Saga::new("create_file");
        {
            let metadata = self.metadata.clone();
            let headers = headers.clone();
            saga.compensate_with("initialize_file", async move {
                metadata.delete_file_by_id(&file_id, &headers).await
            });
        }

        let etag = saga
            .step("put_file", async {
                self.content
                    .put_file(upload.content.clone(), &key, &mime_type)
                    .await
                    .map_err(AppError::from)
            })
            .await?;
        saga.commit();

        let record = self
            .metadata
            .populate_metadata(
                &file_id,
                &FileUpdate {
                    name: upload.name.clone(),
                    size: upload.size(),
                    bucket_id: bucket.id.clone(),
                    etag,
                    is_uploaded: true,
                    mime_type,
                    metadata: upload.metadata,
                },
                headers,
            )
            .await?;

        tracing::info!(
            file_id = %file_id,
            user_id = headers.user_id().unwrap_or("anonymous"),
            size_bytes = record.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File uploaded"
        );

        Ok(record)
    }

    /// Overwrite the content of an existing file.
    #[tracing::instrument(skip(self, upload, headers), fields(file_id = %file_id))]
    pub async fn replace_file(
        &self,
        file_id: &Uuid,
        upload: FileUpload,
        headers: &ForwardedHeaders,
    ) -> Result<FileRecord, AppError> {
        let start = Instant::now();
        let file_id = *file_id;

        let existing = self.metadata.get_file_by_id(&file_id, headers).await?;
        let bucket = self
            .metadata
            .get_bucket_by_id(&existing.bucket_id, headers)
            .await?;

        check_size(&bucket, &upload)?;
        self.scan(&file_id, &upload, headers).await?;
        let mime_type = content_type::resolve(upload.content_type.as_deref(), &upload.content);

        let mut saga = Saga::new("replace_file");
        saga.step(
            "set_is_uploaded",
            self.metadata.set_is_uploaded(&file_id, false, headers),
        )
        .await?;
        {
            let metadata = self.metadata.clone();
            let headers = headers.clone();
            saga.compensate_with("set_is_uploaded", async move {
                metadata.set_is_uploaded(&file_id, true, &headers).await
            });
        }

        let key = file_key(&bucket.id, &file_id);
        let etag = saga
            .step("put_file", async {
                self.content
                    .put_file(upload.content.clone(), &key, &mime_type)
                    .await
                    .map_err(AppError::from)
            })
            .await?;
        saga.commit();

        let name = if upload.name.is_empty() {
            existing.name.clone()
        } else {
            upload.name.clone()
        };

        let record = self
            .metadata
            .populate_metadata(
                &file_id,
                &FileUpdate {
                    name,
                    size: upload.size(),
                    bucket_id: bucket.id.clone(),
                    etag,
                    is_uploaded: true,
                    mime_type,
                    metadata: upload.metadata.or(existing.metadata),
                },
                headers,
            )
            .await?;

        tracing::info!(
            file_id = %file_id,
            size_bytes = record.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File replaced"
        );

        Ok(record)
    }

    async fn scan(
        &self,
        file_id: &Uuid,
        upload: &FileUpload,
        headers: &ForwardedHeaders,
    ) -> Result<(), AppError> {
        let Some(scanner) = self.scanner.as_ref() else {
            return Ok(());
        };

        match scanner.scan(upload.content.clone()).await {
            ScanResult::Clean => Ok(()),
            ScanResult::Error(message) => Err(AppError::Scanner(message)),
            ScanResult::Infected(virus) => {
                self.metadata
                    .insert_virus(
                        &VirusRecord {
                            file_id: *file_id,
                            filename: upload.name.clone(),
                            virus: virus.clone(),
                            user_session: headers.session_variables(),
                        },
                        headers,
                    )
                    .await?;
                Err(AppError::VirusFound {
                    filename: upload.name.clone(),
                    virus,
                })
            }
        }
    }
}

fn check_size(bucket: &BucketPolicy, upload: &FileUpload) -> Result<(), AppError> {
    let size = upload.size();
    if bucket.accepts_size(size) {
        return Ok(());
    }
    if size < bucket.min_upload_file_size {
        return Err(AppError::FileTooSmall {
            filename: upload.name.clone(),
            size,
            min_size: bucket.min_upload_file_size,
        });
    }
    Err(AppError::FileTooBig {
        filename: upload.name.clone(),
        size,
        max_size: bucket.max_upload_file_size,
    })
}
