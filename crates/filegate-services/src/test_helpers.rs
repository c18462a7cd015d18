//! In-memory collaborators for tests.
//!
//! Enabled with the `test-helpers` feature.

use crate::scanner::{ScanResult, VirusScanner};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use filegate_core::{
    AppError, BucketPolicy, FileRecord, FileSummary, FileUpdate, ForwardedHeaders, NewFile,
    PresignedQuery, StorageBackend, VirusRecord,
};
use filegate_metadata::MetadataStore;
use filegate_storage::{ByteRange, ContentStore, ObjectResponse, StorageError, StorageResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const TEST_BUCKET: &str = "default";

/// A permissive bucket: 1 byte to 10 MiB, presigned URLs on.
pub fn bucket(id: &str) -> BucketPolicy {
    BucketPolicy {
        id: id.to_string(),
        min_upload_file_size: 1,
        max_upload_file_size: 10 * 1024 * 1024,
        presigned_urls_enabled: true,
        download_expiration: 30,
        cache_control: "max-age=3600".to_string(),
        created_at: None,
        updated_at: None,
    }
}

#[derive(Default)]
struct CatalogState {
    buckets: HashMap<String, BucketPolicy>,
    files: HashMap<Uuid, FileRecord>,
    viruses: Vec<VirusRecord>,
    failing: HashSet<&'static str>,
    calls: Vec<&'static str>,
}

/// Metadata catalog kept in a map. Operations can be made to fail by name.
#[derive(Default, Clone)]
pub struct MockMetadataStore {
    state: Arc<Mutex<CatalogState>>,
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(self, bucket: BucketPolicy) -> Self {
        self.lock().buckets.insert(bucket.id.clone(), bucket);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `operation` (e.g. `"populate_metadata"`) fail from now on.
    pub fn fail_on(&self, operation: &'static str) {
        self.lock().failing.insert(operation);
    }

    pub fn insert_file(&self, record: FileRecord) {
        self.lock().files.insert(record.id, record);
    }

    pub fn file(&self, id: &Uuid) -> Option<FileRecord> {
        self.lock().files.get(id).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.lock().files.len()
    }

    pub fn viruses(&self) -> Vec<VirusRecord> {
        self.lock().viruses.clone()
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    fn enter(&self, operation: &'static str) -> Result<std::sync::MutexGuard<'_, CatalogState>, AppError> {
        let mut state = self.lock();
        state.calls.push(operation);
        if state.failing.contains(operation) {
            return Err(AppError::Metadata(format!("{} failed", operation)));
        }
        Ok(state)
    }
}

/// A finished upload record, for seeding the catalog.
pub fn uploaded_record(id: Uuid, name: &str, mime_type: &str, size: i64, etag: &str) -> FileRecord {
    let now = Utc::now().to_rfc3339();
    FileRecord {
        id,
        name: name.to_string(),
        size,
        bucket_id: TEST_BUCKET.to_string(),
        etag: etag.to_string(),
        created_at: now.clone(),
        updated_at: now,
        is_uploaded: true,
        mime_type: mime_type.to_string(),
        uploaded_by_user_id: None,
        metadata: None,
    }
}

#[async_trait]
impl MetadataStore for MockMetadataStore {
    async fn get_bucket_by_id(
        &self,
        bucket_id: &str,
        _headers: &ForwardedHeaders,
    ) -> Result<BucketPolicy, AppError> {
        self.enter("get_bucket_by_id")?
            .buckets
            .get(bucket_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("bucket {} not found", bucket_id)))
    }

    async fn get_file_by_id(
        &self,
        file_id: &Uuid,
        _headers: &ForwardedHeaders,
    ) -> Result<FileRecord, AppError> {
        self.enter("get_file_by_id")?
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("file {} not found", file_id)))
    }

    async fn initialize_file(
        &self,
        file: &NewFile,
        _headers: &ForwardedHeaders,
    ) -> Result<(), AppError> {
        let mut state = self.enter("initialize_file")?;
        if state.files.contains_key(&file.id) {
            return Err(AppError::AlreadyExists(format!("file {} already exists", file.id)));
        }
        let now = Utc::now().to_rfc3339();
        state.files.insert(
            file.id,
            FileRecord {
                id: file.id,
                name: file.name.clone(),
                size: 0,
                bucket_id: file.bucket_id.clone(),
                etag: String::new(),
                created_at: now.clone(),
                updated_at: now,
                is_uploaded: false,
                mime_type: file.mime_type.clone(),
                uploaded_by_user_id: None,
                metadata: None,
            },
        );
        Ok(())
    }

    async fn populate_metadata(
        &self,
        file_id: &Uuid,
        update: &FileUpdate,
        _headers: &ForwardedHeaders,
    ) -> Result<FileRecord, AppError> {
        let mut state = self.enter("populate_metadata")?;
        let record = state
            .files
            .get_mut(file_id)
            .ok_or_else(|| AppError::NotFound(format!("file {} not found", file_id)))?;
        record.name = update.name.clone();
        record.size = update.size;
        record.bucket_id = update.bucket_id.clone();
        record.etag = update.etag.clone();
        record.is_uploaded = update.is_uploaded;
        record.mime_type = update.mime_type.clone();
        record.metadata = update.metadata.clone();
        record.updated_at = Utc::now().to_rfc3339();
        Ok(record.clone())
    }

    async fn set_is_uploaded(
        &self,
        file_id: &Uuid,
        is_uploaded: bool,
        _headers: &ForwardedHeaders,
    ) -> Result<(), AppError> {
        let mut state = self.enter("set_is_uploaded")?;
        let record = state
            .files
            .get_mut(file_id)
            .ok_or_else(|| AppError::NotFound(format!("file {} not found", file_id)))?;
        record.is_uploaded = is_uploaded;
        Ok(())
    }

    async fn delete_file_by_id(
        &self,
        file_id: &Uuid,
        _headers: &ForwardedHeaders,
    ) -> Result<(), AppError> {
        self.enter("delete_file_by_id")?
            .files
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("file {} not found", file_id)))
    }

    async fn list_files(&self, _headers: &ForwardedHeaders) -> Result<Vec<FileSummary>, AppError> {
        let state = self.enter("list_files")?;
        let mut files: Vec<FileSummary> = state
            .files
            .values()
            .map(|f| FileSummary {
                id: f.id,
                name: f.name.clone(),
                bucket_id: f.bucket_id.clone(),
                is_uploaded: f.is_uploaded,
            })
            .collect();
        files.sort_by_key(|f| f.id);
        Ok(files)
    }

    async fn insert_virus(
        &self,
        virus: &VirusRecord,
        _headers: &ForwardedHeaders,
    ) -> Result<(), AppError> {
        self.enter("insert_virus")?.viruses.push(virus.clone());
        Ok(())
    }
}

/// Scanner with a fixed verdict.
pub struct MockScanner {
    result: ScanResult,
}

impl MockScanner {
    pub fn clean() -> Self {
        Self {
            result: ScanResult::Clean,
        }
    }

    pub fn infected(virus: &str) -> Self {
        Self {
            result: ScanResult::Infected(virus.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: ScanResult::Error(message.to_string()),
        }
    }
}

#[async_trait]
impl VirusScanner for MockScanner {
    async fn scan(&self, _data: Bytes) -> ScanResult {
        self.result.clone()
    }
}

/// Wraps a real store and fails writes or deletes on demand.
pub struct FlakyContentStore {
    inner: Arc<dyn ContentStore>,
    fail_put: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyContentStore {
    pub fn new(inner: Arc<dyn ContentStore>) -> Self {
        Self {
            inner,
            fail_put: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentStore for FlakyContentStore {
    async fn put_file(&self, content: Bytes, path: &str, content_type: &str) -> StorageResult<String> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed("injected put failure".to_string()));
        }
        self.inner.put_file(content, path, content_type).await
    }

    async fn get_file(&self, path: &str, range: Option<&ByteRange>) -> StorageResult<ObjectResponse> {
        self.inner.get_file(path, range).await
    }

    async fn create_presigned_url(&self, path: &str, expires_in: Duration) -> StorageResult<String> {
        self.inner.create_presigned_url(path, expires_in).await
    }

    async fn get_file_with_presigned_url(
        &self,
        path: &str,
        query: &PresignedQuery,
        range: Option<&ByteRange>,
    ) -> StorageResult<ObjectResponse> {
        self.inner
            .get_file_with_presigned_url(path, query, range)
            .await
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed("injected delete failure".to_string()));
        }
        self.inner.delete_file(path).await
    }

    async fn list_files(&self) -> StorageResult<Vec<String>> {
        self.inner.list_files().await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}
