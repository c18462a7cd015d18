use async_trait::async_trait;
use filegate_core::{
    AppError, BucketPolicy, FileRecord, FileSummary, FileUpdate, ForwardedHeaders, NewFile,
    VirusRecord,
};
use uuid::Uuid;

/// Access to the metadata catalog.
///
/// Every call carries the caller's trust headers so the catalog can apply
/// its own permissions. Missing rows surface as [`AppError::NotFound`].
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_bucket_by_id(
        &self,
        bucket_id: &str,
        headers: &ForwardedHeaders,
    ) -> Result<BucketPolicy, AppError>;

    async fn get_file_by_id(
        &self,
        file_id: &Uuid,
        headers: &ForwardedHeaders,
    ) -> Result<FileRecord, AppError>;

    /// Insert a placeholder row with `isUploaded=false`.
    async fn initialize_file(
        &self,
        file: &NewFile,
        headers: &ForwardedHeaders,
    ) -> Result<(), AppError>;

    /// Finalize a row once its content is stored.
    async fn populate_metadata(
        &self,
        file_id: &Uuid,
        update: &FileUpdate,
        headers: &ForwardedHeaders,
    ) -> Result<FileRecord, AppError>;

    async fn set_is_uploaded(
        &self,
        file_id: &Uuid,
        is_uploaded: bool,
        headers: &ForwardedHeaders,
    ) -> Result<(), AppError>;

    async fn delete_file_by_id(
        &self,
        file_id: &Uuid,
        headers: &ForwardedHeaders,
    ) -> Result<(), AppError>;

    async fn list_files(&self, headers: &ForwardedHeaders) -> Result<Vec<FileSummary>, AppError>;

    async fn insert_virus(
        &self,
        virus: &VirusRecord,
        headers: &ForwardedHeaders,
    ) -> Result<(), AppError>;
}
