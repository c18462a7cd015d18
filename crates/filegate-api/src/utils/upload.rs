//! Multipart form parsing for upload and replace.

use axum::extract::Multipart;
use filegate_core::AppError;
use filegate_services::upload::pair_metadata;
use filegate_services::{FileUpload, UploadMetadata};

const BUCKET_FIELD: &str = "bucket-id";
const FILES_FIELD: &str = "file[]";
const METADATA_FIELD: &str = "metadata[]";
const REPLACE_FILE_FIELD: &str = "file";
const REPLACE_METADATA_FIELD: &str = "metadata";

pub const DEFAULT_BUCKET: &str = "default";

/// A parsed `POST /v1/files` form.
#[derive(Debug)]
pub struct BatchForm {
    pub bucket_id: String,
    pub files: Vec<FileUpload>,
}

/// Read a batch form: optional `bucket-id`, one or more `file[]` parts and
/// either no `metadata[]` parts or exactly one per file.
pub async fn extract_batch_form(mut multipart: Multipart) -> Result<BatchForm, AppError> {
    let mut bucket_id: Option<String> = None;
    let mut files = Vec::new();
    let mut metadata = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        match field_name.as_str() {
            BUCKET_FIELD => {
                let value = field.text().await.map_err(|e| {
                    AppError::InvalidInput(format!("Failed to read {}: {}", BUCKET_FIELD, e))
                })?;
                bucket_id = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            }
            FILES_FIELD => {
                let name = sanitize_filename(field.file_name().unwrap_or_default());
                let content_type = field.content_type().map(|s: &str| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?;
                let mut upload = FileUpload::new(name, data);
                upload.content_type = content_type;
                files.push(upload);
            }
            METADATA_FIELD => {
                let data = field.bytes().await.map_err(|e| {
                    AppError::InvalidInput(format!("Failed to read {}: {}", METADATA_FIELD, e))
                })?;
                metadata.push(parse_metadata(&data)?);
            }
            _ => {
                tracing::debug!(field = %field_name, "Ignoring unknown form field");
            }
        }
    }

    if files.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "no files provided, expected one or more '{}' fields",
            FILES_FIELD
        )));
    }

    let paired = pair_metadata(files.len(), metadata)?;
    let files = files
        .into_iter()
        .zip(paired)
        .map(|(file, entry)| file.with_metadata(entry))
        .collect();

    Ok(BatchForm {
        bucket_id: bucket_id.unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
        files,
    })
}

/// Read a replace form: exactly one `file` part and at most one `metadata`
/// part. An id in the metadata is ignored; the path decides which file.
pub async fn extract_replace_form(mut multipart: Multipart) -> Result<FileUpload, AppError> {
    let mut file: Option<FileUpload> = None;
    let mut metadata = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        match field_name.as_str() {
            REPLACE_FILE_FIELD => {
                if file.is_some() {
                    return Err(AppError::InvalidInput(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    ));
                }
                let name = field.file_name().map(sanitize_filename).unwrap_or_default();
                let content_type = field.content_type().map(|s: &str| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?;
                let mut upload = FileUpload::new(name, data);
                upload.content_type = content_type;
                file = Some(upload);
            }
            REPLACE_METADATA_FIELD => {
                let data = field.bytes().await.map_err(|e| {
                    AppError::InvalidInput(format!("Failed to read {}: {}", REPLACE_METADATA_FIELD, e))
                })?;
                metadata.push(parse_metadata(&data)?);
            }
            _ => {
                tracing::debug!(field = %field_name, "Ignoring unknown form field");
            }
        }
    }

    let file = file.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;
    let metadata = pair_metadata(1, metadata)?
        .pop()
        .flatten()
        .map(|entry| UploadMetadata { id: None, ..entry });
    Ok(file.with_metadata(metadata))
}

fn parse_metadata(data: &[u8]) -> Result<UploadMetadata, AppError> {
    serde_json::from_slice(data)
        .map_err(|e| AppError::InvalidInput(format!("problem parsing metadata: {}", e)))
}

/// Keep only the final path component of a client-supplied filename.
pub fn sanitize_filename(filename: &str) -> String {
    const MAX_FILENAME_LENGTH: usize = 255;

    let filename_only = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();

    if filename_only == "." || filename_only == ".." {
        return String::new();
    }

    filename_only
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILENAME_LENGTH)
        .collect()
}
