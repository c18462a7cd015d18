use bytes::Bytes;
use filegate_core::{AppError, FileRecord};
use serde::Deserialize;
use uuid::Uuid;

/// One file taken from an upload form.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Caller-chosen id; generated when absent.
    pub id: Option<Uuid>,
    pub name: String,
    /// The part's declared `Content-Type`, if any.
    pub content_type: Option<String>,
    pub content: Bytes,
    pub metadata: Option<serde_json::Value>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            id: None,
            name: name.into(),
            content_type: None,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn size(&self) -> i64 {
        self.content.len() as i64
    }

    /// Apply a `metadata[]` entry: its id, name and user metadata win over
    /// what the file part carried.
    pub fn with_metadata(mut self, entry: Option<UploadMetadata>) -> Self {
        if let Some(entry) = entry {
            if entry.id.is_some() {
                self.id = entry.id;
            }
            if let Some(name) = entry.name.filter(|n| !n.is_empty()) {
                self.name = name;
            }
            if entry.metadata.is_some() {
                self.metadata = entry.metadata;
            }
        }
        self
    }
}

/// The JSON document carried by a `metadata[]` (or `metadata`) form part.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UploadMetadata {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Line metadata entries up with files. No entries means none for every
/// file; otherwise the counts must agree.
pub fn pair_metadata(
    files: usize,
    metadata: Vec<UploadMetadata>,
) -> Result<Vec<Option<UploadMetadata>>, AppError> {
    if metadata.is_empty() {
        return Ok(vec![None; files]);
    }
    if metadata.len() != files {
        return Err(AppError::MetadataLengthMismatch {
            files,
            metadata: metadata.len(),
        });
    }
    Ok(metadata.into_iter().map(Some).collect())
}

/// A batch upload stopped at its first failure.
#[derive(Debug)]
pub struct BatchFailure {
    /// Files stored before the failure.
    pub processed: Vec<FileRecord>,
    pub error: AppError,
}
