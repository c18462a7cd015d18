use serde::{Deserialize, Serialize};

/// Per-bucket upload and download policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketPolicy {
    pub id: String,
    pub min_upload_file_size: i64,
    pub max_upload_file_size: i64,
    pub presigned_urls_enabled: bool,
    /// Presigned URL lifetime, in seconds.
    pub download_expiration: i64,
    pub cache_control: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl BucketPolicy {
    /// Check a content length against the bucket's inclusive bounds.
    pub fn accepts_size(&self, size: i64) -> bool {
        size >= self.min_upload_file_size && size <= self.max_upload_file_size
    }
}
