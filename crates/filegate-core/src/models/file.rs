use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file as recorded in the metadata catalog.
///
/// Timestamps are kept exactly as the catalog returns them; they are only
/// parsed when a response needs them (see [`crate::conditional`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: Uuid,
    pub name: String,
    pub size: i64,
    pub bucket_id: String,
    pub etag: String,
    pub created_at: String,
    pub updated_at: String,
    pub is_uploaded: bool,
    pub mime_type: String,
    #[serde(default)]
    pub uploaded_by_user_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Minimal projection used by inventory reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub id: Uuid,
    pub name: String,
    pub bucket_id: String,
    pub is_uploaded: bool,
}

/// Row inserted before any bytes are written; `isUploaded` starts false.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub id: Uuid,
    pub name: String,
    pub bucket_id: String,
    pub mime_type: String,
}

/// Fields written once content is safely stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    pub name: String,
    pub size: i64,
    pub bucket_id: String,
    pub etag: String,
    pub is_uploaded: bool,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirusRecord {
    pub file_id: Uuid,
    pub filename: String,
    pub virus: String,
    pub user_session: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_record_deserializes_without_optional_fields() {
        let id = Uuid::new_v4();
        let record: FileRecord = serde_json::from_value(serde_json::json!({
            "id": id,
            "name": "report.pdf",
            "size": 12,
            "bucketId": "default",
            "etag": "\"abc\"",
            "createdAt": "2024-01-01T00:00:00+00:00",
            "updatedAt": "2024-01-01T00:00:00+00:00",
            "isUploaded": true,
            "mimeType": "application/pdf"
        }))
        .unwrap();
        assert_eq!(record.id, id);
        assert!(record.uploaded_by_user_id.is_none());
        assert!(record.metadata.is_none());
    }

    #[test]
    fn test_file_update_serializes_camel_case() {
        let update = FileUpdate {
            name: "a.txt".to_string(),
            size: 3,
            bucket_id: "default".to_string(),
            etag: "\"e\"".to_string(),
            is_uploaded: true,
            mime_type: "text/plain".to_string(),
            metadata: None,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["isUploaded"], true);
        assert_eq!(json["mimeType"], "text/plain");
        assert!(json.get("metadata").is_none());
    }
}
