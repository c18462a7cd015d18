use crate::queries;
use crate::traits::MetadataStore;
use async_trait::async_trait;
use filegate_core::{
    AppError, BucketPolicy, FileRecord, FileSummary, FileUpdate, ForwardedHeaders, NewFile,
    VirusRecord,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphqlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorExtensions {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BucketData {
    bucket: Option<BucketPolicy>,
}

#[derive(Debug, Deserialize)]
struct FileData {
    file: Option<FileRecord>,
}

#[derive(Debug, Deserialize)]
struct InsertFileData {
    #[serde(rename = "insertFile")]
    insert_file: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UpdateFileData {
    #[serde(rename = "updateFile")]
    update_file: Option<FileRecord>,
}

#[derive(Debug, Deserialize)]
struct DeleteFileData {
    #[serde(rename = "deleteFile")]
    delete_file: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FilesData {
    files: Vec<FileSummary>,
}

#[derive(Debug, Deserialize)]
struct InsertVirusData {
    #[serde(rename = "insertVirus")]
    insert_virus: Option<Value>,
}

/// Metadata catalog reached over GraphQL.
#[derive(Clone, Debug)]
pub struct GraphqlMetadataStore {
    client: Client,
    endpoint: String,
}

impl GraphqlMetadataStore {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Metadata(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
        headers: &ForwardedHeaders,
    ) -> Result<T, AppError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Metadata request failed");
            AppError::Metadata(format!("{}: {}", operation, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Metadata(format!(
                "{}: catalog returned {}: {}",
                operation, status, body
            )));
        }

        let body: GraphqlResponse<T> = response.json().await.map_err(|e| {
            AppError::Metadata(format!("{}: failed to parse response: {}", operation, e))
        })?;

        if let Some(err) = body.errors.first() {
            tracing::debug!(operation, message = %err.message, "Catalog returned an error");
            return Err(map_graphql_error(operation, err));
        }

        body.data
            .ok_or_else(|| AppError::Metadata(format!("{}: response has no data", operation)))
    }
}

fn map_graphql_error(operation: &str, err: &GraphqlError) -> AppError {
    let code = err.extensions.as_ref().and_then(|e| e.code.as_deref());
    match code {
        Some("constraint-violation") => {
            AppError::AlreadyExists(format!("{}: {}", operation, err.message))
        }
        Some("permission-error") | Some("access-denied") => AppError::Forbidden(err.message.clone()),
        // A role without permission on a root field sees it as missing.
        Some("validation-failed") if err.message.contains("not found in type") => {
            AppError::Forbidden(err.message.clone())
        }
        _ => AppError::Metadata(format!("{}: {}", operation, err.message)),
    }
}

#[async_trait]
impl MetadataStore for GraphqlMetadataStore {
    async fn get_bucket_by_id(
        &self,
        bucket_id: &str,
        headers: &ForwardedHeaders,
    ) -> Result<BucketPolicy, AppError> {
        let data: BucketData = self
            .execute("GetBucket", queries::GET_BUCKET, json!({ "id": bucket_id }), headers)
            .await?;
        data.bucket
            .ok_or_else(|| AppError::NotFound(format!("bucket {} not found", bucket_id)))
    }

    async fn get_file_by_id(
        &self,
        file_id: &Uuid,
        headers: &ForwardedHeaders,
    ) -> Result<FileRecord, AppError> {
        let data: FileData = self
            .execute("GetFile", &queries::get_file(), json!({ "id": file_id }), headers)
            .await?;
        data.file
            .ok_or_else(|| AppError::NotFound(format!("file {} not found", file_id)))
    }

    async fn initialize_file(
        &self,
        file: &NewFile,
        headers: &ForwardedHeaders,
    ) -> Result<(), AppError> {
        let data: InsertFileData = self
            .execute(
                "InsertFile",
                queries::INSERT_FILE,
                json!({ "object": file }),
                headers,
            )
            .await?;
        data.insert_file
            .map(|_| ())
            .ok_or_else(|| AppError::Forbidden("not allowed to insert file".to_string()))
    }

    async fn populate_metadata(
        &self,
        file_id: &Uuid,
        update: &FileUpdate,
        headers: &ForwardedHeaders,
    ) -> Result<FileRecord, AppError> {
        let data: UpdateFileData = self
            .execute(
                "UpdateFile",
                &queries::update_file(),
                json!({ "id": file_id, "set": update }),
                headers,
            )
            .await?;
        data.update_file
            .ok_or_else(|| AppError::NotFound(format!("file {} not found", file_id)))
    }

    async fn set_is_uploaded(
        &self,
        file_id: &Uuid,
        is_uploaded: bool,
        headers: &ForwardedHeaders,
    ) -> Result<(), AppError> {
        let data: UpdateFileData = self
            .execute(
                "UpdateFile",
                &queries::update_file(),
                json!({ "id": file_id, "set": { "isUploaded": is_uploaded } }),
                headers,
            )
            .await?;
        data.update_file
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("file {} not found", file_id)))
    }

    async fn delete_file_by_id(
        &self,
        file_id: &Uuid,
        headers: &ForwardedHeaders,
    ) -> Result<(), AppError> {
        let data: DeleteFileData = self
            .execute(
                "DeleteFile",
                queries::DELETE_FILE,
                json!({ "id": file_id }),
                headers,
            )
            .await?;
        data.delete_file
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("file {} not found", file_id)))
    }

    async fn list_files(&self, headers: &ForwardedHeaders) -> Result<Vec<FileSummary>, AppError> {
        let data: FilesData = self
            .execute("ListFiles", queries::LIST_FILES, json!({}), headers)
            .await?;
        Ok(data.files)
    }

    async fn insert_virus(
        &self,
        virus: &VirusRecord,
        headers: &ForwardedHeaders,
    ) -> Result<(), AppError> {
        let data: InsertVirusData = self
            .execute(
                "InsertVirus",
                queries::INSERT_VIRUS,
                json!({ "object": virus }),
                headers,
            )
            .await?;
        data.insert_virus
            .map(|_| ())
            .ok_or_else(|| AppError::Forbidden("not allowed to record virus".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> GraphqlMetadataStore {
        GraphqlMetadataStore::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn file_json(id: Uuid, is_uploaded: bool) -> Value {
        json!({
            "id": id,
            "name": "a.txt",
            "size": 12,
            "bucketId": "default",
            "etag": "\"e\"",
            "createdAt": "2024-01-01T00:00:00+00:00",
            "updatedAt": "2024-01-01T00:00:00+00:00",
            "isUploaded": is_uploaded,
            "mimeType": "text/plain",
            "uploadedByUserId": null,
            "metadata": null
        })
    }

    #[tokio::test]
    async fn test_get_bucket_forwards_session_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-hasura-role", "user"))
            .and(body_partial_json(json!({ "variables": { "id": "default" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "bucket": {
                    "id": "default",
                    "minUploadFileSize": 1,
                    "maxUploadFileSize": 100,
                    "presignedUrlsEnabled": true,
                    "downloadExpiration": 30,
                    "cacheControl": "max-age=3600"
                }}
            })))
            .mount(&server)
            .await;

        let headers = ForwardedHeaders::from_pairs(vec![("x-hasura-role", "user")]);
        let bucket = store(&server)
            .get_bucket_by_id("default", &headers)
            .await
            .unwrap();
        assert_eq!(bucket.max_upload_file_size, 100);
        assert_eq!(bucket.cache_control, "max-age=3600");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "file": null } })),
            )
            .mount(&server)
            .await;

        let err = store(&server)
            .get_file_by_id(&Uuid::new_v4(), &ForwardedHeaders::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_constraint_violation_is_already_exists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{
                    "message": "Uniqueness violation. duplicate key value violates unique constraint \"files_pkey\"",
                    "extensions": { "code": "constraint-violation", "path": "$.selectionSet.insertFile" }
                }]
            })))
            .mount(&server)
            .await;

        let file = NewFile {
            id: Uuid::new_v4(),
            name: "a.txt".to_string(),
            bucket_id: "default".to_string(),
            mime_type: "text/plain".to_string(),
        };
        let err = store(&server)
            .initialize_file(&file, &ForwardedHeaders::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_permission_error_is_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{
                    "message": "field 'files' not found in type: 'query_root'",
                    "extensions": { "code": "validation-failed" }
                }]
            })))
            .mount(&server)
            .await;

        let err = store(&server)
            .list_files(&ForwardedHeaders::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_populate_metadata_returns_updated_record() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "set": { "isUploaded": true } } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "updateFile": file_json(id, true) }
            })))
            .mount(&server)
            .await;

        let update = FileUpdate {
            name: "a.txt".to_string(),
            size: 12,
            bucket_id: "default".to_string(),
            etag: "\"e\"".to_string(),
            is_uploaded: true,
            mime_type: "text/plain".to_string(),
            metadata: None,
        };
        let record = store(&server)
            .populate_metadata(&id, &update, &ForwardedHeaders::default())
            .await
            .unwrap();
        assert_eq!(record.id, id);
        assert!(record.is_uploaded);
    }

    #[tokio::test]
    async fn test_list_files() {
        let server = MockServer::start().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "files": [
                    { "id": a, "name": "a", "bucketId": "default", "isUploaded": true },
                    { "id": b, "name": "b", "bucketId": "default", "isUploaded": false }
                ]}
            })))
            .mount(&server)
            .await;

        let files = store(&server)
            .list_files(&ForwardedHeaders::default())
            .await
            .unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].is_uploaded);
        assert!(!files[1].is_uploaded);
    }

    #[tokio::test]
    async fn test_http_failure_is_metadata_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = store(&server)
            .list_files(&ForwardedHeaders::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Metadata(_)));
    }
}
