//! GraphQL documents sent to the catalog.

const FILE_FIELDS: &str =
    "id name size bucketId etag createdAt updatedAt isUploaded mimeType uploadedByUserId metadata";

pub const GET_BUCKET: &str = "query GetBucket($id: String!) {
  bucket(id: $id) {
    id minUploadFileSize maxUploadFileSize presignedUrlsEnabled downloadExpiration cacheControl createdAt updatedAt
  }
}";

pub fn get_file() -> String {
    format!(
        "query GetFile($id: uuid!) {{\n  file(id: $id) {{ {} }}\n}}",
        FILE_FIELDS
    )
}

pub const INSERT_FILE: &str = "mutation InsertFile($object: files_insert_input!) {
  insertFile(object: $object) { id }
}";

pub fn update_file() -> String {
    format!(
        "mutation UpdateFile($id: uuid!, $set: files_set_input!) {{\n  updateFile(pk_columns: {{id: $id}}, _set: $set) {{ {} }}\n}}",
        FILE_FIELDS
    )
}

pub const DELETE_FILE: &str = "mutation DeleteFile($id: uuid!) {
  deleteFile(id: $id) { id }
}";

pub const LIST_FILES: &str = "query ListFiles {
  files { id name bucketId isUploaded }
}";

pub const INSERT_VIRUS: &str = "mutation InsertVirus($object: virus_insert_input!) {
  insertVirus(object: $object) { id }
}";
