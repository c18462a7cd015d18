//! Shared key layout for storage backends.
//!
//! Key format: `{bucket_id}/{file_id}`. Reconciliation relies on the file id
//! being the final path segment.

use uuid::Uuid;

/// Generate the storage key for a file.
pub fn file_key(bucket_id: &str, file_id: &Uuid) -> String {
    format!("{}/{}", bucket_id, file_id)
}

/// The file id portion of a key: everything after the last `/`.
pub fn file_id_from_key(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trip() {
        let id = Uuid::new_v4();
        let key = file_key("default", &id);
        assert_eq!(key, format!("default/{}", id));
        assert_eq!(file_id_from_key(&key), id.to_string());
    }

    #[test]
    fn test_id_from_key_without_bucket() {
        assert_eq!(file_id_from_key("abc"), "abc");
        assert_eq!(file_id_from_key("a/b/c"), "c");
    }
}
