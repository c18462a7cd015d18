//! Content type resolution for uploads.

use filegate_core::constants::{OCTET_STREAM, TEXT_PLAIN_UTF8};

/// Declared types that say nothing about the content.
fn is_generic(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    essence.is_empty()
        || essence.eq_ignore_ascii_case(OCTET_STREAM)
        || essence.eq_ignore_ascii_case("binary/octet-stream")
}

/// Detect a type from the leading bytes.
pub fn sniff(data: &[u8]) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    if !data.contains(&0) && std::str::from_utf8(data).is_ok() {
        return TEXT_PLAIN_UTF8.to_string();
    }

    OCTET_STREAM.to_string()
}

/// Trust an explicit, specific declared type; otherwise sniff.
pub fn resolve(declared: Option<&str>, data: &[u8]) -> String {
    match declared {
        Some(content_type) if !is_generic(content_type) => content_type.trim().to_string(),
        _ => sniff(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_explicit_type_is_trusted() {
        assert_eq!(resolve(Some("image/webp"), b"hello"), "image/webp");
    }

    #[test]
    fn test_generic_type_is_sniffed() {
        assert_eq!(resolve(Some("application/octet-stream"), PNG_MAGIC), "image/png");
        assert_eq!(resolve(None, b"plain words"), TEXT_PLAIN_UTF8);
    }

    #[test]
    fn test_binary_without_signature() {
        assert_eq!(sniff(&[0, 1, 2, 3, 0xFE]), OCTET_STREAM);
    }
}
