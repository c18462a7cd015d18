//! Shared constants

/// Fallback content type when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Content type assigned to sniffed UTF-8 text.
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Header carrying the admin secret.
pub const ADMIN_SECRET_HEADER: &str = "x-hasura-admin-secret";

/// Default number of concurrent image transformations.
pub const DEFAULT_IMAGE_WORKERS: usize = 3;
