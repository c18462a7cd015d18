//! HTTP conditional request evaluation.
//!
//! Decides between the full response, `304 Not Modified` and
//! `412 Precondition Failed` from an entity tag, a last-modified time and
//! the four standard request predicates.

use chrono::{DateTime, Utc};

use crate::error::AppError;

pub const STATUS_OK: u16 = 200;
pub const STATUS_PARTIAL_CONTENT: u16 = 206;
pub const STATUS_NOT_MODIFIED: u16 = 304;
pub const STATUS_PRECONDITION_FAILED: u16 = 412;

/// Request predicates; any subset may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalPredicates {
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

impl ConditionalPredicates {
    pub fn is_empty(&self) -> bool {
        self.if_match.is_none()
            && self.if_none_match.is_none()
            && self.if_modified_since.is_none()
            && self.if_unmodified_since.is_none()
    }
}

/// Resolve the status to send. The first matching rule wins:
/// a failed `If-Match` beats everything, then `If-None-Match`,
/// `If-Modified-Since` and `If-Unmodified-Since` in that order.
pub fn evaluate(
    etag: &str,
    last_modified: DateTime<Utc>,
    predicates: &ConditionalPredicates,
    default_status: u16,
) -> u16 {
    if let Some(ref if_match) = predicates.if_match {
        if if_match != etag {
            return STATUS_PRECONDITION_FAILED;
        }
    }

    if let Some(ref if_none_match) = predicates.if_none_match {
        if if_none_match == etag {
            return STATUS_NOT_MODIFIED;
        }
    }

    if let Some(since) = predicates.if_modified_since {
        if last_modified <= since {
            return STATUS_NOT_MODIFIED;
        }
    }

    if let Some(since) = predicates.if_unmodified_since {
        if last_modified > since {
            return STATUS_PRECONDITION_FAILED;
        }
    }

    default_status
}

/// Parse a stored catalog timestamp. A bad value is a server-side fault.
pub fn parse_last_modified(value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            AppError::Internal(format!("problem parsing timestamp '{}': {}", value, e))
        })
}

/// Parse an `If-Modified-Since` style header (IMF-fixdate). A bad value is
/// the caller's fault.
pub fn parse_http_date(value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::InvalidInput(format!("invalid date '{}': {}", value, e)))
}

/// Format a timestamp for `Last-Modified`.
pub fn format_http_date(value: DateTime<Utc>) -> String {
    value.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
