use chrono::{DateTime, Utc};

use crate::conditional::ConditionalPredicates;

/// What a download request can ask for: the four conditional predicates
/// and the five image derivative options.
///
/// Implemented by each request shape the HTTP layer accepts (plain
/// download, metadata-only, presigned download) so the gateway can treat
/// them uniformly.
pub trait FileRequestParams: Send + Sync {
    fn if_match(&self) -> Option<&str>;
    fn if_none_match(&self) -> Option<&str>;
    fn if_modified_since(&self) -> Option<DateTime<Utc>>;
    fn if_unmodified_since(&self) -> Option<DateTime<Utc>>;

    /// `q`: encoder quality, 0 for the format default.
    fn quality(&self) -> Option<u8>;
    /// `h`
    fn height(&self) -> Option<u32>;
    /// `w`
    fn width(&self) -> Option<u32>;
    /// `b`: gaussian blur sigma.
    fn blur(&self) -> Option<f32>;
    /// `f`: output format token.
    fn format(&self) -> Option<&str>;

    fn predicates(&self) -> ConditionalPredicates {
        ConditionalPredicates {
            if_match: self.if_match().map(str::to_string),
            if_none_match: self.if_none_match().map(str::to_string),
            if_modified_since: self.if_modified_since(),
            if_unmodified_since: self.if_unmodified_since(),
        }
    }

    /// True when any image option is present.
    fn wants_derivative(&self) -> bool {
        self.quality().is_some_and(|q| q > 0)
            || self.height().is_some_and(|h| h > 0)
            || self.width().is_some_and(|w| w > 0)
            || self.blur().is_some_and(|b| b > 0.0)
            || self
                .format()
                .is_some_and(|f| !f.is_empty() && !f.eq_ignore_ascii_case("same"))
    }
}

/// Owned request parameters, as parsed from headers and query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileRequest {
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_unmodified_since: Option<DateTime<Utc>>,
    pub quality: Option<u8>,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub blur: Option<f32>,
    pub format: Option<String>,
}

impl FileRequestParams for FileRequest {
    fn if_match(&self) -> Option<&str> {
        self.if_match.as_deref()
    }
    fn if_none_match(&self) -> Option<&str> {
        self.if_none_match.as_deref()
    }
    fn if_modified_since(&self) -> Option<DateTime<Utc>> {
        self.if_modified_since
    }
    fn if_unmodified_since(&self) -> Option<DateTime<Utc>> {
        self.if_unmodified_since
    }
    fn quality(&self) -> Option<u8> {
        self.quality
    }
    fn height(&self) -> Option<u32> {
        self.height
    }
    fn width(&self) -> Option<u32> {
        self.width
    }
    fn blur(&self) -> Option<f32> {
        self.blur
    }
    fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates_collects_getters() {
        let params = FileRequest {
            if_match: Some("\"e\"".to_string()),
            ..Default::default()
        };
        let predicates = params.predicates();
        assert_eq!(predicates.if_match.as_deref(), Some("\"e\""));
        assert!(predicates.if_none_match.is_none());
    }

    #[test]
    fn test_wants_derivative() {
        assert!(!FileRequest::default().wants_derivative());
        assert!(!FileRequest {
            format: Some("same".to_string()),
            ..Default::default()
        }
        .wants_derivative());
        assert!(!FileRequest {
            quality: Some(0),
            width: Some(0),
            ..Default::default()
        }
        .wants_derivative());
        assert!(FileRequest {
            width: Some(10),
            ..Default::default()
        }
        .wants_derivative());
        assert!(FileRequest {
            format: Some("auto".to_string()),
            ..Default::default()
        }
        .wants_derivative());
    }
}
