//! Request parameters read from headers and the query string.
//!
//! Each download endpoint has its own parameter type; all of them expose the
//! same predicates and image options through [`FileRequestParams`].

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use filegate_core::conditional::parse_http_date;
use filegate_core::{AppError, FileRequestParams, ForwardedHeaders};

/// The four conditional request headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

impl Conditions {
    /// A malformed date header is rejected rather than ignored.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        Ok(Self {
            if_match: header_str(headers, header::IF_MATCH.as_str())?,
            if_none_match: header_str(headers, header::IF_NONE_MATCH.as_str())?,
            if_modified_since: header_str(headers, header::IF_MODIFIED_SINCE.as_str())?
                .map(|v| parse_http_date(&v))
                .transpose()?,
            if_unmodified_since: header_str(headers, header::IF_UNMODIFIED_SINCE.as_str())?
                .map(|v| parse_http_date(&v))
                .transpose()?,
        })
    }
}

/// Image options: `q`, `h`, `w`, `b` and `f`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageOptions {
    pub quality: Option<u8>,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub blur: Option<f32>,
    pub format: Option<String>,
}

impl ImageOptions {
    /// Unknown parameters are ignored; presigned URLs carry their own.
    pub fn from_query(query: Option<&str>) -> Result<Self, AppError> {
        let mut options = ImageOptions::default();
        for (key, value) in query_pairs(query.unwrap_or_default())? {
            match key.as_str() {
                "q" => options.quality = Some(parse_number(&key, &value)?),
                "h" => options.height = Some(parse_number(&key, &value)?),
                "w" => options.width = Some(parse_number(&key, &value)?),
                "b" => options.blur = Some(parse_number(&key, &value)?),
                "f" => options.format = Some(value),
                _ => {}
            }
        }
        Ok(options)
    }
}

/// `GET /v1/files/{id}`
#[derive(Debug, Clone, Default)]
pub struct GetFileParams {
    pub conditions: Conditions,
    pub image: ImageOptions,
}

/// `HEAD /v1/files/{id}`
#[derive(Debug, Clone, Default)]
pub struct FileMetadataParams {
    pub conditions: Conditions,
    pub image: ImageOptions,
}

/// `GET /v1/files/{id}/presignedurl/contents`. The signed `X-Amz-*` fields
/// stay in the raw query and are read by the service.
#[derive(Debug, Clone, Default)]
pub struct PresignedFileParams {
    pub conditions: Conditions,
    pub image: ImageOptions,
    pub raw_query: String,
}

impl GetFileParams {
    pub fn from_request(headers: &HeaderMap, query: Option<&str>) -> Result<Self, AppError> {
        Ok(Self {
            conditions: Conditions::from_headers(headers)?,
            image: ImageOptions::from_query(query)?,
        })
    }
}

impl FileMetadataParams {
    pub fn from_request(headers: &HeaderMap, query: Option<&str>) -> Result<Self, AppError> {
        Ok(Self {
            conditions: Conditions::from_headers(headers)?,
            image: ImageOptions::from_query(query)?,
        })
    }
}

impl PresignedFileParams {
    pub fn from_request(headers: &HeaderMap, query: Option<&str>) -> Result<Self, AppError> {
        Ok(Self {
            conditions: Conditions::from_headers(headers)?,
            image: ImageOptions::from_query(query)?,
            raw_query: query.unwrap_or_default().to_string(),
        })
    }
}

macro_rules! impl_file_request_params {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FileRequestParams for $ty {
                fn if_match(&self) -> Option<&str> {
                    self.conditions.if_match.as_deref()
                }
                fn if_none_match(&self) -> Option<&str> {
                    self.conditions.if_none_match.as_deref()
                }
                fn if_modified_since(&self) -> Option<DateTime<Utc>> {
                    self.conditions.if_modified_since
                }
                fn if_unmodified_since(&self) -> Option<DateTime<Utc>> {
                    self.conditions.if_unmodified_since
                }
                fn quality(&self) -> Option<u8> {
                    self.image.quality
                }
                fn height(&self) -> Option<u32> {
                    self.image.height
                }
                fn width(&self) -> Option<u32> {
                    self.image.width
                }
                fn blur(&self) -> Option<f32> {
                    self.image.blur
                }
                fn format(&self) -> Option<&str> {
                    self.image.format.as_deref()
                }
            }
        )+
    };
}

impl_file_request_params!(GetFileParams, FileMetadataParams, PresignedFileParams);

/// `Accept` media ranges in the order the client sent them.
pub fn accept_list(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

pub fn range_header(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    header_str(headers, header::RANGE.as_str())
}

/// Trust headers replayed to the metadata catalog.
pub fn forwarded_headers(headers: &HeaderMap) -> ForwardedHeaders {
    ForwardedHeaders::from_pairs(
        headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?.to_string()))),
    )
}

fn header_str(headers: &HeaderMap, name: &str) -> Result<Option<String>, AppError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map(str::to_string)
                .map_err(|_| AppError::InvalidInput(format!("invalid {} header", name)))
        })
        .transpose()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
    value
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("invalid value for '{}': {}", key, value)))
}

fn query_pairs(query: &str) -> Result<Vec<(String, String)>, AppError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(&s.replace('+', " "))
                    .map(|v| v.into_owned())
                    .map_err(|e| AppError::InvalidInput(format!("invalid query string: {}", e)))
            };
            Ok((decode(key)?, decode(value)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_image_options_from_query() {
        let options = ImageOptions::from_query(Some("w=100&h=50&q=80&b=1.5&f=auto&other=x")).unwrap();
        assert_eq!(options.width, Some(100));
        assert_eq!(options.height, Some(50));
        assert_eq!(options.quality, Some(80));
        assert_eq!(options.blur, Some(1.5));
        assert_eq!(options.format.as_deref(), Some("auto"));
    }

    #[test]
    fn test_image_options_reject_bad_numbers() {
        let err = ImageOptions::from_query(Some("w=wide")).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(ImageOptions::from_query(Some("q=300")).is_err());
    }

    #[test]
    fn test_conditions_parse_dates() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"abc\""));
        headers.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );

        let conditions = Conditions::from_headers(&headers).unwrap();
        assert_eq!(conditions.if_none_match.as_deref(), Some("\"abc\""));
        assert_eq!(
            conditions.if_modified_since.unwrap().to_rfc3339(),
            "2015-10-21T07:28:00+00:00"
        );
    }

    #[test]
    fn test_malformed_date_is_invalid_input() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_UNMODIFIED_SINCE, HeaderValue::from_static("yesterday"));
        assert!(matches!(
            Conditions::from_headers(&headers),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_params_expose_both_halves() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MATCH, HeaderValue::from_static("\"e\""));
        let params = PresignedFileParams::from_request(&headers, Some("w=10&X-Amz-Expires=30")).unwrap();
        assert_eq!(params.if_match(), Some("\"e\""));
        assert_eq!(params.width(), Some(10));
        assert!(params.wants_derivative());
        assert!(params.raw_query.contains("X-Amz-Expires=30"));
    }

    #[test]
    fn test_accept_list_splits_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("image/avif, image/webp;q=0.9, */*"),
        );
        assert_eq!(
            accept_list(&headers),
            vec!["image/avif", "image/webp;q=0.9", "*/*"]
        );
    }

    #[test]
    fn test_forwarded_headers_keep_trust_headers_only() {
        let mut headers = HeaderMap::new();
        headers.insert("x-hasura-role", HeaderValue::from_static("user"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let forwarded = forwarded_headers(&headers);
        assert_eq!(forwarded.get("x-hasura-role"), Some("user"));
        assert!(forwarded.get("content-type").is_none());
    }
}
