//! Turn a [`RenderedFile`] into an HTTP response.

use crate::error::HttpAppError;
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use filegate_core::conditional::{format_http_date, STATUS_NOT_MODIFIED, STATUS_PRECONDITION_FAILED};
use filegate_core::AppError;
use filegate_services::RenderedFile;
use futures::StreamExt;

fn header_value(value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::Internal(format!("invalid header value '{}': {}", value, e)))
}

fn content_disposition(filename: &str) -> String {
    format!("inline; filename=\"{}\"", urlencoding::encode(filename))
}

/// Status, validators and caching headers always; content headers and the
/// body only when there is content to send. For HEAD the body is already
/// gone but the content headers stay.
pub fn file_response(rendered: RenderedFile) -> Result<Response, HttpAppError> {
    let status = StatusCode::from_u16(rendered.status)
        .map_err(|e| AppError::Internal(format!("invalid status {}: {}", rendered.status, e)))?;
    let bodiless = rendered.status == STATUS_NOT_MODIFIED
        || rendered.status == STATUS_PRECONDITION_FAILED;

    let mut response = Response::builder().status(status).body(Body::empty()).map_err(|e| {
        tracing::error!(error = %e, "Failed to build response");
        AppError::Internal(e.to_string())
    })?;

    let headers = response.headers_mut();
    headers.insert(header::ETAG, header_value(&rendered.etag)?);
    headers.insert(
        header::LAST_MODIFIED,
        header_value(&format_http_date(rendered.last_modified))?,
    );
    headers.insert(header::CACHE_CONTROL, header_value(&rendered.cache_control)?);

    if bodiless {
        return Ok(response);
    }

    headers.insert(header::CONTENT_TYPE, header_value(&rendered.mime_type)?);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(rendered.content_length));
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(&content_disposition(&rendered.filename))?,
    );
    for (name, value) in &rendered.extra_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::Internal(format!("invalid header name '{}': {}", name, e)))?;
        headers.insert(name, header_value(value)?);
    }

    if let Some(body) = rendered.body {
        let body_stream = body.map(|result| {
            result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
        });
        *response.body_mut() = Body::from_stream(body_stream);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use filegate_storage::{ByteStream, StorageError};

    fn rendered(status: u16, body: Option<&'static [u8]>) -> RenderedFile {
        RenderedFile {
            status,
            body: body.map(|b| {
                Box::pin(futures::stream::once(async move {
                    Ok::<_, StorageError>(Bytes::from_static(b))
                })) as ByteStream
            }),
            content_length: body.map(|b| b.len() as u64).unwrap_or(0),
            filename: "my file.txt".to_string(),
            mime_type: "text/plain".to_string(),
            etag: "\"abc\"".to_string(),
            last_modified: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            cache_control: "max-age=3600".to_string(),
            extra_headers: vec![("Accept-Ranges".to_string(), "bytes".to_string())],
        }
    }

    #[tokio::test]
    async fn test_full_response_headers_and_body() {
        let response = file_response(rendered(200, Some(b"hello"))).unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ETAG], "\"abc\"");
        assert_eq!(headers[header::LAST_MODIFIED], "Fri, 01 Mar 2024 12:00:00 GMT");
        assert_eq!(headers[header::CONTENT_LENGTH], "5");
        assert_eq!(headers[header::CONTENT_DISPOSITION], "inline; filename=\"my%20file.txt\"");
        assert_eq!(headers["accept-ranges"], "bytes");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_not_modified_has_validators_only() {
        let response = file_response(rendered(304, None)).unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[header::ETAG], "\"abc\"");
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }
}
