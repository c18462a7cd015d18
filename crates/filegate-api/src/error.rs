//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; any `AppError`
//! converts with `?` and renders as one JSON body with the status its
//! metadata declares.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use filegate_core::{AppError, ErrorMetadata, FileRecord, LogLevel};
use filegate_services::BatchFailure;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Files stored before a batch upload failed.
    #[serde(rename = "processedFiles", skip_serializing_if = "Vec::is_empty")]
    pub processed_files: Vec<FileRecord>,
}

impl ErrorResponse {
    fn from_app_error(error: &AppError) -> Self {
        let envelope = error.to_envelope();
        // Internal detail only leaves the process outside production.
        let details = (!is_production_env() && !error.is_sensitive()).then_some(envelope.detail);
        Self {
            error: envelope.message,
            code: envelope.code.to_string(),
            data: envelope.data,
            details,
            processed_files: Vec::new(),
        }
    }
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from filegate-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

fn status_of(error: &AppError) -> StatusCode {
    StatusCode::from_u16(error.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        log_error(&self.0);
        (status_of(&self.0), Json(ErrorResponse::from_app_error(&self.0))).into_response()
    }
}

/// A failed batch upload: the error plus whatever was stored before it.
#[derive(Debug)]
pub struct HttpBatchFailure(pub BatchFailure);

impl From<BatchFailure> for HttpBatchFailure {
    fn from(failure: BatchFailure) -> Self {
        HttpBatchFailure(failure)
    }
}

impl From<AppError> for HttpBatchFailure {
    fn from(error: AppError) -> Self {
        HttpBatchFailure(BatchFailure {
            processed: Vec::new(),
            error,
        })
    }
}

impl IntoResponse for HttpBatchFailure {
    fn into_response(self) -> Response {
        let BatchFailure { processed, error } = self.0;
        log_error(&error);
        let mut body = ErrorResponse::from_app_error(&error);
        body.processed_files = processed;
        (status_of(&error), Json(body)).into_response()
    }
}
