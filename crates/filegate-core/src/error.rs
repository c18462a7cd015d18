//! Error types module
//!
//! Every failure the gateway can report is an `AppError`. Variants describe
//! themselves through [`ErrorMetadata`] so the HTTP layer can render a single
//! [`ErrorEnvelope`] without knowing where the error came from.

use serde::Serialize;
use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for refused requests (virus, forbidden)
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "FILE_TOO_BIG")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;

    /// Structured payload attached to the response, if any
    fn structured_data(&self) -> Option<serde_json::Value>;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("file {filename} too small: {size} bytes, minimum is {min_size}")]
    FileTooSmall {
        filename: String,
        size: i64,
        min_size: i64,
    },

    #[error("file {filename} too big: {size} bytes, maximum is {max_size}")]
    FileTooBig {
        filename: String,
        size: i64,
        max_size: i64,
    },

    #[error("number of metadata entries ({metadata}) does not match number of files ({files})")]
    MetadataLengthMismatch { files: usize, metadata: usize },

    #[error("image manipulation features are not supported for '{0}'")]
    UnsupportedMimeType(String),

    #[error("signature already expired")]
    SignatureExpired,

    #[error("Range not satisfiable: {0}")]
    RangeNotSatisfiable(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("virus found in {filename}: {virus}")]
    VirusFound { filename: String, virus: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Virus scanner error: {0}")]
    Scanner(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, sensitive, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, bool, LogLevel) {
    match err {
        AppError::InvalidInput(_) => (400, "INVALID_INPUT", false, false, LogLevel::Debug),
        AppError::FileTooSmall { .. } => (400, "FILE_TOO_SMALL", false, false, LogLevel::Debug),
        AppError::FileTooBig { .. } => (400, "FILE_TOO_BIG", false, false, LogLevel::Debug),
        AppError::MetadataLengthMismatch { .. } => {
            (400, "METADATA_LENGTH_MISMATCH", false, false, LogLevel::Debug)
        }
        AppError::UnsupportedMimeType(_) => {
            (400, "UNSUPPORTED_MIME_TYPE", false, false, LogLevel::Debug)
        }
        AppError::SignatureExpired => (400, "SIGNATURE_EXPIRED", false, false, LogLevel::Debug),
        AppError::RangeNotSatisfiable(_) => {
            (416, "RANGE_NOT_SATISFIABLE", false, false, LogLevel::Debug)
        }
        AppError::Forbidden(_) => (403, "FORBIDDEN", false, false, LogLevel::Warn),
        AppError::VirusFound { .. } => (403, "VIRUS_FOUND", false, false, LogLevel::Warn),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, false, LogLevel::Debug),
        AppError::AlreadyExists(_) => (409, "ALREADY_EXISTS", false, false, LogLevel::Debug),
        AppError::Storage(_) => (500, "STORAGE_ERROR", true, true, LogLevel::Error),
        AppError::Metadata(_) => (500, "METADATA_ERROR", true, true, LogLevel::Error),
        AppError::Scanner(_) => (500, "VIRUS_SCANNER_ERROR", true, true, LogLevel::Error),
        AppError::ImageProcessing(_) => {
            (500, "IMAGE_PROCESSING_ERROR", false, true, LogLevel::Error)
        }
        AppError::Internal(_) | AppError::InternalWithSource { .. } => {
            (500, "INTERNAL_ERROR", true, true, LogLevel::Error)
        }
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::FileTooSmall { .. } => "FileTooSmall",
            AppError::FileTooBig { .. } => "FileTooBig",
            AppError::MetadataLengthMismatch { .. } => "MetadataLengthMismatch",
            AppError::UnsupportedMimeType(_) => "UnsupportedMimeType",
            AppError::SignatureExpired => "SignatureExpired",
            AppError::RangeNotSatisfiable(_) => "RangeNotSatisfiable",
            AppError::Forbidden(_) => "Forbidden",
            AppError::VirusFound { .. } => "VirusFound",
            AppError::NotFound(_) => "NotFound",
            AppError::AlreadyExists(_) => "AlreadyExists",
            AppError::Storage(_) => "Storage",
            AppError::Metadata(_) => "Metadata",
            AppError::Scanner(_) => "Scanner",
            AppError::ImageProcessing(_) => "ImageProcessing",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }

    /// Collapse this error into the envelope that crosses into the HTTP layer.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            status: self.http_status_code(),
            code: self.error_code(),
            message: self.client_message(),
            detail: self.detailed_message(),
            data: self.structured_data(),
        }
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::Forbidden(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::AlreadyExists(ref msg) => msg.clone(),
            AppError::RangeNotSatisfiable(ref msg) => msg.clone(),
            AppError::VirusFound { .. } => "virus found".to_string(),
            AppError::Storage(_) => "problem accessing storage".to_string(),
            AppError::Metadata(_) => "problem accessing metadata".to_string(),
            AppError::Scanner(_) => "problem scanning file for viruses".to_string(),
            AppError::ImageProcessing(_) => "problem processing image".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    fn structured_data(&self) -> Option<serde_json::Value> {
        match self {
            AppError::FileTooSmall {
                filename,
                size,
                min_size,
            } => Some(serde_json::json!({
                "filename": filename,
                "size": size,
                "minSize": min_size,
            })),
            AppError::FileTooBig {
                filename,
                size,
                max_size,
            } => Some(serde_json::json!({
                "filename": filename,
                "size": size,
                "maxSize": max_size,
            })),
            AppError::VirusFound { virus, .. } => Some(serde_json::json!({ "virus": virus })),
            _ => None,
        }
    }
}

/// The single shape every failure takes when it leaves the service layer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    #[serde(skip)]
    pub status: u16,
    pub code: &'static str,
    pub message: String,
    /// Internal detail, logged but never sent to clients.
    #[serde(skip)]
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}
