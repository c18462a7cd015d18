//! Filegate Core Library
//!
//! Domain models, error types, configuration and the pure pieces of the
//! file serving engine (conditional requests, presigned query handling)
//! shared by every filegate crate.

pub mod conditional;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod presigned;
pub mod request;
pub mod storage_types;

// Re-export commonly used types
pub use conditional::ConditionalPredicates;
pub use config::Config;
pub use error::{AppError, ErrorEnvelope, ErrorMetadata, LogLevel};
pub use models::{
    BucketPolicy, FileRecord, FileSummary, FileUpdate, ForwardedHeaders, NewFile, VirusRecord,
};
pub use presigned::PresignedQuery;
pub use request::{FileRequest, FileRequestParams};
pub use storage_types::StorageBackend;
