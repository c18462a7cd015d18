//! Create, replace and batch upload orchestration

mod service;
mod types;

pub use service::UploadService;
pub use types::{pair_metadata, BatchFailure, FileUpload, UploadMetadata};
