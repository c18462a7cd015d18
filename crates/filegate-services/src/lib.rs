//! Filegate Services Library
//!
//! The file serving engine's stateful half: the upload and replace
//! orchestrator with its compensating saga, inventory reconciliation, virus
//! scanning and the [`FileService`] facade the HTTP layer talks to.

#[cfg(feature = "clamav")]
pub mod clamav;
pub mod content_type;
pub mod files;
pub mod reconcile;
pub mod saga;
pub mod scanner;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;
pub mod upload;

#[cfg(feature = "clamav")]
pub use clamav::ClamAVService;
pub use files::{FileService, PresignedUrl, RenderedFile};
pub use reconcile::{InventoryReport, ReconcileService};
pub use saga::Saga;
pub use scanner::{ScanResult, VirusScanner};
pub use upload::{BatchFailure, FileUpload, UploadMetadata, UploadService};
