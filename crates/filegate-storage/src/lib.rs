//! Filegate Storage Library
//!
//! Content store abstraction and its S3 and local filesystem implementations.
//!
//! # Storage key format
//!
//! Every backend stores a file at `{bucket_id}/{file_id}`. Key generation is
//! centralized in the `keys` module so backends and inventory reconciliation
//! agree on the layout.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod range;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use filegate_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use range::ByteRange;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, ContentStore, ObjectResponse, StorageError, StorageResult};
