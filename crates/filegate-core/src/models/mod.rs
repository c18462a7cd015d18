pub mod bucket;
pub mod file;
pub mod session;

pub use bucket::BucketPolicy;
pub use file::{FileRecord, FileSummary, FileUpdate, NewFile, VirusRecord};
pub use session::ForwardedHeaders;
