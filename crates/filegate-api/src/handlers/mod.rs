pub mod files;
pub mod health;
pub mod ops;
pub mod presigned;
pub mod response;
