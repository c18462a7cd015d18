//! Filegate Processing Library
//!
//! On-the-fly image derivatives: option parsing and output format
//! negotiation, the transform itself (resize, orientation, blur, encode) and
//! a bounded pipeline that runs transforms on the blocking pool.

pub mod buffer_pool;
#[cfg(feature = "image")]
pub mod image;

pub use buffer_pool::{BufferPool, PooledBuffer};
#[cfg(feature = "image")]
pub use self::image::{
    derivative_options, DerivativeOptions, FormatRequest, ImagePipeline, OutputFormat,
};
