//! Image derivative generation

pub mod encode;
pub mod format;
pub mod options;
pub mod orientation;
pub mod pipeline;
pub mod transform;

pub use format::{FormatRequest, OutputFormat};
pub use options::{derivative_options, DerivativeOptions, DEFAULT_MAX_DIMENSION};
pub use pipeline::ImagePipeline;
