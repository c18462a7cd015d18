use filegate_core::AppError;
use image::ImageFormat;

/// Image formats the pipeline can decode and encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl OutputFormat {
    /// Map a stored mime type to a format; `None` for anything the pipeline
    /// does not handle.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        match essence.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(OutputFormat::Jpeg),
            "image/png" => Some(OutputFormat::Png),
            "image/webp" => Some(OutputFormat::WebP),
            "image/avif" => Some(OutputFormat::Avif),
            _ => None,
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }

    pub fn to_image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::WebP => ImageFormat::WebP,
            OutputFormat::Avif => ImageFormat::Avif,
        }
    }

    /// Encoder quality used when the request leaves it at 0.
    pub fn default_quality(self) -> u8 {
        match self {
            OutputFormat::Jpeg => 75,
            OutputFormat::Png => 0,
            OutputFormat::WebP => 80,
            OutputFormat::Avif => 70,
        }
    }
}

/// The `f` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatRequest {
    /// Keep the original format.
    #[default]
    Same,
    Explicit(OutputFormat),
    /// Pick from the `Accept` header.
    Auto,
}

impl FormatRequest {
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s.to_lowercase().as_str() {
            "" | "same" => Ok(FormatRequest::Same),
            "jpeg" | "jpg" => Ok(FormatRequest::Explicit(OutputFormat::Jpeg)),
            "png" => Ok(FormatRequest::Explicit(OutputFormat::Png)),
            "webp" => Ok(FormatRequest::Explicit(OutputFormat::WebP)),
            "avif" => Ok(FormatRequest::Explicit(OutputFormat::Avif)),
            "auto" => Ok(FormatRequest::Auto),
            _ => Err(AppError::InvalidInput(format!("Invalid format: {}", s))),
        }
    }
}
