use super::format::{FormatRequest, OutputFormat};
use filegate_core::{AppError, FileRequestParams};

/// What to do to an image before sending it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivativeOptions {
    pub width: u32,
    pub height: u32,
    pub blur: f32,
    /// 0 means the target format's default.
    pub quality: u8,
    pub source_format: Option<OutputFormat>,
    pub target_format: Option<OutputFormat>,
}

impl DerivativeOptions {
    /// True when the original bytes can be sent untouched.
    pub fn is_empty(&self) -> bool {
        self.width == 0
            && self.height == 0
            && self.blur == 0.0
            && self.quality == 0
            && self.source_format == self.target_format
    }

    pub fn format_changed(&self) -> bool {
        self.source_format != self.target_format
    }

    /// Mime type of the rendered output, when it differs from the source.
    pub fn target_mime(&self) -> Option<&'static str> {
        self.target_format.map(OutputFormat::to_mime_type)
    }
}

/// Largest width or height a derivative may ask for.
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

/// Preference order for `f=auto`, first match against `Accept` wins.
const AUTO_PREFERENCE: [(&str, OutputFormat); 4] = [
    ("image/avif", OutputFormat::Avif),
    ("image/webp", OutputFormat::WebP),
    ("image/jpeg", OutputFormat::Jpeg),
    ("image/png", OutputFormat::Png),
];

fn accepts(accept: &[String], mime: &str) -> bool {
    accept
        .iter()
        .flat_map(|value| value.split(','))
        .filter_map(|token| token.split(';').next())
        .any(|token| token.trim().eq_ignore_ascii_case(mime))
}

/// Resolve the output format for a request.
pub fn negotiate(request: FormatRequest, original: OutputFormat, accept: &[String]) -> OutputFormat {
    match request {
        FormatRequest::Same => original,
        FormatRequest::Explicit(format) => format,
        FormatRequest::Auto => AUTO_PREFERENCE
            .iter()
            .find(|(mime, _)| accepts(accept, mime))
            .map(|(_, format)| *format)
            .unwrap_or(original),
    }
}

/// Build derivative options from request parameters.
///
/// Requests without image options yield empty options regardless of the
/// file's type. Requests with options against a type the pipeline cannot
/// decode fail before anything is read.
pub fn derivative_options<P>(
    params: &P,
    original_mime: &str,
    accept: &[String],
    max_dimension: u32,
) -> Result<DerivativeOptions, AppError>
where
    P: FileRequestParams + ?Sized,
{
    if !params.wants_derivative() {
        return Ok(DerivativeOptions::default());
    }

    let source = OutputFormat::from_mime(original_mime)
        .ok_or_else(|| AppError::UnsupportedMimeType(original_mime.to_string()))?;

    let quality = params.quality().unwrap_or(0);
    if quality > 100 {
        return Err(AppError::InvalidInput(format!(
            "quality must be between 0 and 100, got {}",
            quality
        )));
    }

    let blur = params.blur().unwrap_or(0.0);
    if !blur.is_finite() || blur < 0.0 {
        return Err(AppError::InvalidInput(format!(
            "blur must be a positive number, got {}",
            blur
        )));
    }

    let width = params.width().unwrap_or(0);
    let height = params.height().unwrap_or(0);
    if width > max_dimension || height > max_dimension {
        return Err(AppError::InvalidInput(format!(
            "width and height must be at most {}, got {}x{}",
            max_dimension, width, height
        )));
    }

    let request = FormatRequest::parse(params.format().unwrap_or(""))?;
    let target = negotiate(request, source, accept);

    Ok(DerivativeOptions {
        width,
        height,
        blur,
        quality,
        source_format: Some(source),
        target_format: Some(target),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use filegate_core::FileRequest as Params;

    fn accept(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_auto_prefers_webp_over_png() {
        let format = negotiate(
            FormatRequest::Auto,
            OutputFormat::Jpeg,
            &accept(&["image/webp,image/png"]),
        );
        assert_eq!(format, OutputFormat::WebP);
    }

    #[test]
    fn test_auto_prefers_avif_regardless_of_order() {
        let format = negotiate(
            FormatRequest::Auto,
            OutputFormat::Png,
            &accept(&["image/webp", "image/avif;q=0.9"]),
        );
        assert_eq!(format, OutputFormat::Avif);
    }

    #[test]
    fn test_auto_falls_back_to_original() {
        let format = negotiate(FormatRequest::Auto, OutputFormat::Png, &accept(&["*/*"]));
        assert_eq!(format, OutputFormat::Png);
        let format = negotiate(FormatRequest::Auto, OutputFormat::Jpeg, &[]);
        assert_eq!(format, OutputFormat::Jpeg);
    }

    #[test]
    fn test_explicit_and_same() {
        assert_eq!(
            negotiate(
                FormatRequest::Explicit(OutputFormat::Png),
                OutputFormat::Jpeg,
                &accept(&["image/webp"])
            ),
            OutputFormat::Png
        );
        assert_eq!(
            negotiate(FormatRequest::Same, OutputFormat::Jpeg, &accept(&["image/webp"])),
            OutputFormat::Jpeg
        );
    }

    #[test]
    fn test_no_options_is_empty_for_any_type() {
        let opts = derivative_options(&Params::default(), "application/pdf", &[], DEFAULT_MAX_DIMENSION).unwrap();
        assert!(opts.is_empty());
    }

    #[test]
    fn test_options_on_unsupported_type_rejected() {
        let params = Params {
            width: Some(100),
            ..Default::default()
        };
        let err = derivative_options(&params, "application/pdf", &[], DEFAULT_MAX_DIMENSION).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMimeType(ref m) if m == "application/pdf"));
        assert!(err.to_string().contains("application/pdf"));
    }

    #[test]
    fn test_same_format_with_quality_is_not_empty() {
        let params = Params {
            quality: Some(50),
            ..Default::default()
        };
        let opts = derivative_options(&params, "image/jpeg", &[], DEFAULT_MAX_DIMENSION).unwrap();
        assert!(!opts.is_empty());
        assert!(!opts.format_changed());
    }

    #[test]
    fn test_format_only_change_is_not_empty() {
        let params = Params {
            format: Some("auto".to_string()),
            ..Default::default()
        };
        let opts = derivative_options(&params, "image/jpeg", &accept(&["image/webp"]), DEFAULT_MAX_DIMENSION).unwrap();
        assert!(!opts.is_empty());
        assert_eq!(opts.target_format, Some(OutputFormat::WebP));
        assert_eq!(opts.target_mime(), Some("image/webp"));
    }

    #[test]
    fn test_auto_resolving_to_original_with_no_other_option_is_empty() {
        let params = Params {
            format: Some("auto".to_string()),
            ..Default::default()
        };
        let opts = derivative_options(&params, "image/png", &[], DEFAULT_MAX_DIMENSION).unwrap();
        assert!(opts.is_empty());
    }

    #[test]
    fn test_rejects_out_of_range_quality_and_blur() {
        let params = Params {
            quality: Some(101),
            ..Default::default()
        };
        assert!(derivative_options(&params, "image/png", &[], DEFAULT_MAX_DIMENSION).is_err());

        let params = Params {
            width: Some(10),
            blur: Some(-1.0),
            ..Default::default()
        };
        assert!(derivative_options(&params, "image/png", &[], DEFAULT_MAX_DIMENSION).is_err());
    }

    #[test]
    fn test_rejects_dimensions_above_maximum() {
        let params = Params {
            width: Some(100_000),
            height: Some(100_000),
            ..Default::default()
        };
        let err = derivative_options(&params, "image/png", &[], DEFAULT_MAX_DIMENSION).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let params = Params {
            height: Some(600),
            ..Default::default()
        };
        assert!(derivative_options(&params, "image/png", &[], 500).is_err());
        assert!(derivative_options(&params, "image/png", &[], 600).is_ok());
    }
}
