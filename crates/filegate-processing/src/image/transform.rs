use super::encode::encode;
use super::options::DerivativeOptions;
use super::orientation::auto_orient;
use filegate_core::AppError;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Fill in a missing target dimension from the source aspect ratio.
pub fn target_dimensions(
    orig_width: u32,
    orig_height: u32,
    width: Option<u32>,
    height: Option<u32>,
) -> (u32, u32) {
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let aspect_ratio = orig_height as f32 / orig_width as f32;
            let h = (w as f32 * aspect_ratio).round() as u32;
            (w, h.max(1))
        }
        (None, Some(h)) => {
            let aspect_ratio = orig_width as f32 / orig_height as f32;
            let w = (h as f32 * aspect_ratio).round() as u32;
            (w.max(1), h)
        }
        (None, None) => (orig_width, orig_height),
    }
}

/// Cheaper filters for heavy downscales.
pub fn select_filter(orig_width: u32, orig_height: u32, new_width: u32, new_height: u32) -> FilterType {
    let width_ratio = orig_width as f32 / new_width as f32;
    let height_ratio = orig_height as f32 / new_height as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

fn nonzero(value: u32) -> Option<u32> {
    (value > 0).then_some(value)
}

/// Decode, resize-to-fill, auto-orient, blur, encode. CPU bound; call from
/// a blocking thread.
pub fn transform(source: &[u8], opts: &DerivativeOptions) -> Result<Vec<u8>, AppError> {
    let (source_format, target_format) = match (opts.source_format, opts.target_format) {
        (Some(source), Some(target)) => (source, target),
        _ => {
            return Err(AppError::ImageProcessing(
                "derivative options are missing a format".to_string(),
            ))
        }
    };

    let mut img = image::load_from_memory(source).map_err(|e| {
        AppError::ImageProcessing(format!(
            "failed to decode {}: {}",
            source_format.to_mime_type(),
            e
        ))
    })?;

    if opts.width > 0 || opts.height > 0 {
        let (orig_width, orig_height) = img.dimensions();
        let (width, height) = target_dimensions(
            orig_width,
            orig_height,
            nonzero(opts.width),
            nonzero(opts.height),
        );
        let filter = select_filter(orig_width, orig_height, width, height);
        img = img.resize_to_fill(width, height, filter);
    }

    if opts.format_changed() {
        img = auto_orient(img, source);
    }

    if opts.blur > 0.0 {
        img = img.blur(opts.blur);
    }

    encode(&img, target_format, opts.quality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OutputFormat;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([9, 99, 199, 255])));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    fn opts(width: u32, height: u32, target: OutputFormat) -> DerivativeOptions {
        DerivativeOptions {
            width,
            height,
            source_format: Some(OutputFormat::Png),
            target_format: Some(target),
            ..Default::default()
        }
    }

    #[test]
    fn test_target_dimensions_preserve_aspect() {
        assert_eq!(target_dimensions(400, 200, Some(100), None), (100, 50));
        assert_eq!(target_dimensions(400, 200, None, Some(100)), (200, 100));
        assert_eq!(target_dimensions(400, 200, Some(30), Some(30)), (30, 30));
        assert_eq!(target_dimensions(1000, 1, Some(10), None), (10, 1));
    }

    #[test]
    fn test_select_filter() {
        assert_eq!(select_filter(1000, 1000, 100, 100), FilterType::Triangle);
        assert_eq!(select_filter(180, 180, 100, 100), FilterType::CatmullRom);
        assert_eq!(select_filter(100, 100, 100, 100), FilterType::Lanczos3);
    }

    #[test]
    fn test_resize_to_fill_crops_to_exact_box() {
        let out = transform(&png(40, 20), &opts(10, 10, OutputFormat::Png)).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (10, 10));
    }

    #[test]
    fn test_width_only_keeps_aspect() {
        let out = transform(&png(40, 20), &opts(20, 0, OutputFormat::Png)).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (20, 10));
    }

    #[test]
    fn test_format_change_to_jpeg() {
        let out = transform(&png(16, 16), &opts(0, 0, OutputFormat::Jpeg)).unwrap();
        assert_eq!(
            image::guess_format(&out).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_avif_source_renders_derivative() {
        let avif = transform(&png(32, 16), &opts(0, 0, OutputFormat::Avif)).unwrap();
        assert_eq!(image::guess_format(&avif).unwrap(), ImageFormat::Avif);

        let options = DerivativeOptions {
            width: 8,
            source_format: Some(OutputFormat::Avif),
            target_format: Some(OutputFormat::Png),
            ..Default::default()
        };
        let out = transform(&avif, &options).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (8, 4));
    }

    #[test]
    fn test_blur_keeps_dimensions() {
        let mut options = opts(0, 0, OutputFormat::Png);
        options.blur = 2.0;
        let out = transform(&png(12, 8), &options).unwrap();
        assert_eq!(image::load_from_memory(&out).unwrap().dimensions(), (12, 8));
    }

    #[test]
    fn test_garbage_input_is_processing_error() {
        let err = transform(b"definitely not a png", &opts(5, 5, OutputFormat::Png)).unwrap_err();
        assert!(matches!(err, AppError::ImageProcessing(_)));
    }
}
