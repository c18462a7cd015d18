use super::format::OutputFormat;
use filegate_core::AppError;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

fn encode_error(format: OutputFormat, err: impl std::fmt::Display) -> AppError {
    AppError::ImageProcessing(format!("failed to encode {}: {}", format.to_mime_type(), err))
}

/// Encode `img` as `format`. A quality of 0 selects the format's default.
pub fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, AppError> {
    let quality = if quality == 0 {
        format.default_quality()
    } else {
        quality.min(100)
    };

    match format {
        OutputFormat::Jpeg => encode_jpeg(img, quality),
        OutputFormat::Png => encode_png(img),
        OutputFormat::WebP => encode_webp(img, quality),
        OutputFormat::Avif => encode_avif(img, quality),
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(quality as f32);
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);

    let mut comp = comp
        .start_compress(Vec::new())
        .map_err(|e| encode_error(OutputFormat::Jpeg, e))?;
    comp.write_scanlines(&rgb)
        .map_err(|e| encode_error(OutputFormat::Jpeg, e))?;
    comp.finish().map_err(|e| encode_error(OutputFormat::Jpeg, e))
}

// PNG is lossless; quality does not apply.
fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, AppError> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| encode_error(OutputFormat::Png, e))?;
    Ok(buffer)
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let (width, height) = img.dimensions();
    let rgba = img.to_rgba8();

    let encoder = webp::Encoder::from_rgba(&rgba, width, height);
    Ok(encoder.encode(quality as f32).to_vec())
}

fn encode_avif(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let (width, height) = img.dimensions();
    let rgb = img.to_rgb8();

    let pixels: Vec<rgb::RGB8> = rgb
        .as_raw()
        .chunks_exact(3)
        .map(|chunk| rgb::RGB8::new(chunk[0], chunk[1], chunk[2]))
        .collect();

    let buffer = ravif::Img::new(pixels.as_slice(), width as usize, height as usize);
    let encoded = ravif::Encoder::new()
        .with_quality(quality as f32)
        .with_speed(6)
        .encode_rgb(buffer)
        .map_err(|e| encode_error(OutputFormat::Avif, e))?;

    Ok(encoded.avif_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, Rgba([200, 10, 10, 255])))
    }

    #[test]
    fn test_encode_png_is_decodable() {
        let bytes = encode(&sample(), OutputFormat::Png, 0).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (8, 6));
    }

    #[test]
    fn test_encode_jpeg_has_soi_marker() {
        let bytes = encode(&sample(), OutputFormat::Jpeg, 60).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_webp_has_riff_header() {
        let bytes = encode(&sample(), OutputFormat::WebP, 0).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }
}
