use image::{imageops, DynamicImage};
use std::io::Cursor;

/// Read the EXIF orientation tag (1..=8). Missing or unreadable EXIF is 1.
pub fn read_exif_orientation(data: &[u8]) -> u8 {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif) => exif,
        Err(_) => return 1,
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .and_then(|value| u8::try_from(value).ok())
        .filter(|value| (1..=8).contains(value))
        .unwrap_or(1)
}

/// Rotation and flips needed to bring an EXIF orientation upright.
/// Returns (rotate_angle, flip_horizontal, flip_vertical).
pub fn orientation_transforms(orientation: u8) -> (Option<u16>, bool, bool) {
    match orientation {
        2 => (None, true, false),
        3 => (Some(180), false, false),
        4 => (None, false, true),
        5 => (Some(270), true, false),
        6 => (Some(90), false, false),
        7 => (Some(90), true, false),
        8 => (Some(270), false, false),
        _ => (None, false, false),
    }
}

/// Rotate clockwise by 90, 180 or 270 degrees. Other angles are a no-op.
pub fn rotate_by_angle(img: DynamicImage, angle: u16) -> DynamicImage {
    match angle {
        90 => DynamicImage::ImageRgba8(imageops::rotate90(&img.to_rgba8())),
        180 => DynamicImage::ImageRgba8(imageops::rotate180(&img.to_rgba8())),
        270 => DynamicImage::ImageRgba8(imageops::rotate270(&img.to_rgba8())),
        _ => img,
    }
}

/// Apply the orientation stored in `source`'s EXIF block to `img`.
pub fn auto_orient(mut img: DynamicImage, source: &[u8]) -> DynamicImage {
    let orientation = read_exif_orientation(source);
    if orientation == 1 {
        return img;
    }

    let (rotate, flip_h, flip_v) = orientation_transforms(orientation);
    tracing::debug!(
        orientation = orientation,
        rotate = ?rotate,
        flip_horizontal = flip_h,
        flip_vertical = flip_v,
        "Applying EXIF orientation"
    );

    if let Some(angle) = rotate {
        img = rotate_by_angle(img, angle);
    }
    if flip_h {
        img = DynamicImage::ImageRgba8(imageops::flip_horizontal(&img.to_rgba8()));
    }
    if flip_v {
        img = DynamicImage::ImageRgba8(imageops::flip_vertical(&img.to_rgba8()));
    }

    img
}
