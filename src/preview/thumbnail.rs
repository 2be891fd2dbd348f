use crate::config::ThumbnailSize;
use crate::error::Result;
use image::{imageops::FilterType, ColorType, DynamicImage, ImageFormat};
use std::io::Cursor;

/// Shrink `image` to fit inside `size`, keeping its aspect ratio.
/// Images that already fit are returned untouched (never upscaled).
pub fn shrink_to_fit(image: DynamicImage, size: ThumbnailSize) -> DynamicImage {
    if image.width() <= size.width && image.height() <= size.height {
        return image;
    }
    image.resize(size.width, size.height, FilterType::Lanczos3)
}

/// Encode as PNG in memory
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    // PNG has no float pixel formats
    match image.color() {
        ColorType::Rgb32F | ColorType::Rgba32F => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut bytes, ImageFormat::Png)?
        }
        _ => image.write_to(&mut bytes, ImageFormat::Png)?,
    }
    Ok(bytes.into_inner())
}

pub fn encode_thumbnail(image: DynamicImage, size: ThumbnailSize) -> Result<Vec<u8>> {
    encode_png(&shrink_to_fit(image, size))
}
