use super::Processor;
use crate::error::Result;
use image::{DynamicImage, ImageReader};
use std::path::Path;

pub const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".bmp"];

/// Raster images decoded with the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageProcessor;

impl Processor for ImageProcessor {
    fn name(&self) -> &'static str {
        "image"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &IMAGE_EXTENSIONS
    }

    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        // Sniff the format from the bytes so a mislabeled extension still decodes
        Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
    }
}
