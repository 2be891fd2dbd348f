use super::Processor;
use crate::error::{Error, Result};
use image::{DynamicImage, RgbaImage};
use once_cell::sync::Lazy;
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use std::path::Path;
use tracing::error;

pub const PDF_EXTENSIONS: [&str; 1] = [".pdf"];

// This path is relative to the running binary
const BINDING_LOCATION: &str = "./";

static PDFIUM: Lazy<Option<Pdfium>> = Lazy::new(|| {
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(BINDING_LOCATION))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|err| error!("could not load libpdfium: {err:?}"))
        .ok()
});

/// First page of a PDF, rendered at its native size (1pt = 1px)
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfProcessor;

impl Processor for PdfProcessor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &PDF_EXTENSIONS
    }

    fn decode(&self, path: &Path) -> Result<DynamicImage> {
        let pdfium = PDFIUM.as_ref().ok_or(Error::PdfiumUnavailable)?;

        // Encrypted documents fail here: no password is ever supplied
        let document = pdfium.load_pdf_from_file(path, None)?;
        let page = document.pages().first()?;

        let width = page.width().value.round().max(1.0) as i32;
        let height = page.height().value.round().max(1.0) as i32;
        let render_config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_target_height(height);

        let bitmap = page.render_with_config(&render_config)?;
        let bitmap_width =
            u32::try_from(bitmap.width()).map_err(|_| Error::Pdf("negative bitmap width".into()))?;
        let bitmap_height =
            u32::try_from(bitmap.height()).map_err(|_| Error::Pdf("negative bitmap height".into()))?;

        RgbaImage::from_raw(bitmap_width, bitmap_height, bitmap.as_rgba_bytes())
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| Error::Pdf("bitmap size does not match its pixel buffer".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThumbnailSize;
    use crate::content::ContentStore;
    use std::fs;

    #[test]
    fn only_pdf_extensions() {
        assert!(PdfProcessor.can_handle(Path::new("report.pdf")));
        assert!(PdfProcessor.can_handle(Path::new("REPORT.PDF")));
        assert!(!PdfProcessor.can_handle(Path::new("report.pdf.txt")));
    }

    #[test]
    fn broken_documents_fail_softly() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(dir.path().join("thumbnails"), dir.path().join("files"));
        store.prepare().unwrap();

        let corrupt = dir.path().join("corrupt.pdf");
        let empty = dir.path().join("empty.pdf");
        fs::write(&corrupt, b"%PDF-1.7\nthis is not really a pdf").unwrap();
        fs::write(&empty, b"").unwrap();

        // Holds whether or not libpdfium is installed
        for path in [&corrupt, &empty] {
            let result = PdfProcessor.make_thumbnail(path, &store, ThumbnailSize::default());
            assert!(matches!(result, Ok(None)));
        }
    }
}
