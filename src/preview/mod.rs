/// Preview generation
///
/// This module handles:
/// - Deciding which processor owns a file (by lower-cased extension)
/// - Decoding images, PDFs and STL meshes into rasters
/// - Shrinking and PNG-encoding the raster into a thumbnail
/// - Handing thumbnails and data files to the content store
pub mod mesh;
pub mod pdf;
pub mod raster;
pub mod thumbnail;

use crate::config::{lowercase_extension, ThumbnailSize};
use crate::content::ContentStore;
use crate::error::Result;
use image::DynamicImage;
use std::path::Path;
use tracing::warn;

pub use mesh::MeshProcessor;
pub use pdf::PdfProcessor;
pub use raster::ImageProcessor;

/// One family of previewable files.
///
/// Processors are stateless and built once per walk. Only `decode` differs
/// between variants; thumbnailing and data references are shared.
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower-case extensions with their leading dot
    fn extensions(&self) -> &'static [&'static str];

    /// Decode the file into a raster at its native size
    fn decode(&self, path: &Path) -> Result<DynamicImage>;

    fn can_handle(&self, path: &Path) -> bool {
        lowercase_extension(path).is_some_and(|ext| self.extensions().contains(&ext.as_str()))
    }

    /// Decode, shrink and store a thumbnail.
    ///
    /// `Ok(None)` means the file could not be decoded. `Err` is reserved for
    /// failures writing the artifact.
    fn make_thumbnail(
        &self,
        path: &Path,
        store: &ContentStore,
        size: ThumbnailSize,
    ) -> Result<Option<String>> {
        let image = match self.decode(path) {
            Ok(image) => image,
            Err(e) => {
                warn!(path = %path.display(), processor = self.name(), error = %e, "could not decode file");
                return Ok(None);
            }
        };

        let png = match thumbnail::encode_thumbnail(image, size) {
            Ok(png) => png,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not encode thumbnail");
                return Ok(None);
            }
        };

        store.store_thumbnail(&png).map(Some)
    }

    fn make_data_file(&self, path: &Path, store: &ContentStore) -> Result<String> {
        store.store_data_reference(path)
    }
}

/// Processors in dispatch order
pub fn default_processors() -> Vec<Box<dyn Processor>> {
    vec![
        Box::new(ImageProcessor),
        Box::new(PdfProcessor),
        Box::new(MeshProcessor),
    ]
}

/// First processor that claims `path`
pub fn find_processor<'a>(processors: &'a [Box<dyn Processor>], path: &Path) -> Option<&'a dyn Processor> {
    processors
        .iter()
        .find(|processor| processor.can_handle(path))
        .map(|processor| processor.as_ref())
}
