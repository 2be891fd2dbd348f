//! Error types for the preview pipeline
//!
//! Decode failures (corrupt image, encrypted PDF, degenerate mesh) are
//! turned into a missing thumbnail by the processors. Everything else
//! (filesystem, database, configuration) propagates to the caller.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("there was an i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("status store error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("error while loading the image (via the `image` crate): {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("error while walking the directory tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("libpdfium could not be loaded")]
    PdfiumUnavailable,
    #[error("error while rendering the pdf: {0}")]
    Pdf(String),
    #[error("error while rendering the mesh: {0}")]
    Mesh(String),
    #[error("the rendered preview has no visible pixels")]
    EmptyRender,

    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid path provided: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("a walk is already running against {}", .0.display())]
    WalkInProgress(PathBuf),
    #[error("background walk did not complete: {0}")]
    Join(String),
}

impl From<pdfium_render::prelude::PdfiumError> for Error {
    fn from(value: pdfium_render::prelude::PdfiumError) -> Self {
        Self::Pdf(format!("{value:?}"))
    }
}
