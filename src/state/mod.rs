/// Status store module
///
/// This module handles everything the web tier reads back:
/// - Per-file thumbnail and data-file records (library.rs)
/// - Status and file-kind types (data.rs)
/// - File lookups by path relative to the root (info.rs)

pub mod data;
pub mod info;
pub mod library;

pub use data::{FileKind, ThumbnailStatus};
pub use info::FileInfo;
pub use library::{normalize_path, StatusStore};
