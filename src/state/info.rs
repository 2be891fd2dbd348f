//! File lookups for the web tier
//!
//! Combines filesystem metadata with the status store so a request handler
//! can answer "what is this file and is its preview ready" in one call.

use super::data::{FileKind, ThumbnailStatus};
use super::library::StatusStore;
use crate::config::Config;
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub relpath: String,
    pub name: String,
    pub size: u64,
    pub kind: Option<FileKind>,
    /// `None` when the extension is not supported (never attempted)
    pub thumbnail: Option<ThumbnailStatus>,
    pub data_file: Option<String>,
}

impl FileInfo {
    /// Look up `relpath` under the configured root.
    ///
    /// Returns `Ok(None)` when the path is not a regular file.
    pub fn lookup(config: &Config, store: &StatusStore, relpath: &str) -> Result<Option<Self>> {
        let path = resolve_relpath(&config.root_dir, relpath)?;
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Ok(None),
        };

        let thumbnail = if config.is_supported(&path) {
            Some(store.thumbnail_status(&path)?)
        } else {
            None
        };

        Ok(Some(FileInfo {
            relpath: relpath.to_string(),
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: metadata.len(),
            kind: FileKind::from_path(&path),
            thumbnail,
            data_file: store.data_reference(&path)?,
        }))
    }
}

/// Join a request path onto the root, refusing anything that could escape it
pub fn resolve_relpath(root: &Path, relpath: &str) -> Result<PathBuf> {
    if relpath.contains("..") || relpath.contains('\\') || Path::new(relpath).is_absolute() {
        return Err(Error::InvalidPath(PathBuf::from(relpath)));
    }
    Ok(root.join(relpath))
}
