//! Walker configuration
//!
//! The configuration is an explicit value handed to `lifecycle::launch` and
//! threaded through the walk. Nothing here is global.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extensions handled out of the box (lower-case, leading dot)
pub const DEFAULT_EXTENSIONS: [&str; 7] = [".png", ".jpg", ".jpeg", ".gif", ".bmp", ".pdf", ".stl"];

/// Bounding box every thumbnail is shrunk to fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory tree to scan
    pub root_dir: PathBuf,
    /// Base directory for `thumbnails/` and `files/`
    #[serde(default = "default_resources_dir")]
    pub resources_dir: PathBuf,
    /// SQLite file backing the status store
    pub database_path: PathBuf,
    #[serde(default = "default_extensions")]
    pub supported_extensions: Vec<String>,
    #[serde(default)]
    pub thumbnail_size: ThumbnailSize,
}

impl Config {
    pub fn new(
        root_dir: impl Into<PathBuf>,
        resources_dir: impl Into<PathBuf>,
        database_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            resources_dir: resources_dir.into(),
            database_path: database_path.into(),
            supported_extensions: default_extensions(),
            thumbnail_size: ThumbnailSize::default(),
        }
    }

    /// Load a configuration from a JSON file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&raw)?;
        config.normalize_extensions();
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable before a walk starts.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("database path is not set".into()));
        }
        if self.root_dir.as_os_str().is_empty() {
            return Err(Error::Config("root directory is not set".into()));
        }
        if !self.root_dir.is_dir() {
            return Err(Error::Config(format!(
                "root directory {} does not exist",
                self.root_dir.display()
            )));
        }
        if self.thumbnail_size.width == 0 || self.thumbnail_size.height == 0 {
            return Err(Error::Config("thumbnail size must be non-zero".into()));
        }
        if let Some(bad) = self
            .supported_extensions
            .iter()
            .find(|ext| !ext.starts_with('.') || ext.len() < 2)
        {
            return Err(Error::Config(format!(
                "extension {bad:?} must start with a dot"
            )));
        }
        Ok(())
    }

    /// Lower-case every configured extension
    pub fn normalize_extensions(&mut self) {
        for ext in &mut self.supported_extensions {
            *ext = ext.to_lowercase();
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_extensions = extensions.into_iter().map(Into::into).collect();
        self.normalize_extensions();
        self
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        lowercase_extension(path)
            .is_some_and(|ext| self.supported_extensions.iter().any(|s| *s == ext))
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.resources_dir.join("thumbnails")
    }

    pub fn files_dir(&self) -> PathBuf {
        self.resources_dir.join("files")
    }
}

/// Extension of `path` lower-cased with its leading dot (`IMAGE.JPG` -> `.jpg`)
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| (*ext).to_string()).collect()
}

/// ~/.cache/file-explorer/resources on Linux
pub fn default_resources_dir() -> PathBuf {
    let mut path = dirs::cache_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir);
    path.push("file-explorer");
    path.push("resources");
    path
}
