//! Content-addressed artifact storage
//!
//! Thumbnails live in `resources/thumbnails/<md5>.png` and data files in
//! `resources/files/<md5><ext>`. Names depend only on bytes, so two source
//! files with the same content share one artifact and storing the same bytes
//! twice never rewrites anything.

use crate::config::Config;
use crate::error::Result;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ContentStore {
    thumbnails_dir: PathBuf,
    files_dir: PathBuf,
}

impl ContentStore {
    pub fn new(thumbnails_dir: impl Into<PathBuf>, files_dir: impl Into<PathBuf>) -> Self {
        Self {
            thumbnails_dir: thumbnails_dir.into(),
            files_dir: files_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.thumbnails_dir(), config.files_dir())
    }

    /// Create both artifact directories. Safe to call repeatedly.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.thumbnails_dir)?;
        fs::create_dir_all(&self.files_dir)?;
        Ok(())
    }

    pub fn thumbnails_dir(&self) -> &Path {
        &self.thumbnails_dir
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Store PNG-encoded thumbnail bytes, returning `<md5>.png`
    pub fn store_thumbnail(&self, png_bytes: &[u8]) -> Result<String> {
        let filename = format!("{}.png", content_hash(png_bytes));
        let written = persist_new(&self.thumbnails_dir, &filename, |file| {
            file.write_all(png_bytes)?;
            file.sync_all()
        })?;
        if written {
            debug!(thumbnail = %filename, "wrote thumbnail");
        }
        Ok(filename)
    }

    /// Link `source` into the files directory as `<md5-of-source><ext>`.
    ///
    /// The extension keeps the source's original spelling. The link is only
    /// created when nothing of that name exists yet.
    pub fn store_data_reference(&self, source: &Path) -> Result<String> {
        let hash = hash_file(source)?;
        let extension = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let filename = format!("{hash}{extension}");
        let destination = self.files_dir.join(&filename);

        // symlink_metadata so a dangling link still counts as taken
        if fs::symlink_metadata(&destination).is_err() {
            let target = fs::canonicalize(source)?;
            match link_reference(&target, &destination) {
                Ok(()) => debug!(data_file = %filename, source = %target.display(), "linked data file"),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(filename)
    }

    pub fn thumbnail_path(&self, filename: &str) -> PathBuf {
        self.thumbnails_dir.join(filename)
    }

    pub fn data_file_path(&self, filename: &str) -> PathBuf {
        self.files_dir.join(filename)
    }
}

/// Write a new artifact through a temporary file in `dir`, then move it to
/// `filename` unless that name is already taken. Returns whether the name was
/// created.
///
/// A failed write never leaves anything under `filename`.
fn persist_new(
    dir: &Path,
    filename: &str,
    write: impl FnOnce(&mut File) -> io::Result<()>,
) -> Result<bool> {
    let destination = dir.join(filename);
    // Same name means same bytes
    if destination.exists() {
        return Ok(false);
    }

    let mut staged = NamedTempFile::new_in(dir)?;
    write(staged.as_file_mut())?;
    match staged.persist_noclobber(&destination) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error.into()),
    }
}

/// Lower-case hex md5 of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Streamed md5 of a file's raw bytes
pub fn hash_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut context = md5::Context::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}

#[cfg(unix)]
fn link_reference(target: &Path, destination: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, destination)
}

#[cfg(not(unix))]
fn link_reference(target: &Path, destination: &Path) -> io::Result<()> {
    // Symlinks need extra privileges on Windows; a hard link keeps one payload
    fs::hard_link(target, destination).or_else(|_| fs::copy(target, destination).map(|_| ()))
}
