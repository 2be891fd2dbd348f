/// Shared data structures for the status store
///
/// These types flow between the walker, the status store and the
/// (external) web tier.
use crate::config::lowercase_extension;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// What the web tier reports for a file's thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailStatus {
    /// No row yet: the walk has not reached this file
    Processing,
    /// A row with no artifact: decoding failed
    Error,
    /// Filename of the thumbnail inside `resources/thumbnails`
    Ready(String),
}

impl ThumbnailStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Processing => "processing",
            Self::Error => "error",
            Self::Ready(filename) => filename,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl fmt::Display for ThumbnailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Serialized as the bare string the web tier renders
impl Serialize for ThumbnailStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Family of a previewable file, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Pdf,
    #[serde(rename = "stl")]
    Mesh,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match lowercase_extension(path)?.as_str() {
            ".png" | ".jpg" | ".jpeg" | ".gif" | ".bmp" => Some(Self::Image),
            ".pdf" => Some(Self::Pdf),
            ".stl" => Some(Self::Mesh),
            _ => None,
        }
    }
}
