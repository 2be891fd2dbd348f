//! Background preview pipeline for a browsable directory tree.
//!
//! A single walk enumerates the root directory, hands each supported file to
//! the first matching [`preview::Processor`], stores the thumbnail and a data
//! reference under content-addressed names ([`content::ContentStore`]) and
//! records the outcome in the [`state::StatusStore`]. The web tier only reads
//! the status store and the two resource directories.

pub mod config;
pub mod content;
pub mod error;
pub mod lifecycle;
pub mod preview;
pub mod state;
pub mod walker;

pub use config::{Config, ThumbnailSize};
pub use content::ContentStore;
pub use error::{Error, Result};
pub use lifecycle::{launch, WalkHandle};
pub use state::{FileInfo, FileKind, StatusStore, ThumbnailStatus};
pub use walker::{WalkSummary, Walker};
