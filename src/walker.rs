//! One full pass over the source tree
//!
//! Every regular file with a supported extension goes to the first processor
//! that claims it. Outcomes are written to the status store as the walk
//! goes; a failure on one file never stops the walk.

use crate::config::Config;
use crate::content::ContentStore;
use crate::error::Result;
use crate::preview::{default_processors, find_processor, Processor};
use crate::state::StatusStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Counters for one walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalkSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Regular files seen
    pub visited: usize,
    /// Thumbnail and data file recorded
    pub ready: usize,
    /// Recorded as "error"
    pub failed: usize,
    /// Extension not supported, never attempted
    pub unsupported: usize,
    /// Unreadable entries or filesystem failures, left unrecorded
    pub skipped: usize,
}

/// What happened to one supported file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Ready,
    Failed,
    AlreadyRecorded,
}

pub struct Walker {
    config: Config,
    content: ContentStore,
    processors: Vec<Box<dyn Processor>>,
}

impl Walker {
    pub fn new(config: &Config) -> Self {
        Self::with_processors(config, default_processors())
    }

    /// Use a custom ordered processor list
    pub fn with_processors(config: &Config, processors: Vec<Box<dyn Processor>>) -> Self {
        Walker {
            config: config.clone(),
            content: ContentStore::from_config(config),
            processors,
        }
    }

    /// Walk the whole tree once, recording outcomes into `store`.
    ///
    /// Only a failure to prepare the artifact directories aborts the walk.
    pub fn run(&self, store: &mut StatusStore) -> Result<WalkSummary> {
        self.content.prepare()?;

        let started_at = Utc::now();
        let mut summary = WalkSummary {
            started_at,
            finished_at: started_at,
            visited: 0,
            ready: 0,
            failed: 0,
            unsupported: 0,
            skipped: 0,
        };

        info!(root = %self.config.root_dir.display(), "🔍 Scanning folder");

        // Walk the directory tree recursively, in a stable order
        for entry in WalkDir::new(&self.config.root_dir)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Dangling links, permission errors, link loops
                    warn!(error = %e, "skipping unreadable entry");
                    summary.skipped += 1;
                    continue;
                }
            };

            // Only process regular files (not directories or special files)
            if !entry.file_type().is_file() {
                continue;
            }
            summary.visited += 1;

            let path = entry.path();
            if !self.config.is_supported(path) {
                summary.unsupported += 1;
                continue;
            }

            match self.process_file(path, store) {
                Ok(FileOutcome::Ready) => summary.ready += 1,
                Ok(FileOutcome::Failed) => summary.failed += 1,
                Ok(FileOutcome::AlreadyRecorded) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping file");
                    summary.skipped += 1;
                }
            }

            if summary.visited % 100 == 0 {
                info!(visited = summary.visited, ready = summary.ready, "⏳ walk in progress");
            }
        }

        summary.finished_at = Utc::now();
        info!(
            visited = summary.visited,
            ready = summary.ready,
            failed = summary.failed,
            unsupported = summary.unsupported,
            skipped = summary.skipped,
            "✅ Walk complete"
        );
        Ok(summary)
    }

    fn process_file(&self, path: &Path, store: &mut StatusStore) -> Result<FileOutcome> {
        if store.has_thumbnail(path)? {
            return Ok(FileOutcome::AlreadyRecorded);
        }

        let Some(processor) = find_processor(&self.processors, path) else {
            // Supported by configuration but nobody decodes it
            store.record_thumbnail(path, None)?;
            return Ok(FileOutcome::Failed);
        };

        // The first matching processor is final, success or failure
        let thumbnail = self.thumbnail_with(processor, path)?;
        match thumbnail {
            Some(thumbnail) => {
                let data_file = processor.make_data_file(path, &self.content)?;
                store.record_ready(path, &thumbnail, &data_file)?;
                debug!(path = %path.display(), %thumbnail, %data_file, "📸 preview ready");
                Ok(FileOutcome::Ready)
            }
            None => {
                store.record_thumbnail(path, None)?;
                Ok(FileOutcome::Failed)
            }
        }
    }

    /// Run a processor, treating a panic inside it as a failed decode
    fn thumbnail_with(&self, processor: &dyn Processor, path: &Path) -> Result<Option<String>> {
        let size = self.config.thumbnail_size;
        match panic::catch_unwind(AssertUnwindSafe(|| {
            processor.make_thumbnail(path, &self.content, size)
        })) {
            Ok(result) => result,
            Err(_) => {
                error!(path = %path.display(), processor = processor.name(), "processor panicked");
                Ok(None)
            }
        }
    }
}
