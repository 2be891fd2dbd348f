//! Bootstrap and background launch of the walk
//!
//! Storage is prepared on the caller's thread so configuration problems are
//! reported before anything runs. The walk itself then runs on a blocking
//! tokio thread with its own status store connection.

use crate::config::Config;
use crate::content::ContentStore;
use crate::error::{Error, Result};
use crate::state::{normalize_path, StatusStore};
use crate::walker::{WalkSummary, Walker};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Validate the configuration, create the artifact directories and start a
/// new status store generation.
pub fn prepare(config: &Config) -> Result<StatusStore> {
    config.validate()?;
    ContentStore::from_config(config).prepare()?;

    let mut store = StatusStore::open(&config.database_path)?;
    store.reset()?;
    info!(db = %store.path().display(), "📁 Status store initialized");
    Ok(store)
}

/// Status stores with a walk in flight, keyed by normalized database path
static ACTIVE_WALKS: Lazy<Mutex<HashSet<String>>> = Lazy::new(Default::default);

/// Exclusive claim on one status store for the lifetime of a walk
#[derive(Debug)]
struct WalkLock {
    key: String,
}

impl WalkLock {
    fn acquire(database_path: &Path) -> Result<Self> {
        let key = normalize_path(database_path)?;
        let mut active = ACTIVE_WALKS.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.clone()) {
            return Err(Error::WalkInProgress(database_path.to_path_buf()));
        }
        Ok(WalkLock { key })
    }
}

impl Drop for WalkLock {
    fn drop(&mut self) {
        ACTIVE_WALKS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// A walk running in the background.
///
/// Dropping the handle detaches the walk; it keeps running to completion.
#[derive(Debug)]
pub struct WalkHandle {
    task: JoinHandle<Result<WalkSummary>>,
}

impl WalkHandle {
    /// Wait for the walk to finish. Production callers never need this.
    pub async fn wait(self) -> Result<WalkSummary> {
        self.task.await.map_err(|e| Error::Join(e.to_string()))?
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Prepare storage and start one walk in the background.
///
/// Must be called from within a tokio runtime. Only one walk may run at a
/// time against a given status store; a second launch while one is in
/// flight fails with [`Error::WalkInProgress`].
pub fn launch(config: Config) -> Result<WalkHandle> {
    let runtime = Handle::try_current()
        .map_err(|_| Error::Config("a walk can only be launched inside a tokio runtime".into()))?;

    config.validate()?;
    // Claimed before the reset so a running walk never loses its tables
    let lock = WalkLock::acquire(&config.database_path)?;

    // Fatal problems surface here, before anything is spawned
    drop(prepare(&config)?);

    let task = runtime.spawn_blocking(move || {
        let result = run_walk(&config);
        drop(lock);
        if let Err(e) = &result {
            error!(error = %e, "walk aborted");
        }
        result
    });

    Ok(WalkHandle { task })
}

/// Run one walk on the current thread against an already prepared store.
pub fn run_walk(config: &Config) -> Result<WalkSummary> {
    // rusqlite::Connection is not Sync, so the walk opens its own
    let mut store = StatusStore::open(&config.database_path)?;
    Walker::new(config).run(&mut store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ThumbnailStatus;
    use image::{Rgb, RgbImage};
    use std::fs;

    fn config_in(dir: &std::path::Path) -> Config {
        let root = dir.join("root");
        fs::create_dir_all(&root).unwrap();
        Config::new(root, dir.join("resources"), dir.join("instance").join("files.db"))
    }

    #[tokio::test]
    async fn launch_then_wait_for_completion() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let photo = config.root_dir.join("photo.png");
        RgbImage::from_pixel(30, 30, Rgb([0, 0, 255])).save(&photo).unwrap();

        let handle = launch(config.clone()).unwrap();
        let summary = handle.wait().await.unwrap();
        assert_eq!(summary.ready, 1);

        let store = StatusStore::open(&config.database_path).unwrap();
        assert!(store.thumbnail_status(&photo).unwrap().is_ready());
        assert!(config.thumbnails_dir().is_dir());
        assert!(config.files_dir().is_dir());
    }

    #[tokio::test]
    async fn relaunch_starts_a_fresh_generation() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let photo = config.root_dir.join("photo.png");
        RgbImage::from_pixel(30, 30, Rgb([0, 0, 255])).save(&photo).unwrap();
        launch(config.clone()).unwrap().wait().await.unwrap();

        // Moved away between runs: the stale record must disappear
        fs::rename(&photo, dir.path().join("elsewhere.png")).unwrap();
        launch(config.clone()).unwrap().wait().await.unwrap();

        let store = StatusStore::open(&config.database_path).unwrap();
        assert_eq!(store.thumbnail_status(&photo).unwrap(), ThumbnailStatus::Processing);
        assert_eq!(store.thumbnail_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn unusable_status_store_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        // A directory where the database file should be
        config.database_path = dir.path().to_path_buf();
        assert!(launch(config).is_err());

        let mut config = config_in(dir.path());
        config.database_path = "".into();
        assert!(matches!(launch(config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn second_walk_on_the_same_store_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        RgbImage::from_pixel(30, 30, Rgb([0, 0, 255]))
            .save(config.root_dir.join("photo.png"))
            .unwrap();

        let running = WalkLock::acquire(&config.database_path).unwrap();
        assert!(matches!(launch(config.clone()), Err(Error::WalkInProgress(_))));

        // The claim is released with the walk
        drop(running);
        let summary = launch(config.clone()).unwrap().wait().await.unwrap();
        assert_eq!(summary.ready, 1);
        assert!(WalkLock::acquire(&config.database_path).is_ok());
    }

    #[test]
    fn launch_outside_runtime_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(launch(config_in(dir.path())), Err(Error::Config(_))));
    }
}
