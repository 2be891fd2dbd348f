use super::data::ThumbnailStatus;
use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// The StatusStore records what the walker did with every supported file.
///
/// Two tables, both keyed by the normalized absolute path of the source file:
/// - `thumbnails`: thumbnail filename, or NULL when decoding failed
/// - `data_files`: content-addressed data reference
///
/// The walker is the only writer. The web tier opens its own store on the
/// same file and only reads.
pub struct StatusStore {
    conn: Connection,
    db_path: PathBuf,
}

const CREATE_THUMBNAILS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS thumbnails (
        file_path       TEXT NOT NULL,
        thumbnail_file  TEXT,
        processed_at    INTEGER NOT NULL
    )";

const CREATE_DATA_FILES_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS data_files (
        file_path   TEXT NOT NULL,
        data_file   TEXT NOT NULL
    )";

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_THUMBNAILS_TABLE, [])?;
    conn.execute(CREATE_DATA_FILES_TABLE, [])?;

    // A path appears at most once per generation
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_thumbnails_file_path
         ON thumbnails(file_path)",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_data_files_file_path
         ON data_files(file_path)",
        [],
    )?;
    Ok(())
}

impl StatusStore {
    /// Open (or create) the status store at `db_path`.
    ///
    /// Tables are created if missing but existing rows are kept; call
    /// [`StatusStore::reset`] to start a new walk generation.
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        // WAL lets the web tier read while the walker writes
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        init_schema(&conn)?;
        debug!(db = %db_path.display(), "status store opened");
        Ok(StatusStore {
            conn,
            db_path: db_path.to_path_buf(),
        })
    }

    /// Drop and recreate both tables, purging records of moved or deleted files.
    ///
    /// Readers see either the previous generation or the empty new one.
    pub fn reset(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DROP TABLE IF EXISTS thumbnails;
             DROP TABLE IF EXISTS data_files;",
        )?;
        init_schema(&tx)?;
        tx.commit()?;
        info!(db = %self.db_path.display(), "status store reset");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Record a thumbnail outcome; `None` marks a failed decode.
    pub fn record_thumbnail(&self, file_path: &Path, thumbnail: Option<&str>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO thumbnails (file_path, thumbnail_file, processed_at) VALUES (?1, ?2, ?3)",
            params![normalize_path(file_path)?, thumbnail, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub fn record_data_reference(&self, file_path: &Path, data_file: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO data_files (file_path, data_file) VALUES (?1, ?2)",
            params![normalize_path(file_path)?, data_file],
        )?;
        Ok(())
    }

    /// Commit a thumbnail and its data reference as one unit
    pub fn record_ready(&mut self, file_path: &Path, thumbnail: &str, data_file: &str) -> Result<()> {
        let key = normalize_path(file_path)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO thumbnails (file_path, thumbnail_file, processed_at) VALUES (?1, ?2, ?3)",
            params![&key, thumbnail, Utc::now().timestamp()],
        )?;
        tx.execute(
            "INSERT INTO data_files (file_path, data_file) VALUES (?1, ?2)",
            params![&key, data_file],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn has_thumbnail(&self, file_path: &Path) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM thumbnails WHERE file_path = ?1)",
            [normalize_path(file_path)?],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// "processing" without a row, "error" for a NULL artifact, else the filename
    pub fn thumbnail_status(&self, file_path: &Path) -> Result<ThumbnailStatus> {
        let row: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT thumbnail_file FROM thumbnails WHERE file_path = ?1",
                [normalize_path(file_path)?],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match row {
            None => ThumbnailStatus::Processing,
            Some(None) => ThumbnailStatus::Error,
            Some(Some(filename)) => ThumbnailStatus::Ready(filename),
        })
    }

    pub fn data_reference(&self, file_path: &Path) -> Result<Option<String>> {
        let data_file = self
            .conn
            .query_row(
                "SELECT data_file FROM data_files WHERE file_path = ?1",
                [normalize_path(file_path)?],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data_file)
    }

    /// Number of thumbnail rows in the current generation
    pub fn thumbnail_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM thumbnails", [], |row| row.get(0))?;
        Ok(count)
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for StatusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

/// Key used for every row: absolute, symlink-resolved, forward slashes.
///
/// Paths that do not exist (a web-tier lookup for a deleted file) are
/// resolved as far as possible and cleaned lexically.
pub fn normalize_path(path: &Path) -> Result<String> {
    let resolved = match std::fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(_) => {
            let absolute = lexical_absolute(path)?;
            match (absolute.parent(), absolute.file_name()) {
                (Some(parent), Some(name)) => std::fs::canonicalize(parent)
                    .map(|parent| parent.join(name))
                    .unwrap_or(absolute),
                _ => absolute,
            }
        }
    };
    Ok(to_slash(&resolved))
}

fn lexical_absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut cleaned = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    Ok(cleaned)
}

#[cfg(windows)]
fn to_slash(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    raw.strip_prefix("//?/").map(str::to_string).unwrap_or(raw)
}

#[cfg(not(windows))]
fn to_slash(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
