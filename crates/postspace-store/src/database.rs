//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the default database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/postspace/postspace.db`
    /// - macOS:   `~/Library/Application Support/org.postspace.postspace/postspace.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\postspace\postspace\data\postspace.db`
    pub fn open_default() -> Result<Self> {
        let db_path = Self::default_path()?;
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Location used by [`Database::open_default`].
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("org", "postspace", "postspace").ok_or(StoreError::NoDataDir)?;
        Ok(project_dirs.data_dir().join("postspace.db"))
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::prepare(conn)
    }

    /// Private in-memory database, used by tests and throwaway tooling.
    pub fn open_in_memory() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}
