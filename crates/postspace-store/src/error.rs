use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique constraint was violated (e.g. username already taken).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, ref msg)
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                StoreError::Conflict(
                    msg.clone()
                        .unwrap_or_else(|| "unique constraint violated".to_string()),
                )
            }
            other => StoreError::Sqlite(other),
        }
    }
}

impl StoreError {
    /// Map `QueryReturnedNoRows` to a typed `NotFound` for `what`.
    pub(crate) fn not_found_as(what: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
        move |e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(what),
            other => StoreError::from(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
