// src/db/mod.rs

//! Local pkg(8) database access
//!
//! The installed-package database is only ever read. Together with the
//! package cache it can stand in for a remote repository: every installed
//! package whose artifact is still cached becomes a catalog record.
//!
//! - `tables`: id → name lookup tables, loaded once per run
//! - `export`: folding package rows into `PackageRecord`s

pub mod export;
pub mod tables;

pub use export::{ExportedPackage, export_records};
pub use tables::LookupTables;

use crate::error::{Error, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Where pkg(8) keeps its database
pub const DEFAULT_DB_PATH: &str = "/var/db/pkg/local.sqlite";

/// Where pkg(8) caches downloaded artifacts
pub const DEFAULT_CACHE_DIR: &str = "/var/cache/pkg";

/// Open an existing pkg database read-only
///
/// # Arguments
///
/// * `db_path` - Path to the database file
///
/// # Returns
///
/// * `Result<Connection>` - Database connection if successful
pub fn open(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        return Err(Error::DatabaseNotFound(db_path.display().to_string()));
    }

    debug!("Opening package database at: {}", db_path.display());
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    // pkg(8) may hold a write lock while we read
    conn.busy_timeout(Duration::from_millis(5000))?;

    Ok(conn)
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_existing_database() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let conn = Connection::open(temp_file.path()).unwrap();
            conn.execute("CREATE TABLE packages (id INTEGER PRIMARY KEY, name TEXT)", [])
                .unwrap();
        }

        let conn = open(temp_file.path()).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_is_read_only() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let conn = Connection::open(temp_file.path()).unwrap();
            conn.execute("CREATE TABLE packages (id INTEGER PRIMARY KEY, name TEXT)", [])
                .unwrap();
        }

        let conn = open(temp_file.path()).unwrap();
        let result = conn.execute("INSERT INTO packages (name) VALUES ('pkg')", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_open_nonexistent_database() {
        let result = open(Path::new("/nonexistent/path/local.sqlite"));
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::DatabaseNotFound(_)));
    }
}
