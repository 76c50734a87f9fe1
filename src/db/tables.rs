// src/db/tables.rs

//! Id → name lookup tables of the pkg database
//!
//! pkg(8) normalizes licenses, categories, shared libraries, options,
//! annotations, users, and groups into side tables. They are read once and
//! passed by reference to the record builder.

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::collections::HashMap;
use tracing::debug;

/// Placeholder for ids with no row in their lookup table
pub const UNKNOWN_NAME: &str = "unknown";

/// Read-only lookup tables, loaded once per export
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub licenses: HashMap<i64, String>,
    pub categories: HashMap<i64, String>,
    pub shlibs: HashMap<i64, String>,
    pub options: HashMap<i64, String>,
    pub annotations: HashMap<i64, String>,
    pub groups: HashMap<i64, String>,
    pub users: HashMap<i64, String>,
}

impl LookupTables {
    /// Load every lookup table from the database
    pub fn load(conn: &Connection) -> Result<Self> {
        let tables = Self {
            licenses: load_table(conn, "SELECT id, name FROM licenses")?,
            categories: load_table(conn, "SELECT id, name FROM categories")?,
            shlibs: load_table(conn, "SELECT id, name FROM shlibs")?,
            options: load_table(conn, r#"SELECT option_id, "option" FROM "option""#)?,
            annotations: load_table(conn, "SELECT annotation_id, annotation FROM annotation")?,
            groups: load_table(conn, r#"SELECT id, name FROM "groups""#)?,
            users: load_table(conn, "SELECT id, name FROM users")?,
        };

        debug!(
            "Loaded lookup tables: {} licenses, {} categories, {} shlibs, {} options",
            tables.licenses.len(),
            tables.categories.len(),
            tables.shlibs.len(),
            tables.options.len()
        );
        Ok(tables)
    }
}

/// Name for `id`, or `"unknown"` when the table has no such row
pub fn lookup(table: &HashMap<i64, String>, id: i64) -> String {
    table
        .get(&id)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_NAME.to_string())
}

/// Map pkg's license logic code (a character code) to its catalog name
pub fn license_logic(code: i64) -> Result<&'static str> {
    match code {
        1 => Ok("single"),
        38 => Ok("and"),
        124 => Ok("or"),
        other => Err(Error::CorruptDatabase(format!(
            "unknown license logic - ID={}",
            other
        ))),
    }
}

fn load_table(conn: &Connection, sql: &str) -> Result<HashMap<i64, String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::create_schema;

    #[test]
    fn test_load_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn);
        conn.execute_batch(
            r#"
            INSERT INTO licenses VALUES (1, 'BSD2CLAUSE'), (2, 'MIT');
            INSERT INTO categories VALUES (7, 'shells');
            INSERT INTO "option" VALUES (3, 'DOCS');
            "#,
        )
        .unwrap();

        let tables = LookupTables::load(&conn).unwrap();

        assert_eq!(tables.licenses.len(), 2);
        assert_eq!(lookup(&tables.categories, 7), "shells");
        assert_eq!(lookup(&tables.options, 3), "DOCS");
        assert_eq!(lookup(&tables.users, 1), UNKNOWN_NAME);
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(LookupTables::load(&conn).is_err());
    }

    #[test]
    fn test_license_logic() {
        assert_eq!(license_logic(1).unwrap(), "single");
        assert_eq!(license_logic(38).unwrap(), "and");
        assert_eq!(license_logic(124).unwrap(), "or");
        assert!(matches!(license_logic(0), Err(Error::CorruptDatabase(_))));
    }
}
