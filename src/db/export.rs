// src/db/export.rs

//! Build catalog records from installed packages and their cached artifacts

use super::tables::{LookupTables, license_logic, lookup};
use crate::error::Result;
use crate::mirror::cache::file_sha256;
use crate::packages::{DependencyRef, PackageRecord};
use rusqlite::{Connection, params};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory inside a repository that holds the artifacts
pub const ARTIFACT_DIR: &str = "All";

/// A catalog record paired with the cached artifact it describes
#[derive(Debug, Clone)]
pub struct ExportedPackage {
    pub record: PackageRecord,
    pub cached_file: PathBuf,
}

/// Row of the `packages` table
struct PackageRow {
    id: i64,
    name: String,
    origin: String,
    version: String,
    comment: Option<String>,
    maintainer: Option<String>,
    www: Option<String>,
    arch: String,
    prefix: Option<String>,
    flatsize: i64,
    licenselogic: i64,
    desc: Option<String>,
    message: Option<String>,
}

/// Export every installed package that still has its artifact in `cache_dir`
///
/// Records come back sorted by name. Installed packages whose
/// `<name>-<version>.pkg` is missing from the cache are skipped.
pub fn export_records(
    conn: &Connection,
    tables: &LookupTables,
    cache_dir: &Path,
) -> Result<Vec<ExportedPackage>> {
    let deps = load_dependencies(conn)?;

    let mut stmt = conn.prepare(
        r#"SELECT id, name, origin, version, comment, maintainer, www, arch, prefix,
                  flatsize, licenselogic, "desc", message
           FROM packages ORDER BY name"#,
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PackageRow {
                id: row.get(0)?,
                name: row.get(1)?,
                origin: row.get(2)?,
                version: row.get(3)?,
                comment: row.get(4)?,
                maintainer: row.get(5)?,
                www: row.get(6)?,
                arch: row.get(7)?,
                prefix: row.get(8)?,
                flatsize: row.get(9)?,
                licenselogic: row.get(10)?,
                desc: row.get(11)?,
                message: row.get(12)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut exported = Vec::new();
    for row in rows {
        let file_name = format!("{}-{}.pkg", row.name, row.version);
        let cached_file = cache_dir.join(&file_name);
        if !cached_file.is_file() {
            debug!("{} is installed but not cached, skipping", file_name);
            continue;
        }

        let record = build_record(conn, tables, &deps, row, &file_name, &cached_file)?;
        exported.push(ExportedPackage { record, cached_file });
    }

    info!("Exported {} cached packages from the local database", exported.len());
    Ok(exported)
}

fn build_record(
    conn: &Connection,
    tables: &LookupTables,
    deps: &HashMap<i64, BTreeMap<String, DependencyRef>>,
    row: PackageRow,
    file_name: &str,
    cached_file: &Path,
) -> Result<PackageRecord> {
    let size = fs::metadata(cached_file)?.len();
    let checksum = file_sha256(cached_file)?;
    let repo_path = format!("{}/{}", ARTIFACT_DIR, file_name);

    let mut record = PackageRecord::new(&row.name, &row.origin, &row.version, &repo_path, size, checksum);
    record.path = Some(repo_path);
    record.comment = row.comment;
    record.maintainer = row.maintainer;
    record.www = row.www;
    record.arch = Some(legacy_arch(&row.arch));
    record.abi = Some(row.arch);
    record.prefix = row.prefix;
    record.flatsize = Some(row.flatsize.max(0) as u64);
    record.licenselogic = Some(license_logic(row.licenselogic)?.to_string());
    record.desc = row.desc;

    record.categories = Some(names_for(conn, "SELECT category_id FROM pkg_categories WHERE package_id = ?1", row.id, &tables.categories)?);
    record.annotations = Some(annotations_for(conn, row.id, tables)?);

    record.licenses = non_empty(names_for(conn, "SELECT license_id FROM pkg_licenses WHERE package_id = ?1", row.id, &tables.licenses)?);
    record.shlibs_provided = non_empty(names_for(conn, "SELECT shlib_id FROM pkg_shlibs_provided WHERE package_id = ?1", row.id, &tables.shlibs)?);
    record.shlibs_required = non_empty(names_for(conn, "SELECT shlib_id FROM pkg_shlibs_required WHERE package_id = ?1", row.id, &tables.shlibs)?);
    record.groups = non_empty(names_for(conn, "SELECT group_id FROM pkg_groups WHERE package_id = ?1", row.id, &tables.groups)?);
    record.users = non_empty(names_for(conn, "SELECT user_id FROM pkg_users WHERE package_id = ?1", row.id, &tables.users)?);

    let options = options_for(conn, row.id, tables)?;
    if !options.is_empty() {
        record.options = Some(options);
    }

    record.dependencies = deps.get(&row.id).cloned();

    if let Some(message) = row.message.filter(|m| !m.is_empty()) {
        // pkg stores messages as JSON; keep anything else as plain text
        let value = serde_json::from_str(&message).unwrap_or(Value::String(message));
        let mut extra = Map::new();
        extra.insert("messages".to_string(), value);
        record.extra = extra;
    }

    Ok(record)
}

/// Dependencies of every installed package, keyed by package id
fn load_dependencies(conn: &Connection) -> Result<HashMap<i64, BTreeMap<String, DependencyRef>>> {
    debug!("Computing package dependencies...");
    let mut stmt = conn.prepare("SELECT origin, name, version, package_id FROM deps")?;
    let mut rows = stmt.query([])?;

    let mut deps: HashMap<i64, BTreeMap<String, DependencyRef>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let origin: String = row.get(0)?;
        let name: String = row.get(1)?;
        let version: String = row.get(2)?;
        let package_id: i64 = row.get(3)?;
        deps.entry(package_id)
            .or_default()
            .insert(name, DependencyRef::new(origin, version));
    }
    Ok(deps)
}

/// Resolve the ids returned by `sql` through `table`
fn names_for(
    conn: &Connection,
    sql: &str,
    package_id: i64,
    table: &HashMap<i64, String>,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let ids = stmt
        .query_map(params![package_id], |row| row.get::<_, i64>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids.into_iter().map(|id| lookup(table, id)).collect())
}

fn options_for(conn: &Connection, package_id: i64, tables: &LookupTables) -> Result<BTreeMap<String, String>> {
    let mut stmt = conn.prepare_cached("SELECT option_id, value FROM pkg_option WHERE package_id = ?1")?;
    let rows = stmt
        .query_map(params![package_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .map(|(id, value)| (lookup(&tables.options, id), value.unwrap_or_default()))
        .collect())
}

fn annotations_for(conn: &Connection, package_id: i64, tables: &LookupTables) -> Result<BTreeMap<String, String>> {
    let mut stmt = conn.prepare_cached("SELECT tag_id, value_id FROM pkg_annotation WHERE package_id = ?1")?;
    let rows = stmt
        .query_map(params![package_id], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .map(|(tag, value)| (lookup(&tables.annotations, tag), lookup(&tables.annotations, value)))
        .collect())
}

fn non_empty(list: Vec<String>) -> Option<Vec<String>> {
    if list.is_empty() { None } else { Some(list) }
}

/// Old-style arch string derived from an ABI
///
/// `FreeBSD:14:amd64` becomes `freebsd:14:amd64:64`; wildcard ABIs
/// ending in `:*` are only lowercased.
pub fn legacy_arch(abi: &str) -> String {
    let lower = abi.to_lowercase();
    if lower.ends_with(":*") {
        return lower;
    }
    let start = lower.char_indices().rev().nth(1).map_or(0, |(i, _)| i);
    format!("{}:{}", lower, &lower[start..])
}
