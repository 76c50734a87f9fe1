// src/mirror/store.rs

//! Local artifact tree
//!
//! Every file is published with write-to-temp, fsync, rename. A crash or an
//! abort can leave a stray `.part` file behind but never a truncated file at
//! the final path, so the cache probe cannot mistake it for a valid artifact.

use crate::error::{Error, Result};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::Builder;

/// Resolve a catalog-relative artifact path under `root`
///
/// Absolute paths and `..` components are rejected so a hostile catalog
/// cannot write outside the mirror.
pub fn artifact_path(root: &Path, repo_path: &str) -> Result<PathBuf> {
    let relative = Path::new(repo_path.trim_start_matches("./"));
    let mut dest = root.to_path_buf();
    let mut depth = 0usize;

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                dest.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            _ => {
                return Err(Error::CorruptIndexError(format!(
                    "unsafe artifact path '{}'",
                    repo_path
                )));
            }
        }
    }

    if depth == 0 {
        return Err(Error::CorruptIndexError(format!(
            "empty artifact path '{}'",
            repo_path
        )));
    }

    Ok(dest)
}

/// Atomically publish `data` at `dest`, creating parent directories
pub fn write_atomic(dest: &Path, data: &[u8]) -> Result<()> {
    write_atomic_from(dest, &mut io::Cursor::new(data))
}

/// Atomically publish the contents of `reader` at `dest`
pub fn write_atomic_from(dest: &Path, reader: &mut dyn Read) -> Result<()> {
    let cache_error = |what: &str, e: &dyn std::fmt::Display| {
        Error::CacheWriteError(format!("{} {}: {}", what, dest.display(), e))
    };

    let parent = dest
        .parent()
        .ok_or_else(|| Error::CacheWriteError(format!("{} has no parent directory", dest.display())))?;

    // create_dir_all tolerates concurrent creation of the same directory
    fs::create_dir_all(parent).map_err(|e| cache_error("Failed to create directory for", &e))?;

    let mut tmp = Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| cache_error("Failed to create temporary file for", &e))?;

    io::copy(reader, &mut tmp).map_err(|e| cache_error("Failed to write", &e))?;
    tmp.flush().map_err(|e| cache_error("Failed to flush", &e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| cache_error("Failed to sync", &e))?;

    tmp.persist(dest)
        .map_err(|e| cache_error("Failed to publish", &e.error))?;

    Ok(())
}
