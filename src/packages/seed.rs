// src/packages/seed.rs

//! Seed list (wanted packages) loading

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parse a seed list: one package name per line
///
/// Blank lines and lines starting with `#` are ignored. Duplicates collapse.
pub fn parse_seed_list(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Load the seed list from a file
pub fn load_seed_list(path: &Path) -> Result<BTreeSet<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::ConfigurationError(format!(
            "unable to open seed list {}: {}",
            path.display(),
            e
        ))
    })?;

    let wanted = parse_seed_list(&content);
    debug!("Loaded {} wanted packages from {}", wanted.len(), path.display());
    Ok(wanted)
}
