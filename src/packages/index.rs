// src/packages/index.rs

//! Name-keyed package catalog
//!
//! A `PackageIndex` is built once (from a catalog file, a local database,
//! or a list of records) and is read-only afterwards.

use super::record::PackageRecord;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Mapping from package name to its record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageIndex {
    packages: BTreeMap<String, PackageRecord>,
}

impl PackageIndex {
    /// Parse a newline-delimited JSON catalog
    ///
    /// Blank lines are skipped. A single malformed line, or a record without
    /// an artifact path, fails the whole parse: callers never see a partial
    /// index. When a name repeats, the later record wins.
    pub fn parse_catalog(content: &str) -> Result<Self> {
        let mut packages = BTreeMap::new();

        for (lineno, line) in content.split('\n').enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let record: PackageRecord = serde_json::from_str(line).map_err(|e| {
                Error::CorruptIndexError(format!("catalog line {}: {}", lineno + 1, e))
            })?;

            if record.artifact_path().is_none() {
                return Err(Error::CorruptIndexError(format!(
                    "catalog line {}: package '{}' has neither repopath nor path",
                    lineno + 1,
                    record.name
                )));
            }

            if let Some(previous) = packages.insert(record.name.clone(), record) {
                warn!(
                    "Duplicate catalog entry for {}; keeping the later one",
                    previous.name
                );
            }
        }

        debug!("Parsed {} catalog records", packages.len());
        Ok(Self { packages })
    }

    /// Look up a package by name
    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Package names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }
}

impl FromIterator<PackageRecord> for PackageIndex {
    fn from_iter<I: IntoIterator<Item = PackageRecord>>(iter: I) -> Self {
        let packages = iter
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        Self { packages }
    }
}
