// src/manifest.rs

//! Manifest (filtered catalog) serialization
//!
//! The manifest lists exactly the packages present in the mirror, one JSON
//! object per line, sorted by name. Only fields present on the source record
//! are written. Identical inputs give byte-identical output.

use crate::error::Result;
use crate::mirror::store;
use crate::packages::PackageRecord;
use std::path::Path;
use tracing::info;

/// File name of the manifest inside the mirror root
pub const MANIFEST_FILE: &str = "packagesite.yaml";

pub struct ManifestWriter;

impl ManifestWriter {
    /// Serialize `entries` as newline-delimited JSON
    pub fn write(entries: &[PackageRecord]) -> Result<Vec<u8>> {
        let mut sorted: Vec<&PackageRecord> = entries.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = Vec::new();
        for record in sorted {
            serde_json::to_writer(&mut out, record)?;
            out.push(b'\n');
        }
        Ok(out)
    }

    /// Serialize and atomically publish the manifest at `path`
    pub fn write_to(entries: &[PackageRecord], path: &Path) -> Result<()> {
        let data = Self::write(entries)?;
        store::write_atomic(path, &data)?;
        info!("Wrote manifest with {} packages to {}", entries.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::PackageIndex;

    fn sample() -> Vec<PackageRecord> {
        let mut curl = PackageRecord::new("curl", "ftp/curl", "8.5.0", "All/curl-8.5.0.pkg", 200, "bb")
            .with_dependency("ca_root_nss", "security/ca_root_nss", "3.93");
        curl.comment = Some("Command line tool for transferring data".to_string());
        let nss = PackageRecord::new("ca_root_nss", "security/ca_root_nss", "3.93", "All/ca_root_nss-3.93.pkg", 100, "aa");
        vec![curl, nss]
    }

    #[test]
    fn test_output_is_sorted_and_line_delimited() {
        let out = String::from_utf8(ManifestWriter::write(&sample()).unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"name":"ca_root_nss""#));
        assert!(lines[1].starts_with(r#"{"name":"curl""#));
        assert!(out.ends_with('\n'));
        assert!(!out.contains("null"));
    }

    #[test]
    fn test_idempotent_regardless_of_input_order() {
        let mut reversed = sample();
        reversed.reverse();

        assert_eq!(
            ManifestWriter::write(&sample()).unwrap(),
            ManifestWriter::write(&reversed).unwrap()
        );
    }

    #[test]
    fn test_manifest_reparses_to_same_records() {
        let out = ManifestWriter::write(&sample()).unwrap();
        let index = PackageIndex::parse_catalog(std::str::from_utf8(&out).unwrap()).unwrap();

        let expected: PackageIndex = sample().into_iter().collect();
        assert_eq!(index, expected);
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);

        ManifestWriter::write_to(&sample(), &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), ManifestWriter::write(&sample()).unwrap());
    }

    #[test]
    fn test_empty_manifest() {
        assert!(ManifestWriter::write(&[]).unwrap().is_empty());
    }
}
