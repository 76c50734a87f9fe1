// src/mirror/cache.rs

//! Freshness checks for artifacts already present in the local tree

use crate::packages::PackageRecord;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::debug;

/// How much of a cached artifact is checked before it is reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// File exists with the catalog's byte length
    #[default]
    Size,
    /// Size check plus a SHA-256 comparison against the catalog checksum
    Checksum,
}

/// Decides whether a local artifact can be reused without fetching
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheProbe {
    mode: VerifyMode,
}

impl CacheProbe {
    pub fn new(mode: VerifyMode) -> Self {
        Self { mode }
    }

    /// True when `local_path` holds a current copy of `expected`'s artifact
    ///
    /// Read-only. Any error while inspecting the file counts as "not current".
    pub fn is_up_to_date(&self, local_path: &Path, expected: &PackageRecord) -> bool {
        let size_matches = fs::metadata(local_path)
            .map(|meta| meta.is_file() && meta.len() == expected.size)
            .unwrap_or(false);

        if !size_matches {
            return false;
        }

        let checksum = match (self.mode, expected.checksum.as_deref()) {
            (VerifyMode::Size, _) => return true,
            (VerifyMode::Checksum, None) => {
                debug!("No catalog checksum for {}, size match is all we can check", expected.name);
                return true;
            }
            (VerifyMode::Checksum, Some(checksum)) => checksum,
        };

        match file_sha256(local_path) {
            Ok(actual) => {
                let current = actual.eq_ignore_ascii_case(checksum);
                if !current {
                    debug!(
                        "Cached {} has checksum {}, catalog says {}",
                        local_path.display(),
                        actual,
                        checksum
                    );
                }
                current
            }
            Err(e) => {
                debug!("Failed to hash {}: {}", local_path.display(), e);
                false
            }
        }
    }
}

/// SHA-256 of a file as lowercase hex
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 of a byte slice as lowercase hex
pub fn bytes_sha256(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
