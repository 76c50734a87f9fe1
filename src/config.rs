// src/config.rs

//! Run configuration
//!
//! There are no configuration files: the CLI folds its flags into a
//! `MirrorConfig`, and the library only ever sees the typed struct.

use crate::error::{Error, Result};
use crate::mirror::{DEFAULT_WORKERS, VerifyMode};
use crate::repository::loader::{DEFAULT_CATALOG_ARCHIVE, DEFAULT_CATALOG_MEMBER};
use crate::repository::{HTTP_TIMEOUT, MAX_RETRIES};
use crate::resolver::UnknownPolicy;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_RELEASE: &str = "14";
pub const DEFAULT_CPU: &str = "amd64";
pub const DEFAULT_ENDPOINT: &str = "quarterly";
pub const DEFAULT_LOCAL_ROOT: &str = "repo";
pub const DEFAULT_SEED_FILE: &str = "selected.txt";

/// Package every mirror needs so clients can bootstrap pkg(8) itself
pub const BOOTSTRAP_PACKAGE: &str = "pkg";

/// Official repository root for a release, CPU, and branch
pub fn official_repo_url(release: &str, cpu: &str, endpoint: &str) -> String {
    format!("https://pkg.FreeBSD.org/FreeBSD:{}:{}/{}", release, cpu, endpoint)
}

/// Everything a mirror run needs
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Repository root URL
    pub repo_url: String,
    /// Local mirror directory
    pub local_root: PathBuf,
    /// Seed list file, one package per line
    pub seed_file: PathBuf,
    /// Catalog archive name under the repository root
    pub catalog_archive: String,
    /// Catalog member inside the archive
    pub catalog_member: String,
    pub unknown_policy: UnknownPolicy,
    pub verify_mode: VerifyMode,
    pub workers: usize,
    /// Added to the wanted set when set
    pub bootstrap_package: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            repo_url: official_repo_url(DEFAULT_RELEASE, DEFAULT_CPU, DEFAULT_ENDPOINT),
            local_root: PathBuf::from(DEFAULT_LOCAL_ROOT),
            seed_file: PathBuf::from(DEFAULT_SEED_FILE),
            catalog_archive: DEFAULT_CATALOG_ARCHIVE.to_string(),
            catalog_member: DEFAULT_CATALOG_MEMBER.to_string(),
            unknown_policy: UnknownPolicy::FailFast,
            verify_mode: VerifyMode::Size,
            workers: DEFAULT_WORKERS,
            bootstrap_package: Some(BOOTSTRAP_PACKAGE.to_string()),
            timeout: HTTP_TIMEOUT,
            max_retries: MAX_RETRIES,
        }
    }
}

impl MirrorConfig {
    /// Reject values no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.repo_url.trim().is_empty() {
            return Err(Error::ConfigurationError("repository URL is empty".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::ConfigurationError("worker count must be at least 1".to_string()));
        }
        if self.max_retries == 0 {
            return Err(Error::ConfigurationError("retry count must be at least 1".to_string()));
        }
        if self.catalog_member.is_empty() || self.catalog_archive.is_empty() {
            return Err(Error::ConfigurationError("catalog names must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Make sure `path` is a usable directory, creating it when absent
pub fn prepare_local_root(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::ConfigurationError(format!(
                "destination path ({}) is not a directory",
                path.display()
            )));
        }
        return Ok(());
    }

    fs::create_dir_all(path).map_err(|e| {
        Error::ConfigurationError(format!(
            "could not create destination path ({}): {}",
            path.display(),
            e
        ))
    })?;
    info!("Created mirror directory {}", path.display());
    Ok(())
}
