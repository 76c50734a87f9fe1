// src/mirror/mod.rs

//! Incremental mirror synchronization
//!
//! For every resolved package the synchronizer either reuses the local
//! artifact (when the cache probe says it is current) or fetches it from the
//! repository, verifies it, and publishes it atomically. Packages are
//! independent jobs run on a bounded worker pool; one failure never stops
//! the others, and every failure is named in the report.

pub mod cache;
pub mod store;

pub use cache::{CacheProbe, VerifyMode};

use crate::error::{Error, Result};
use crate::packages::{PackageIndex, PackageRecord};
use crate::repository::{Fetcher, join_url};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Default number of concurrent downloads
pub const DEFAULT_WORKERS: usize = 4;

/// How a package ended up in the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStatus {
    /// Local copy was current, nothing fetched
    Cached,
    /// Downloaded and published during this run
    Fetched,
}

/// A package that could not be mirrored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub name: String,
    pub reason: String,
}

/// Result of a synchronization run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Records whose artifacts are present locally, sorted by name
    pub entries: Vec<PackageRecord>,
    /// Names reused from the local tree
    pub cached: Vec<String>,
    /// Names downloaded during this run
    pub fetched: Vec<String>,
    /// Packages that are not in the mirror, sorted by name
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    /// True when every resolved package made it into the mirror
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reconciles a resolved package set against a local artifact tree
pub struct MirrorSynchronizer<'a> {
    fetcher: &'a dyn Fetcher,
    repo_url: String,
    local_root: PathBuf,
    probe: CacheProbe,
    workers: usize,
}

impl<'a> MirrorSynchronizer<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, repo_url: impl Into<String>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            repo_url: repo_url.into(),
            local_root: local_root.into(),
            probe: CacheProbe::default(),
            workers: DEFAULT_WORKERS,
        }
    }

    /// Cache verification mode for existing artifacts
    pub fn with_verify_mode(mut self, mode: VerifyMode) -> Self {
        self.probe = CacheProbe::new(mode);
        self
    }

    /// Number of concurrent download workers (at least one)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Bring every package in `resolved` into the local tree
    ///
    /// Returns `Err` only when the worker pool cannot be started; per-package
    /// problems land in `SyncReport::failed`.
    pub fn sync(&self, resolved: &BTreeSet<String>, index: &PackageIndex) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut jobs = Vec::with_capacity(resolved.len());

        for name in resolved {
            match index.get(name) {
                Some(record) => jobs.push(record),
                None => {
                    warn!("{} is not in the catalog; nothing to mirror", name);
                    report.failed.push(SyncFailure {
                        name: name.clone(),
                        reason: "not present in the catalog".to_string(),
                    });
                }
            }
        }

        info!(
            "Synchronizing {} packages into {} ({} workers)",
            jobs.len(),
            self.local_root.display(),
            self.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| Error::ConfigurationError(format!("Failed to start download workers: {}", e)))?;

        // Workers return results instead of touching shared state; the
        // merge below is the only writer and keeps name order.
        let outcomes: Vec<(&PackageRecord, Result<PackageStatus>)> = pool.install(|| {
            jobs.par_iter()
                .map(|record| (*record, self.sync_package(record)))
                .collect()
        });

        for (record, outcome) in outcomes {
            match outcome {
                Ok(PackageStatus::Cached) => {
                    report.cached.push(record.name.clone());
                    report.entries.push(record.clone());
                }
                Ok(PackageStatus::Fetched) => {
                    report.fetched.push(record.name.clone());
                    report.entries.push(record.clone());
                }
                Err(e) => {
                    warn!("Failed to mirror {}: {}", record.name, e);
                    report.failed.push(SyncFailure {
                        name: record.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.entries.sort_by(|a, b| a.name.cmp(&b.name));
        report.failed.sort_by(|a, b| a.name.cmp(&b.name));

        info!(
            "Mirror sync finished: {} cached, {} fetched, {} failed",
            report.cached.len(),
            report.fetched.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Reuse or fetch a single package
    fn sync_package(&self, record: &PackageRecord) -> Result<PackageStatus> {
        let repo_path = record.artifact_path().ok_or_else(|| {
            Error::CorruptIndexError(format!("package '{}' has no artifact path", record.name))
        })?;
        let dest = store::artifact_path(&self.local_root, repo_path)?;
        let url = join_url(&self.repo_url, repo_path);

        if self.probe.is_up_to_date(&dest, record) {
            info!("{} -> {} : CACHED", url, dest.display());
            return Ok(PackageStatus::Cached);
        }

        let data = self.fetcher.fetch_sized(&url, record.size)?;
        verify_artifact(record, &data)?;
        store::write_atomic(&dest, &data)?;

        info!("{} -> {} : OK", url, dest.display());
        Ok(PackageStatus::Fetched)
    }
}

/// Check downloaded bytes against the catalog before they are published
///
/// The checksum is compared only when present and shaped like a SHA-256
/// hex digest.
pub fn verify_artifact(record: &PackageRecord, data: &[u8]) -> Result<()> {
    let actual_size = data.len() as u64;
    if actual_size != record.size {
        return Err(Error::SizeMismatch {
            expected: record.size,
            actual: actual_size,
        });
    }

    if let Some(expected) = record.checksum.as_deref().filter(|sum| is_sha256_hex(sum)) {
        let actual = cache::bytes_sha256(data);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(Error::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        debug!("Checksum verified for {}", record.name);
    }

    Ok(())
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
