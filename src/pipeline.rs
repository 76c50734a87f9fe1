// src/pipeline.rs

//! End-to-end runs
//!
//! `mirror_repository` drives one mirror run: catalog, closure, artifacts,
//! manifest, then any packagers. `export_from_cache` builds a repository
//! from the local pkg database and cache instead of a remote catalog.

use crate::config::{MirrorConfig, prepare_local_root};
use crate::db::{self, ExportedPackage, LookupTables, export_records};
use crate::error::{Error, Result};
use crate::manifest::{MANIFEST_FILE, ManifestWriter};
use crate::mirror::{MirrorSynchronizer, SyncReport, store};
use crate::packager::{ArtifactPackager, CatalogArchiver};
use crate::packages::{PackageRecord, load_seed_list};
use crate::repository::{Fetcher, IndexLoader, IndexSource};
use crate::resolver::{Resolution, resolve};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What a mirror run did
#[derive(Debug, Clone)]
pub struct MirrorSummary {
    pub resolution: Resolution,
    pub report: SyncReport,
    pub manifest_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MirrorSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Unknown, pruned, and failed packages together
    pub fn problem_count(&self) -> usize {
        self.resolution.unknown.len() + self.resolution.pruned.len() + self.report.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.problem_count() == 0
    }
}

/// Mirror the closure of the configured seed list into `config.local_root`
///
/// Resolution errors (fail-fast policy) abort before anything is fetched.
/// Per-package download problems do not abort; they are in the summary.
pub fn mirror_repository(
    config: &MirrorConfig,
    fetcher: &dyn Fetcher,
    packagers: &[&dyn ArtifactPackager],
) -> Result<MirrorSummary> {
    let started_at = Utc::now();
    config.validate()?;
    prepare_local_root(&config.local_root)?;

    let mut wanted = load_seed_list(&config.seed_file)?;
    if let Some(bootstrap) = &config.bootstrap_package {
        wanted.insert(bootstrap.clone());
    }
    info!("Wanted set has {} packages", wanted.len());

    let index = IndexLoader::new(fetcher)
        .with_archive_name(&config.catalog_archive)
        .with_catalog_member(&config.catalog_member)
        .load(&IndexSource::Remote(config.repo_url.clone()))?;

    let resolution = resolve(&wanted, &index, config.unknown_policy)?;

    let report = MirrorSynchronizer::new(fetcher, config.repo_url.as_str(), config.local_root.as_path())
        .with_verify_mode(config.verify_mode)
        .with_workers(config.workers)
        .sync(&resolution.resolved, &index)?;

    let manifest_path = config.local_root.join(MANIFEST_FILE);
    ManifestWriter::write_to(&report.entries, &manifest_path)?;
    run_packagers(packagers, &config.local_root, &manifest_path)?;

    let summary = MirrorSummary {
        resolution,
        report,
        manifest_path,
        started_at,
        finished_at: Utc::now(),
    };

    if summary.is_clean() {
        info!(
            "Mirror complete: {} packages in {}s",
            summary.report.entries.len(),
            summary.duration().num_seconds()
        );
    } else {
        warn!(
            "Mirror finished with {} problem(s): {} packages in {}s",
            summary.problem_count(),
            summary.report.entries.len(),
            summary.duration().num_seconds()
        );
    }
    Ok(summary)
}

/// Run each packager in order, stopping at the first failure
pub fn run_packagers(packagers: &[&dyn ArtifactPackager], mirror_root: &Path, manifest_path: &Path) -> Result<()> {
    for packager in packagers {
        info!("Running {} packager", packager.name());
        packager.package(mirror_root, manifest_path)?;
    }
    Ok(())
}

/// What a cache export produced
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Exported records, sorted by name
    pub entries: Vec<PackageRecord>,
    pub manifest_path: PathBuf,
}

/// Build a repository in `output` from the local pkg database and cache
///
/// Cached artifacts are copied to `<output>/All/`, the manifest is written,
/// and the catalog archives are generated.
pub fn export_from_cache(db_path: &Path, cache_dir: &Path, output: &Path) -> Result<ExportSummary> {
    if !cache_dir.is_dir() {
        return Err(Error::ConfigurationError(format!(
            "package cache ({}) is not a directory",
            cache_dir.display()
        )));
    }
    prepare_local_root(output)?;

    let conn = db::open(db_path)?;
    let tables = LookupTables::load(&conn)?;
    let exported = export_records(&conn, &tables, cache_dir)?;

    info!("Copying {} package files...", exported.len());
    for package in &exported {
        copy_artifact(package, output)?;
    }

    let entries: Vec<PackageRecord> = exported.into_iter().map(|p| p.record).collect();
    let manifest_path = output.join(MANIFEST_FILE);
    ManifestWriter::write_to(&entries, &manifest_path)?;
    CatalogArchiver::new().package(output, &manifest_path)?;

    Ok(ExportSummary { entries, manifest_path })
}

fn copy_artifact(package: &ExportedPackage, output: &Path) -> Result<()> {
    let repo_path = package.record.artifact_path().ok_or_else(|| {
        Error::CorruptDatabase(format!("package '{}' has no artifact path", package.record.name))
    })?;
    let dest = store::artifact_path(output, repo_path)?;

    let mut source = File::open(&package.cached_file).map_err(|e| {
        Error::CacheWriteError(format!(
            "Failed to open cached artifact {}: {}",
            package.cached_file.display(),
            e
        ))
    })?;
    store::write_atomic_from(&dest, &mut source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::cache::bytes_sha256;
    use crate::packager::META_FILE;
    use crate::resolver::UnknownPolicy;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;

    const REPO: &str = "https://repo.example/FreeBSD:14:amd64/latest";

    /// In-memory repository keyed by URL
    struct FakeRepository {
        files: HashMap<String, Vec<u8>>,
        calls: Mutex<usize>,
    }

    impl FakeRepository {
        /// `packages` pairs each name with its space-separated dependencies
        fn new(packages: &[(&str, &str)]) -> Self {
            let mut files = HashMap::new();
            let mut records = Vec::new();
            for (name, deps) in packages {
                let data = format!("{} artifact", name).into_bytes();
                let mut record = PackageRecord::new(
                    *name,
                    format!("misc/{}", name),
                    "1.0",
                    format!("All/{}-1.0.pkg", name),
                    data.len() as u64,
                    bytes_sha256(&data),
                );
                for dep in deps.split_whitespace() {
                    record = record.with_dependency(dep, format!("misc/{}", dep), "1.0");
                }
                files.insert(format!("{}/All/{}-1.0.pkg", REPO, name), data);
                records.push(record);
            }

            let manifest = ManifestWriter::write(&records).unwrap();
            let archive = CatalogArchiver::build_archive(&manifest).unwrap();
            files.insert(format!("{}/packagesite.txz", REPO), archive);

            Self {
                files,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl Fetcher for FakeRepository {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            *self.calls.lock().unwrap() += 1;
            self.files
                .get(url)
                .cloned()
                .ok_or_else(|| Error::TransportError(format!("404 Not Found: {}", url)))
        }
    }

    fn config_in(dir: &Path, seeds: &str) -> MirrorConfig {
        let seed_file = dir.join("selected.txt");
        fs::write(&seed_file, seeds).unwrap();
        MirrorConfig {
            repo_url: REPO.to_string(),
            local_root: dir.join("repo"),
            seed_file,
            ..MirrorConfig::default()
        }
    }

    #[test]
    fn test_mirror_repository_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FakeRepository::new(&[("pkg", ""), ("curl", "libnghttp2"), ("libnghttp2", ""), ("vim", "")]);
        let config = config_in(dir.path(), "curl\n");
        let archiver = CatalogArchiver::new();

        let summary = mirror_repository(&config, &repo, &[&archiver]).unwrap();

        let names: Vec<_> = summary.report.entries.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["curl", "libnghttp2", "pkg"]);
        assert!(summary.is_clean());
        assert!(config.local_root.join("All/curl-1.0.pkg").exists());
        assert!(!config.local_root.join("All/vim-1.0.pkg").exists());
        assert!(config.local_root.join(META_FILE).exists());
        assert!(config.local_root.join("packagesite.txz").exists());
        assert_eq!(summary.manifest_path, config.local_root.join(MANIFEST_FILE));
    }

    #[test]
    fn test_second_run_only_fetches_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FakeRepository::new(&[("pkg", ""), ("curl", "")]);
        let config = config_in(dir.path(), "curl\n");

        mirror_repository(&config, &repo, &[]).unwrap();
        let first_manifest = fs::read(config.local_root.join(MANIFEST_FILE)).unwrap();
        assert_eq!(repo.calls(), 3);

        let summary = mirror_repository(&config, &repo, &[]).unwrap();
        assert_eq!(repo.calls(), 4);
        assert_eq!(summary.report.cached, vec!["curl", "pkg"]);
        assert_eq!(fs::read(config.local_root.join(MANIFEST_FILE)).unwrap(), first_manifest);
    }

    #[test]
    fn test_fail_fast_fetches_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FakeRepository::new(&[("pkg", ""), ("curl", "libssh2")]);
        let config = config_in(dir.path(), "curl\n");

        let result = mirror_repository(&config, &repo, &[]);

        assert!(matches!(result, Err(Error::UnresolvedDependencyError(ref names)) if names == &vec!["libssh2".to_string()]));
        assert_eq!(repo.calls(), 1);
    }

    #[test]
    fn test_skip_policy_reports_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FakeRepository::new(&[("pkg", ""), ("curl", "libssh2")]);
        let config = MirrorConfig {
            unknown_policy: UnknownPolicy::Skip,
            bootstrap_package: None,
            ..config_in(dir.path(), "curl\n")
        };

        let summary = mirror_repository(&config, &repo, &[]).unwrap();

        assert_eq!(summary.report.entries.len(), 1);
        assert!(summary.resolution.unknown.contains("libssh2"));
        assert_eq!(summary.problem_count(), 1);
    }

    #[test]
    fn test_missing_seed_list() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FakeRepository::new(&[("pkg", "")]);
        let config = MirrorConfig {
            repo_url: REPO.to_string(),
            local_root: dir.path().join("repo"),
            seed_file: dir.path().join("missing.txt"),
            ..MirrorConfig::default()
        };

        let result = mirror_repository(&config, &repo, &[]);
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
        assert_eq!(repo.calls(), 0);
    }

    #[test]
    fn test_export_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("local.sqlite");
        {
            let conn = rusqlite::Connection::open(&db_path).unwrap();
            crate::db::testing::create_schema(&conn);
            conn.execute_batch(
                r#"
                INSERT INTO packages (id, origin, name, version, arch, flatsize, licenselogic)
                    VALUES (1, 'ports-mgmt/pkg', 'pkg', '1.21.3', 'FreeBSD:14:amd64', 100, 1);
                "#,
            )
            .unwrap();
        }
        let cache = dir.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("pkg-1.21.3.pkg"), b"pkg artifact").unwrap();
        let output = dir.path().join("mirror");

        let summary = export_from_cache(&db_path, &cache, &output).unwrap();

        assert_eq!(summary.entries.len(), 1);
        assert_eq!(fs::read(output.join("All/pkg-1.21.3.pkg")).unwrap(), b"pkg artifact");
        assert!(output.join("packagesite.pkg").exists());
        let manifest = fs::read_to_string(&summary.manifest_path).unwrap();
        assert!(manifest.contains(r#""repopath":"All/pkg-1.21.3.pkg""#));
    }

    #[test]
    fn test_export_requires_cache_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = export_from_cache(
            &dir.path().join("local.sqlite"),
            &dir.path().join("nocache"),
            &dir.path().join("mirror"),
        );
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }
}
