// src/packager.rs

//! Post-manifest packaging steps
//!
//! Anything that turns a finished mirror directory into something else
//! (catalog archives, bootstrap bundles, disc images) sits behind
//! `ArtifactPackager`. The core only calls packagers after the manifest is
//! written and never knows how they work.

use crate::error::{Error, Result};
use crate::manifest::MANIFEST_FILE;
use crate::mirror::store;
use std::fs;
use std::io::Write;
use std::path::Path;
use tar::{Builder, Header};
use tracing::info;
use xz2::write::XzEncoder;

/// Repository meta file read by pkg(8) clients
pub const META_FILE: &str = "meta.conf";

const META_CONF: &str = r#"version = 2;
packing_format = "txz";
manifests = "packagesite.yaml";
filesite = "filesite.yaml";
manifests_archive = "packagesite";
filesite_archive = "filesite";
"#;

/// xz preset used for catalog archives
const XZ_LEVEL: u32 = 6;

/// A step run on the mirror root once the manifest exists
pub trait ArtifactPackager {
    /// Short label for logs
    fn name(&self) -> &str;

    /// Produce this packager's outputs from the mirror at `mirror_root`
    fn package(&self, mirror_root: &Path, manifest_path: &Path) -> Result<()>;
}

/// Archives the manifest the way pkg(8) expects to download it
///
/// Writes `meta.conf`, then `packagesite.txz` (tar + xz holding the
/// manifest) and a byte-identical `packagesite.pkg` for newer clients.
pub struct CatalogArchiver {
    archive_names: Vec<String>,
}

impl CatalogArchiver {
    pub fn new() -> Self {
        Self {
            archive_names: vec!["packagesite.txz".to_string(), "packagesite.pkg".to_string()],
        }
    }

    /// Replace the list of archive file names written
    pub fn with_archive_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.archive_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Build the compressed catalog archive in memory
    ///
    /// The tar header carries a fixed mtime so unchanged manifests give
    /// identical archives.
    pub fn build_archive(manifest: &[u8]) -> Result<Vec<u8>> {
        let mut header = Header::new_gnu();
        header.set_size(manifest.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();

        let mut builder = Builder::new(XzEncoder::new(Vec::new(), XZ_LEVEL));
        builder.append_data(&mut header, MANIFEST_FILE, manifest)?;
        let mut encoder = builder.into_inner()?;
        encoder.flush()?;
        Ok(encoder.finish()?)
    }
}

impl Default for CatalogArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactPackager for CatalogArchiver {
    fn name(&self) -> &str {
        "catalog"
    }

    fn package(&self, mirror_root: &Path, manifest_path: &Path) -> Result<()> {
        info!("Generating {}...", META_FILE);
        store::write_atomic(&mirror_root.join(META_FILE), META_CONF.as_bytes())?;

        let manifest = fs::read(manifest_path).map_err(|e| {
            Error::CacheWriteError(format!(
                "Failed to read manifest {}: {}",
                manifest_path.display(),
                e
            ))
        })?;
        let archive = Self::build_archive(&manifest)?;

        for name in &self.archive_names {
            info!("Generating {}...", name);
            store::write_atomic(&mirror_root.join(name), &archive)?;
        }
        Ok(())
    }
}
