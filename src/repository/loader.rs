// src/repository/loader.rs

//! Catalog loading
//!
//! A pkg(8) repository publishes its catalog as a compressed tarball
//! (`packagesite.txz`, `packagesite.pkg`, ...) holding `packagesite.yaml`.
//! Despite the name the member is newline-delimited JSON, one record per line.

use super::{Fetcher, join_url};
use crate::error::{Error, Result};
use crate::packages::PackageIndex;
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use tar::Archive;
use tracing::{debug, info};
use xz2::read::XzDecoder;

/// Archive fetched from the repository root by default
pub const DEFAULT_CATALOG_ARCHIVE: &str = "packagesite.txz";

/// Catalog member inside the archive
pub const DEFAULT_CATALOG_MEMBER: &str = "packagesite.yaml";

const XZ_MAGIC: &[u8] = &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];

/// Where a catalog archive comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSource {
    /// Repository root URL; the archive name is appended
    Remote(String),
    /// Path to an archive already on disk
    Archive(PathBuf),
}

/// Loads a catalog archive into a `PackageIndex`
///
/// The loader performs a single attempt; transport-level retry belongs to
/// the `Fetcher` it is given.
pub struct IndexLoader<'a> {
    fetcher: &'a dyn Fetcher,
    archive_name: String,
    catalog_member: String,
}

impl<'a> IndexLoader<'a> {
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self {
            fetcher,
            archive_name: DEFAULT_CATALOG_ARCHIVE.to_string(),
            catalog_member: DEFAULT_CATALOG_MEMBER.to_string(),
        }
    }

    /// Archive file name appended to a remote repository root
    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = name.into();
        self
    }

    /// Member to extract from the archive
    pub fn with_catalog_member(mut self, member: impl Into<String>) -> Self {
        self.catalog_member = member.into();
        self
    }

    /// Fetch, extract, and parse the catalog
    pub fn load(&self, source: &IndexSource) -> Result<PackageIndex> {
        let raw = match source {
            IndexSource::Remote(root) => {
                let url = join_url(root, &self.archive_name);
                info!("Fetching catalog from {}", url);
                self.fetcher.fetch(&url)?
            }
            IndexSource::Archive(path) => {
                info!("Reading catalog from {}", path.display());
                fs::read(path).map_err(|e| {
                    Error::ConfigurationError(format!(
                        "unable to read catalog archive {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
        };

        let catalog = extract_member(&raw, &self.catalog_member)?;
        let text = String::from_utf8(catalog).map_err(|e| {
            Error::CorruptIndexError(format!("{} is not valid UTF-8: {}", self.catalog_member, e))
        })?;

        let index = PackageIndex::parse_catalog(&text)?;
        info!("Loaded {} packages from catalog", index.len());
        Ok(index)
    }
}

/// Undo the archive's outer compression, detected from its magic bytes
///
/// Anything without a known magic is assumed to be a plain tarball.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decompressed = Vec::new();

    if data.starts_with(XZ_MAGIC) {
        XzDecoder::new(data)
            .read_to_end(&mut decompressed)
            .map_err(|e| Error::CorruptIndexError(format!("Failed to decompress xz catalog: {}", e)))?;
        debug!("Decompressed xz catalog archive");
    } else if data.starts_with(GZIP_MAGIC) {
        GzDecoder::new(data)
            .read_to_end(&mut decompressed)
            .map_err(|e| Error::CorruptIndexError(format!("Failed to decompress gzip catalog: {}", e)))?;
        debug!("Decompressed gzip catalog archive");
    } else if data.starts_with(ZSTD_MAGIC) {
        decompressed = zstd::decode_all(data).map_err(|e| {
            Error::CorruptIndexError(format!("Failed to decompress zstd catalog: {}", e))
        })?;
        debug!("Decompressed zstd catalog archive");
    } else {
        decompressed.extend_from_slice(data);
    }

    Ok(decompressed)
}

/// Extract a single member from a (possibly compressed) tarball
pub fn extract_member(archive_data: &[u8], member: &str) -> Result<Vec<u8>> {
    let tarball = decompress(archive_data)?;
    let mut archive = Archive::new(tarball.as_slice());

    let entries = archive
        .entries()
        .map_err(|e| Error::CorruptIndexError(format!("Failed to read catalog archive: {}", e)))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| {
            Error::CorruptIndexError(format!("Failed to read tarball entry: {}", e))
        })?;

        let path = entry
            .path()
            .map_err(|e| Error::CorruptIndexError(format!("Invalid path in tarball: {}", e)))?
            .to_string_lossy()
            .into_owned();

        if path.trim_start_matches("./") != member {
            continue;
        }

        let mut content = Vec::new();
        entry.read_to_end(&mut content).map_err(|e| {
            Error::CorruptIndexError(format!("Failed to read {} from archive: {}", member, e))
        })?;
        debug!("Extracted {} ({} bytes)", member, content.len());
        return Ok(content);
    }

    Err(Error::CorruptIndexError(format!(
        "'{}' not found in the catalog archive",
        member
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const CATALOG: &str = concat!(
        r#"{"name":"pkg","origin":"ports-mgmt/pkg","version":"1.21.3","sum":"aa","repopath":"All/pkg-1.21.3.pkg","pkgsize":100}"#,
        "\n",
        r#"{"name":"vim","origin":"editors/vim","version":"9.1","sum":"bb","repopath":"All/vim-9.1.pkg","pkgsize":200}"#,
        "\n",
    );

    struct StaticFetcher(HashMap<String, Vec<u8>>);

    impl Fetcher for StaticFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| Error::TransportError(format!("HTTP 404 Not Found from {}", url)))
        }
    }

    fn tarball(member: &str, content: &[u8]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, member, content).unwrap();
        builder.into_inner().unwrap()
    }

    fn xz(data: &[u8]) -> Vec<u8> {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_extract_from_xz_tarball() {
        let archive = xz(&tarball("packagesite.yaml", CATALOG.as_bytes()));
        let content = extract_member(&archive, "packagesite.yaml").unwrap();

        assert_eq!(content, CATALOG.as_bytes());
    }

    #[test]
    fn test_extract_from_gzip_and_zstd_tarballs() {
        let tar_data = tarball("./packagesite.yaml", CATALOG.as_bytes());

        let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        gz.write_all(&tar_data).unwrap();
        let gz = gz.finish().unwrap();
        assert_eq!(extract_member(&gz, "packagesite.yaml").unwrap(), CATALOG.as_bytes());

        let zst = zstd::encode_all(tar_data.as_slice(), 3).unwrap();
        assert_eq!(extract_member(&zst, "packagesite.yaml").unwrap(), CATALOG.as_bytes());

        assert_eq!(extract_member(&tar_data, "packagesite.yaml").unwrap(), CATALOG.as_bytes());
    }

    #[test]
    fn test_missing_member_is_corrupt() {
        let archive = xz(&tarball("filesite.yaml", b"{}"));
        let result = extract_member(&archive, "packagesite.yaml");

        assert!(matches!(result, Err(Error::CorruptIndexError(_))));
    }

    #[test]
    fn test_truncated_archive_is_corrupt() {
        let archive = xz(&tarball("packagesite.yaml", CATALOG.as_bytes()));
        let truncated = &archive[..archive.len() / 2];

        let result = extract_member(truncated, "packagesite.yaml");
        assert!(matches!(result, Err(Error::CorruptIndexError(_))));
    }

    #[test]
    fn test_load_remote_catalog() {
        let archive = xz(&tarball("packagesite.yaml", CATALOG.as_bytes()));
        let mut responses = HashMap::new();
        responses.insert("https://repo.example/latest/packagesite.txz".to_string(), archive);
        let fetcher = StaticFetcher(responses);

        let index = IndexLoader::new(&fetcher)
            .load(&IndexSource::Remote("https://repo.example/latest/".to_string()))
            .unwrap();

        assert_eq!(index.len(), 2);
        assert!(index.contains("vim"));
    }

    #[test]
    fn test_load_transport_failure() {
        let fetcher = StaticFetcher(HashMap::new());
        let result = IndexLoader::new(&fetcher)
            .load(&IndexSource::Remote("https://repo.example/latest".to_string()));

        assert!(matches!(result, Err(Error::TransportError(_))));
    }

    #[test]
    fn test_load_local_archive_with_custom_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.tar");
        fs::write(&path, tarball("site.json", CATALOG.as_bytes())).unwrap();

        let fetcher = StaticFetcher(HashMap::new());
        let index = IndexLoader::new(&fetcher)
            .with_archive_name("unused.txz")
            .with_catalog_member("site.json")
            .load(&IndexSource::Archive(path))
            .unwrap();

        assert_eq!(index.names().collect::<Vec<_>>(), vec!["pkg", "vim"]);
    }

    #[test]
    fn test_load_invalid_json_line() {
        let archive = xz(&tarball("packagesite.yaml", b"{\"name\":\"a\"\nnot json\n"));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packagesite.txz");
        fs::write(&path, archive).unwrap();

        let fetcher = StaticFetcher(HashMap::new());
        let result = IndexLoader::new(&fetcher).load(&IndexSource::Archive(path));

        assert!(matches!(result, Err(Error::CorruptIndexError(_))));
    }

    #[test]
    fn test_load_non_utf8_catalog_is_corrupt() {
        let archive = xz(&tarball("packagesite.yaml", &[0xff, 0xfe, b'\n']));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packagesite.txz");
        fs::write(&path, archive).unwrap();

        let fetcher = StaticFetcher(HashMap::new());
        let result = IndexLoader::new(&fetcher).load(&IndexSource::Archive(path));

        match result {
            Err(Error::CorruptIndexError(msg)) => assert!(msg.contains("UTF-8"), "{}", msg),
            other => panic!("expected CorruptIndexError, got {:?}", other.map(|index| index.len())),
        }
    }

    #[test]
    fn test_load_missing_local_archive_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();

        let fetcher = StaticFetcher(HashMap::new());
        let result = IndexLoader::new(&fetcher).load(&IndexSource::Archive(dir.path().join("missing.txz")));

        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }
}
