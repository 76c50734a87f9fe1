// src/packages/record.rs

//! A single package descriptor as it appears in a pkg(8) catalog
//!
//! Keys follow the remote catalog (`pkgsize`, `sum`, `deps`, ...). Known
//! optional fields are typed, everything else is carried through verbatim
//! in `extra`. Absent fields are never serialized, so a record written back
//! out has exactly the keys it was read with.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Origin and version of a dependency as declared by the depending package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub origin: String,
    pub version: String,
}

impl DependencyRef {
    pub fn new(origin: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            version: version.into(),
        }
    }
}

/// One distributable unit in a catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Package name, unique within an index
    pub name: String,

    /// Ports origin (e.g. "ports-mgmt/pkg")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub www: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Content digest of the artifact (SHA-256 hex in pkg catalogs)
    #[serde(rename = "sum", default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Installed size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatsize: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Artifact location relative to the repository root
    #[serde(rename = "repopath", default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licenselogic: Option<String>,

    /// Expected byte length of the artifact
    #[serde(rename = "pkgsize")]
    pub size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    #[serde(rename = "deps", default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, DependencyRef>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licenses: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shlibs_provided: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shlibs_required: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,

    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageRecord {
    /// Create a minimal record; optional fields start absent
    pub fn new(
        name: impl Into<String>,
        origin: impl Into<String>,
        version: impl Into<String>,
        repo_path: impl Into<String>,
        size: u64,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            origin: Some(origin.into()),
            version: Some(version.into()),
            comment: None,
            maintainer: None,
            www: None,
            abi: None,
            arch: None,
            prefix: None,
            checksum: Some(checksum.into()),
            flatsize: None,
            path: None,
            repo_path: Some(repo_path.into()),
            licenselogic: None,
            size,
            desc: None,
            dependencies: None,
            categories: None,
            licenses: None,
            options: None,
            annotations: None,
            shlibs_provided: None,
            shlibs_required: None,
            users: None,
            groups: None,
            extra: Map::new(),
        }
    }

    /// Add a dependency (builder style, mostly for tests and exporters)
    pub fn with_dependency(
        mut self,
        name: impl Into<String>,
        origin: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.dependencies
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), DependencyRef::new(origin, version));
        self
    }

    /// Artifact location, preferring `repopath` over `path`
    pub fn artifact_path(&self) -> Option<&str> {
        self.repo_path.as_deref().or(self.path.as_deref())
    }

    /// Names of declared dependencies, in sorted order
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .flat_map(|deps| deps.keys())
            .map(String::as_str)
    }
}
