// src/packages/mod.rs

//! Package catalog data model
//!
//! `PackageRecord` describes one artifact, `PackageIndex` is the name-keyed
//! catalog, and the seed helpers load the operator's wanted-package list.

pub mod index;
pub mod record;
pub mod seed;

pub use index::PackageIndex;
pub use record::{DependencyRef, PackageRecord};
pub use seed::{load_seed_list, parse_seed_list};
