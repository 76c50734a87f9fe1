// src/lib.rs

//! repomirror
//!
//! Mirrors a dependency-closed subset of a pkg(8) binary repository into a
//! self-contained local tree that pkg clients can use as a repository.
//!
//! # Architecture
//!
//! - Catalog first: the remote `packagesite` archive is the only source of truth
//! - Closure: the seed list is closed under declared dependencies
//! - Incremental: artifacts already present and current are never refetched
//! - Atomic publication: artifacts and manifests appear complete or not at all
//! - Local export: an installed system's database and cache can seed a repository

pub mod config;
pub mod db;
mod error;
pub mod manifest;
pub mod mirror;
pub mod packager;
pub mod packages;
pub mod pipeline;
pub mod repository;
pub mod resolver;

pub use error::{Error, Result};
