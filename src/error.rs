// src/error.rs

use thiserror::Error;

/// Core error types for repomirror
#[derive(Error, Debug)]
pub enum Error {
    /// Network unreachable, timeout, or non-success HTTP status
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Catalog archive truncated, member missing, or a record unparsable
    #[error("Corrupt index: {0}")]
    CorruptIndexError(String),

    /// Packages with no catalog entry under the fail-fast policy
    #[error("Unresolved package(s): {}", .0.join(", "))]
    UnresolvedDependencyError(Vec<String>),

    /// Local filesystem failure while publishing an artifact or manifest
    #[error("Cache write error: {0}")]
    CacheWriteError(String),

    /// Missing seed list, destination not a directory, bad flag values
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Downloaded artifact does not hash to the catalog checksum
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Downloaded artifact length differs from the catalog size
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Database rows that cannot be folded into a package record
    #[error("Corrupt database: {0}")]
    CorruptDatabase(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using repomirror's Error type
pub type Result<T> = std::result::Result<T, Error>;
