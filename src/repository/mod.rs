// src/repository/mod.rs

//! Remote repository access
//!
//! This module provides functionality for:
//! - Fetching catalog archives and artifacts over HTTP(S) or `file://`
//! - Bounded retry with exponential backoff on transient failures
//! - Loading a remote or local catalog into a `PackageIndex`

pub mod loader;

pub use loader::{IndexLoader, IndexSource};

use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Default connect and stall timeout for HTTP requests (30 seconds)
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for a single fetch
pub const MAX_RETRIES: u32 = 3;

/// Base retry delay in milliseconds, doubled after each failed attempt
const RETRY_DELAY_MS: u64 = 1000;

/// Upper bound on a single retry delay
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Slowest transfer rate (bytes per second) tolerated for a body of known size
const MIN_TRANSFER_RATE: u64 = 16 * 1024;

const USER_AGENT: &str = concat!("repomirror/", env!("CARGO_PKG_VERSION"));

/// Source of raw bytes for a URL
///
/// Implementations must be shareable across the download worker pool.
pub trait Fetcher: Send + Sync {
    /// Fetch the full body at `url`
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// Fetch a body whose length is known from the catalog
    fn fetch_sized(&self, url: &str, _expected_size: u64) -> Result<Vec<u8>> {
        self.fetch(url)
    }
}

/// HTTP client wrapper with retry support
///
/// `timeout` bounds connecting and detects dead peers. It never caps how long
/// a live transfer may take; bodies of known size get a deadline scaled to
/// their length instead.
pub struct RepositoryClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl RepositoryClient {
    /// Create a new repository client with default timeout and retries
    pub fn new() -> Result<Self> {
        Self::with_settings(HTTP_TIMEOUT, MAX_RETRIES)
    }

    /// Create a client with an explicit connect timeout and attempt cap
    pub fn with_settings(timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(None::<Duration>)
            .tcp_keepalive(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                Error::ConfigurationError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            timeout,
            max_retries: max_retries.max(1),
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Override the base retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn fetch_http(&self, url: &str, deadline: Option<Duration>) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self.client.get(url);
            if let Some(deadline) = deadline {
                request = request.timeout(deadline);
            }

            let failure = match request.send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.bytes() {
                            Ok(bytes) => {
                                debug!("Fetched {} bytes from {}", bytes.len(), url);
                                return Ok(bytes.to_vec());
                            }
                            Err(e) => format!("Failed to read response from {}: {}", url, e),
                        }
                    } else if is_retryable(status) {
                        format!("HTTP {} from {}", status, url)
                    } else {
                        return Err(Error::TransportError(format!("HTTP {} from {}", status, url)));
                    }
                }
                Err(e) => format!("Failed to fetch {}: {}", url, e),
            };

            if attempt >= self.max_retries {
                return Err(Error::TransportError(format!(
                    "{} (gave up after {} attempts)",
                    failure, attempt
                )));
            }

            let delay = backoff_delay(self.retry_delay, attempt);
            warn!("Fetch attempt {} failed: {}, retrying in {:?}...", attempt, failure, delay);
            std::thread::sleep(delay);
        }
    }
}

impl Fetcher for RepositoryClient {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        match url.strip_prefix("file://") {
            Some(path) => fetch_file(Path::new(path)),
            None => self.fetch_http(url, None),
        }
    }

    fn fetch_sized(&self, url: &str, expected_size: u64) -> Result<Vec<u8>> {
        match url.strip_prefix("file://") {
            Some(path) => fetch_file(Path::new(path)),
            None => self.fetch_http(url, Some(transfer_deadline(self.timeout, expected_size))),
        }
    }
}

/// Read a `file://` URL; a missing file is a transport failure like a 404
fn fetch_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|e| Error::TransportError(format!("Failed to read {}: {}", path.display(), e)))
}

/// Whole-request deadline for a body of `size` bytes
fn transfer_deadline(timeout: Duration, size: u64) -> Duration {
    timeout.saturating_add(Duration::from_secs(size / MIN_TRANSFER_RATE))
}

/// 5xx and 429 may succeed later; other statuses will not
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Delay before the retry that follows failed attempt number `attempt` (1-based)
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

/// Join a repository root and a relative path with exactly one `/`
pub fn join_url(root: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        root.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
