//! Archive retrieval for remotely hosted packages.
//!
//! Provides a trait-based abstraction over the single HTTP GET that fetches
//! a package archive, enabling dependency injection for testing. Version
//! resolution happens before the downloader is touched, so an unsupported
//! version never causes network traffic.

use super::version::{PackageDescriptor, PackageVersion, VersionLookup};
use log::debug;
use std::fmt;
use std::io::Read;
use std::time::Duration;

/// Trait for downloading archive bytes from a URL.
///
/// Abstractions allow tests to mock HTTP behaviour without network access.
///
/// # Examples
///
/// ```
/// use packsync_ingest::artefact::download::HttpDownloader;
///
/// let downloader = HttpDownloader::new(None);
/// // Use downloader.download("https://...") in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveDownloader {
    /// Download the body at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] on any network failure or
    /// non-success status.
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Errors arising from archive retrieval.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The requested version has no descriptor.
    #[error("unsupported package version \"{version}\"; expected one of: {expected}")]
    UnsupportedVersion {
        /// The rejected version identifier.
        version: String,
        /// Comma-separated list of mapped versions.
        expected: String,
    },

    /// The HTTP request failed or returned a non-success status.
    #[error("download failed for {url}: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },
}

/// An archive body together with the descriptor it was fetched for.
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    /// The resolved descriptor.
    pub descriptor: PackageDescriptor,
    /// The raw archive bytes.
    pub bytes: Vec<u8>,
}

/// Resolve `version` and download its archive.
///
/// Performs at most one call to `downloader`, and none at all when the
/// version is not mapped by `lookup`.
///
/// # Errors
///
/// Returns [`FetchError::UnsupportedVersion`] for unmapped versions and
/// whatever transport error the downloader reports.
pub fn fetch_archive(
    version: &PackageVersion,
    lookup: &dyn VersionLookup,
    downloader: &dyn ArchiveDownloader,
) -> Result<FetchedArchive, FetchError> {
    let descriptor = lookup.resolve(version)?;
    debug!(
        target: "packsync::ingest",
        "fetching package {version} from {}",
        descriptor.url(),
    );
    let bytes = downloader.download(descriptor.url())?;
    debug!(
        target: "packsync::ingest",
        "fetched {} bytes for package {version}",
        bytes.len(),
    );
    Ok(FetchedArchive { descriptor, bytes })
}

/// HTTP-based downloader using `ureq`.
#[derive(Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl fmt::Debug for HttpDownloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDownloader").finish_non_exhaustive()
    }
}

impl HttpDownloader {
    /// Build a downloader, optionally bounding every request by `timeout`.
    ///
    /// Without a timeout a stalled server stalls the caller indefinitely.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ArchiveDownloader for HttpDownloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut bytes = Vec::new();
        response
            .into_body()
            .as_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::Transport {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    let reason = match err {
        ureq::Error::StatusCode(404) => "not found (HTTP 404)".to_owned(),
        ureq::Error::StatusCode(code) => format!("unexpected HTTP status {code}"),
        other => other.to_string(),
    };
    FetchError::Transport {
        url: url.to_owned(),
        reason,
    }
}
