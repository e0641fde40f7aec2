//! Resource configuration.
//!
//! The host supplies configuration as an optional JSON payload. Missing
//! fields fall back to their defaults and a missing payload yields
//! [`ResourceConfig::default`].

use packsync_ingest::artefact::error::ArtefactError;
use packsync_ingest::artefact::version::PackageVersion;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Package version ingested when none is configured.
pub const DEFAULT_VERSION: &str = "3.518";

/// Name the resource registers under in the hosting session.
pub const DEFAULT_RESOURCE_NAME: &str = "dgs";

/// Label the integrity snapshot is broadcast under.
pub const DEFAULT_SYNC_LABEL: &str = "DGSI_FileInfo";

/// Settings for one [`PackageResource`](crate::resource::PackageResource).
///
/// # Examples
///
/// ```
/// use packsync::config::{ResourceConfig, decode_json_or_default};
///
/// let config: ResourceConfig =
///     decode_json_or_default(Some(r#"{"fetch_timeout_secs":30}"#)).expect("valid config");
/// assert_eq!(config.version, "3.518");
/// assert_eq!(config.fetch_timeout().map(|t| t.as_secs()), Some(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceConfig {
    /// Package version to ingest.
    pub version: String,
    /// Name of the owning resource, used in log lines.
    pub resource_name: String,
    /// Label the integrity snapshot is published under.
    pub sync_label: String,
    /// Overall timeout for the archive download, in seconds.
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_owned(),
            resource_name: DEFAULT_RESOURCE_NAME.to_owned(),
            sync_label: DEFAULT_SYNC_LABEL.to_owned(),
            fetch_timeout_secs: None,
        }
    }
}

impl ResourceConfig {
    /// The configured version as a validated identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::InvalidPackageVersion`] if the identifier is
    /// empty or unusable in a URL.
    pub fn package_version(&self) -> Result<PackageVersion, ArtefactError> {
        PackageVersion::try_from(self.version.as_str())
    }

    /// The download timeout, if one is configured.
    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }
}

/// Decode an optional JSON payload, falling back to `T::default()`.
///
/// # Errors
///
/// Returns the `serde_json` error if a payload is present but invalid.
pub fn decode_json_or_default<T>(raw: Option<&str>) -> Result<T, serde_json::Error>
where
    T: DeserializeOwned + Default,
{
    raw.map(serde_json::from_str)
        .unwrap_or_else(|| Ok(T::default()))
}
