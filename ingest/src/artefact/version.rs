//! Package version identifiers and their download descriptors.
//!
//! A [`PackageVersion`] is an opaque identifier chosen when a resource is
//! constructed. It is resolved through a [`VersionLookup`] to a
//! [`PackageDescriptor`] carrying the archive URL and the directory inside
//! the archive that holds the package. Unmapped versions are rejected before
//! any network traffic happens.

use super::download::FetchError;
use super::error::{ArtefactError, Result};
use serde::Serialize;
use std::fmt;

/// The upstream repository hosting tagged package archives.
const UPSTREAM_REPO: &str = "thisdp/dgs";

/// Archive directory prefix used by the upstream tag archives.
const UPSTREAM_ROOT_PREFIX: &str = "dgs";

/// Versions shipped in the built-in table.
const BUILTIN_VERSIONS: &[&str] = &["3.518"];

/// An opaque package version identifier such as `3.518`.
///
/// Construction only checks that the identifier is usable inside a URL and
/// an archive path; whether the version is *supported* is decided by a
/// [`VersionLookup`].
///
/// # Examples
///
/// ```
/// use packsync_ingest::artefact::version::PackageVersion;
///
/// let version = PackageVersion::try_from("3.518").expect("valid version");
/// assert_eq!(version.as_str(), "3.518");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PackageVersion(String);

impl PackageVersion {
    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for PackageVersion {
    type Error = ArtefactError;

    fn try_from(value: &str) -> Result<Self> {
        validate_version(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for PackageVersion {
    type Error = ArtefactError;

    fn try_from(value: String) -> Result<Self> {
        validate_version(&value)?;
        Ok(Self(value))
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_version(value: &str) -> Result<()> {
    let reject = |reason: &str| ArtefactError::InvalidPackageVersion {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };
    if value.is_empty() {
        return Err(reject("identifier must not be empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(reject("identifier must not contain whitespace"));
    }
    if value.contains(['/', '\\']) {
        return Err(reject("identifier must not contain path separators"));
    }
    Ok(())
}

/// Where a package version is downloaded from and how its archive is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    version: PackageVersion,
    url: String,
    package_root: String,
}

impl PackageDescriptor {
    /// Create a descriptor from its parts.
    ///
    /// `package_root` is the directory inside the archive that contains
    /// `meta.xml`; it must not carry a trailing slash.
    #[must_use]
    pub fn new(
        version: PackageVersion,
        url: impl Into<String>,
        package_root: impl Into<String>,
    ) -> Self {
        Self {
            version,
            url: url.into(),
            package_root: package_root.into(),
        }
    }

    /// Descriptor for an upstream tag archive.
    ///
    /// # Examples
    ///
    /// ```
    /// use packsync_ingest::artefact::version::{PackageDescriptor, PackageVersion};
    ///
    /// let version = PackageVersion::try_from("3.518").expect("valid version");
    /// let descriptor = PackageDescriptor::upstream_tag(version);
    /// assert!(descriptor.url().ends_with("/refs/tags/3.518.zip"));
    /// assert_eq!(descriptor.package_root(), "dgs-3.518");
    /// ```
    #[must_use]
    pub fn upstream_tag(version: PackageVersion) -> Self {
        let url = format!(
            "https://github.com/{UPSTREAM_REPO}/archive/refs/tags/{}.zip",
            version.as_str()
        );
        let package_root = format!("{UPSTREAM_ROOT_PREFIX}-{}", version.as_str());
        Self::new(version, url, package_root)
    }

    /// The version this descriptor resolves.
    #[must_use]
    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    /// The archive download URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The archive directory holding the package.
    #[must_use]
    pub fn package_root(&self) -> &str {
        &self.package_root
    }
}

/// Resolves package versions to download descriptors.
#[cfg_attr(test, mockall::automock)]
pub trait VersionLookup {
    /// Resolve `version` to its descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::UnsupportedVersion`] if the version is not mapped.
    fn resolve(&self, version: &PackageVersion) -> std::result::Result<PackageDescriptor, FetchError>;

    /// Identifiers this lookup can resolve, for error reporting.
    fn supported_versions(&self) -> Vec<String>;
}

/// A fixed table of known package versions.
///
/// # Examples
///
/// ```
/// use packsync_ingest::artefact::version::{PackageVersion, VersionLookup, VersionTable};
///
/// let table = VersionTable::builtin();
/// let version = PackageVersion::try_from("3.518").expect("valid version");
/// assert!(table.resolve(&version).is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionTable {
    entries: Vec<PackageDescriptor>,
}

impl VersionTable {
    /// An empty table that rejects every version.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The table of upstream releases known to this build.
    #[must_use]
    pub fn builtin() -> Self {
        BUILTIN_VERSIONS
            .iter()
            .filter_map(|raw| PackageVersion::try_from(*raw).ok())
            .map(PackageDescriptor::upstream_tag)
            .fold(Self::empty(), Self::with)
    }

    /// Add or replace the descriptor for its version.
    #[must_use]
    pub fn with(mut self, descriptor: PackageDescriptor) -> Self {
        self.entries
            .retain(|existing| existing.version() != descriptor.version());
        self.entries.push(descriptor);
        self
    }

    /// Identifiers of every mapped version, in insertion order.
    #[must_use]
    pub fn versions(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.version().as_str())
            .collect()
    }
}

impl VersionLookup for VersionTable {
    fn resolve(&self, version: &PackageVersion) -> std::result::Result<PackageDescriptor, FetchError> {
        self.entries
            .iter()
            .find(|entry| entry.version() == version)
            .cloned()
            .ok_or_else(|| FetchError::UnsupportedVersion {
                version: version.to_string(),
                expected: self.versions().join(", "),
            })
    }

    fn supported_versions(&self) -> Vec<String> {
        self.versions().into_iter().map(str::to_owned).collect()
    }
}
