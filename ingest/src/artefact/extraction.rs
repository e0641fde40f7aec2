//! Entry extraction from downloaded package archives.
//!
//! Reads individual entries out of an in-memory zip archive by their path
//! relative to the package root. Entry paths are validated before lookup to
//! prevent a manifest from reaching outside the package directory.

use std::io::{Cursor, Read};
use std::path::{Component, Path};

/// Trait for reading package entries, enabling test mocking.
///
/// # Examples
///
/// ```
/// use packsync_ingest::artefact::extraction::ZipPackage;
///
/// // Use ZipPackage::open(archive_bytes, "dgs-3.518") in production
/// let result = ZipPackage::open(b"not a zip".to_vec(), "dgs-3.518");
/// assert!(result.is_err());
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ContentExtractor {
    /// Return the raw bytes of `source_path`, relative to the package root.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::EntryMissing`] if the archive has no such
    /// entry, [`ExtractionError::PathTraversal`] if the path escapes the
    /// package root, and [`ExtractionError::ArchiveCorrupt`] if the entry
    /// cannot be decompressed.
    fn extract(&mut self, source_path: &str) -> Result<Vec<u8>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// The archive could not be read as a zip file.
    #[error("archive is corrupt: {reason}")]
    ArchiveCorrupt {
        /// Description of the decoding failure.
        reason: String,
    },

    /// The archive has no entry at the requested path.
    #[error("archive entry missing: {path}")]
    EntryMissing {
        /// The full archive path that was looked up.
        path: String,
    },

    /// A requested path attempts to escape the package root.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path.
        path: String,
    },
}

/// A zip archive held in memory, scoped to one package root directory.
pub struct ZipPackage {
    archive: zip::ZipArchive<Cursor<Vec<u8>>>,
    package_root: String,
}

impl ZipPackage {
    /// Open `bytes` as a zip archive whose package lives under `package_root`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::ArchiveCorrupt`] if the central directory
    /// cannot be read.
    pub fn open(bytes: Vec<u8>, package_root: &str) -> Result<Self, ExtractionError> {
        let archive =
            zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractionError::ArchiveCorrupt {
                reason: e.to_string(),
            })?;
        Ok(Self {
            archive,
            package_root: package_root.trim_end_matches('/').to_owned(),
        })
    }

    /// The directory inside the archive that holds the package.
    #[must_use]
    pub fn package_root(&self) -> &str {
        &self.package_root
    }

    /// Number of entries in the whole archive, including directories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// Whether the archive has no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    fn archive_path(&self, source_path: &str) -> String {
        if self.package_root.is_empty() {
            source_path.to_owned()
        } else {
            format!("{}/{source_path}", self.package_root)
        }
    }
}

impl ContentExtractor for ZipPackage {
    fn extract(&mut self, source_path: &str) -> Result<Vec<u8>, ExtractionError> {
        validate_entry_path(source_path)?;
        let path = self.archive_path(source_path);
        let mut entry = match self.archive.by_name(&path) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ExtractionError::EntryMissing { path });
            }
            Err(e) => {
                return Err(ExtractionError::ArchiveCorrupt {
                    reason: format!("{path}: {e}"),
                });
            }
        };
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| ExtractionError::ArchiveCorrupt {
                reason: format!("{path}: {e}"),
            })?;
        Ok(bytes)
    }
}

/// Validate that an entry path does not escape the package root via `..`
/// components or absolute paths.
///
/// # Errors
///
/// Returns [`ExtractionError::PathTraversal`] for absolute paths and paths
/// containing parent-directory components.
pub fn validate_entry_path(path: &str) -> Result<(), ExtractionError> {
    let traversal = || ExtractionError::PathTraversal {
        path: path.to_owned(),
    };
    if path.starts_with('/') || path.starts_with('\\') || Path::new(path).is_absolute() {
        return Err(traversal());
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(traversal());
    }
    if Path::new(path)
        .components()
        .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(traversal());
    }
    Ok(())
}
