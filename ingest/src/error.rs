//! Error taxonomy for a single ingestion attempt.
//!
//! Component errors are aggregated into [`IngestionError`]. Every variant is
//! fatal to the attempt and none is retried. Errors are cheap to clone so a
//! terminal failure can be handed to every interested reader.

use crate::artefact::download::FetchError;
use crate::artefact::extraction::ExtractionError;
use crate::artefact::manifest_parser::ManifestParseError;
use crate::integrity::DuplicateRecord;
use std::fmt;
use thiserror::Error;

/// Any failure that aborts ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    /// Version resolution or the HTTP download failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The manifest is missing or malformed.
    #[error(transparent)]
    Manifest(#[from] ManifestParseError),

    /// An entry could not be read from the archive.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Two assets resolved to the same integrity key.
    #[error(transparent)]
    Integrity(#[from] DuplicateRecord),
}

/// Flat classification of [`IngestionError`] for reporting and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestionErrorKind {
    /// The package version has no download descriptor.
    UnsupportedVersion,
    /// The HTTP request failed.
    TransportError,
    /// The archive has no manifest.
    ManifestMissing,
    /// The manifest is structurally invalid.
    ManifestMalformed,
    /// The manifest references an entry the archive lacks.
    EntryMissing,
    /// The archive bytes are not a readable zip.
    ArchiveCorrupt,
    /// An entry path escapes the package root.
    PathTraversal,
    /// An asset path was recorded twice.
    DuplicateEntry,
}

impl IngestionError {
    /// Classify this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use packsync_ingest::artefact::download::FetchError;
    /// use packsync_ingest::error::{IngestionError, IngestionErrorKind};
    ///
    /// let err = IngestionError::from(FetchError::UnsupportedVersion {
    ///     version: "0.1".to_owned(),
    ///     expected: "3.518".to_owned(),
    /// });
    /// assert_eq!(err.kind(), IngestionErrorKind::UnsupportedVersion);
    /// ```
    #[must_use]
    pub fn kind(&self) -> IngestionErrorKind {
        match self {
            Self::Fetch(FetchError::UnsupportedVersion { .. }) => {
                IngestionErrorKind::UnsupportedVersion
            }
            Self::Fetch(FetchError::Transport { .. }) => IngestionErrorKind::TransportError,
            Self::Manifest(ManifestParseError::Missing { .. }) => {
                IngestionErrorKind::ManifestMissing
            }
            Self::Manifest(ManifestParseError::Malformed { .. }) => {
                IngestionErrorKind::ManifestMalformed
            }
            Self::Manifest(ManifestParseError::Extraction(inner)) | Self::Extraction(inner) => {
                extraction_kind(inner)
            }
            Self::Integrity(_) => IngestionErrorKind::DuplicateEntry,
        }
    }
}

fn extraction_kind(err: &ExtractionError) -> IngestionErrorKind {
    match err {
        ExtractionError::ArchiveCorrupt { .. } => IngestionErrorKind::ArchiveCorrupt,
        ExtractionError::EntryMissing { .. } => IngestionErrorKind::EntryMissing,
        ExtractionError::PathTraversal { .. } => IngestionErrorKind::PathTraversal,
    }
}

impl fmt::Display for IngestionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UnsupportedVersion => "unsupported version",
            Self::TransportError => "transport error",
            Self::ManifestMissing => "manifest missing",
            Self::ManifestMalformed => "manifest malformed",
            Self::EntryMissing => "entry missing",
            Self::ArchiveCorrupt => "archive corrupt",
            Self::PathTraversal => "path traversal",
            Self::DuplicateEntry => "duplicate entry",
        };
        f.write_str(label)
    }
}

/// Result type alias using [`IngestionError`].
pub type Result<T> = std::result::Result<T, IngestionError>;
