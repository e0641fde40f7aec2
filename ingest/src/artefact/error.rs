//! Error types for package identifiers.
//!
//! Each variant provides a descriptive message identifying the invalid input
//! and the constraint that was violated.

use thiserror::Error;

/// Errors arising from invalid package identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtefactError {
    /// A package version identifier is empty or syntactically invalid.
    #[error("invalid package version \"{value}\": {reason}")]
    InvalidPackageVersion {
        /// The rejected identifier.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },
}

/// Result type alias using [`ArtefactError`].
pub type Result<T> = std::result::Result<T, ArtefactError>;
