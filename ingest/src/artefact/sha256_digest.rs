//! SHA-256 content digests for package integrity records.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Lowercase hex SHA-256 of some content.
///
/// Only constructed by hashing, so the inner string is always 64 lowercase
/// hex characters.
///
/// # Examples
///
/// ```
/// use packsync_ingest::artefact::sha256_digest::Sha256Digest;
///
/// let digest = Sha256Digest::of(b"abc");
/// assert_eq!(
///     digest.as_str(),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Hash `bytes`. Total over every input, including the empty buffer.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// The digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
