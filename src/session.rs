//! Collaborator seams towards the hosting session.
//!
//! The session runtime, its player model, and the data-sync primitive are
//! owned by the host. This module only names what the resource needs from
//! them.

use packsync_ingest::integrity::RegistrySnapshot;
use std::fmt;
use thiserror::Error;

/// Opaque identifier of a connected client, as assigned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Wrap a host-assigned identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The session's synchronised-data primitive failed to publish.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("session publish failed: {reason}")]
pub struct PublishError {
    /// Description supplied by the host.
    pub reason: String,
}

/// Broadcast channel offered by the hosting session.
///
/// Implementations deliver `snapshot` to every connected client under
/// `label`, replacing any value previously published under that label.
#[cfg_attr(test, mockall::automock)]
pub trait SessionTransport {
    /// Publish `snapshot` to all connected clients.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the host could not deliver the data.
    fn broadcast(&self, label: &str, snapshot: &RegistrySnapshot) -> Result<(), PublishError>;
}
