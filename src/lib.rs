//! Session-facing half of packsync.
//!
//! A [`resource::PackageResource`] ingests one remote package version in the
//! background and hands the resulting integrity snapshot to every client that
//! joins the hosting session, but only once ingestion has completed.

pub mod config;
pub mod join;
pub mod resource;
pub mod session;
pub mod state;

pub use config::ResourceConfig;
pub use join::{JoinError, JoinOutcome, JoinSynchronizer};
pub use resource::{PackageResource, ResourceError};
pub use session::{ClientId, PublishError, SessionTransport};
pub use state::{IngestionState, IngestionTracker};
