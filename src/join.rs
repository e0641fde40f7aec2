//! Readiness-gated distribution of the integrity registry to joining clients.
//!
//! Each join blocks until ingestion has resolved. A completed ingestion
//! broadcasts the registry snapshot to every connected client under the
//! configured label; a failed one publishes nothing and reports the failure
//! to the caller. Joins never observe a partially built registry.

use crate::session::{ClientId, PublishError, SessionTransport};
use crate::state::IngestionTracker;
use log::{debug, info, warn};
use packsync_ingest::catalog::Ingested;
use packsync_ingest::error::IngestionError;
use packsync_ingest::integrity::RegistrySnapshot;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// A join that resulted in a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The client whose join triggered the broadcast.
    pub client: ClientId,
    /// The snapshot that was published.
    pub snapshot: Arc<RegistrySnapshot>,
}

impl JoinOutcome {
    /// Number of integrity records published.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.snapshot.len()
    }
}

/// Why a join did not result in a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// Ingestion failed; there is nothing to publish.
    #[error("ingestion failed: {0}")]
    IngestionFailed(#[source] IngestionError),

    /// The session could not deliver the snapshot.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Handles client-join events for one resource instance.
pub struct JoinSynchronizer {
    tracker: Arc<IngestionTracker>,
    transport: Arc<dyn SessionTransport + Send + Sync>,
    label: String,
    snapshot: OnceLock<Arc<RegistrySnapshot>>,
}

impl std::fmt::Debug for JoinSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinSynchronizer")
            .field("label", &self.label)
            .field("state", &self.tracker.state())
            .finish_non_exhaustive()
    }
}

impl JoinSynchronizer {
    /// A synchroniser publishing under `label` once `tracker` resolves.
    #[must_use]
    pub fn new(
        tracker: Arc<IngestionTracker>,
        transport: Arc<dyn SessionTransport + Send + Sync>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            transport,
            label: label.into(),
            snapshot: OnceLock::new(),
        }
    }

    /// The label snapshots are published under.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Handle `client` joining the session.
    ///
    /// Blocks until ingestion resolves, then broadcasts the registry snapshot
    /// to all connected clients.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::IngestionFailed`] if ingestion failed, or
    /// [`JoinError::Publish`] if the transport rejected the broadcast.
    pub fn on_client_join(&self, client: &ClientId) -> Result<JoinOutcome, JoinError> {
        debug!(target: "packsync::join", "client {client} joined, awaiting ingestion");
        let ingested = self.tracker.wait().map_err(|reason| {
            warn!(
                target: "packsync::join",
                "not publishing to {client}: ingestion failed: {reason}"
            );
            JoinError::IngestionFailed(reason)
        })?;

        let snapshot = self.snapshot_of(&ingested);
        self.transport.broadcast(&self.label, &snapshot)?;
        info!(
            target: "packsync::join",
            "published {} integrity records under {} for {client}",
            snapshot.len(),
            self.label,
        );
        Ok(JoinOutcome {
            client: client.clone(),
            snapshot,
        })
    }

    fn snapshot_of(&self, ingested: &Ingested) -> Arc<RegistrySnapshot> {
        Arc::clone(
            self.snapshot
                .get_or_init(|| Arc::new(ingested.registry.snapshot())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockSessionTransport;
    use mockall::predicate::{always, eq};
    use packsync_ingest::artefact::extraction::ExtractionError;
    use packsync_ingest::integrity::{IntegrityRecord, IntegrityRegistryBuilder};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Debug, Default)]
    struct RecordingTransport {
        published: Mutex<Vec<(String, RegistrySnapshot, Instant)>>,
    }

    impl RecordingTransport {
        fn published(&self) -> Vec<(String, RegistrySnapshot, Instant)> {
            self.published.lock().expect("transport lock").clone()
        }
    }

    impl SessionTransport for RecordingTransport {
        fn broadcast(&self, label: &str, snapshot: &RegistrySnapshot) -> Result<(), PublishError> {
            self.published.lock().expect("transport lock").push((
                label.to_owned(),
                snapshot.clone(),
                Instant::now(),
            ));
            Ok(())
        }
    }

    fn ingested_with_foo() -> Ingested {
        let mut registry = IntegrityRegistryBuilder::new();
        registry
            .insert(IntegrityRecord::record("foo.txt", b"abc"))
            .expect("unique path");
        Ingested {
            registry: registry.freeze(),
            ..Ingested::default()
        }
    }

    fn entry_missing() -> IngestionError {
        IngestionError::from(ExtractionError::EntryMissing {
            path: "dgs-3.518/gone.png".to_owned(),
        })
    }

    fn in_flight() -> Arc<IngestionTracker> {
        let tracker = Arc::new(IngestionTracker::new());
        tracker.begin().expect("begin");
        tracker
    }

    #[test]
    fn completed_join_broadcasts_under_label() {
        let tracker = in_flight();
        tracker.complete(ingested_with_foo()).expect("complete");
        let transport = Arc::new(RecordingTransport::default());
        let sync = JoinSynchronizer::new(tracker, transport.clone(), "DGSI_FileInfo");

        let outcome = sync
            .on_client_join(&ClientId::new("player-1"))
            .expect("published");

        assert_eq!(outcome.entries(), 1);
        assert_eq!(outcome.client.as_str(), "player-1");
        let published = transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "DGSI_FileInfo");
        assert!(published[0].1.get("foo.txt").is_some());
    }

    #[test]
    fn failed_ingestion_publishes_nothing() {
        let tracker = in_flight();
        tracker.fail(entry_missing()).expect("fail");
        let mut transport = MockSessionTransport::new();
        transport.expect_broadcast().never();
        let sync = JoinSynchronizer::new(tracker, Arc::new(transport), "DGSI_FileInfo");

        let err = sync
            .on_client_join(&ClientId::new("player-1"))
            .expect_err("ingestion failed");
        assert_eq!(err, JoinError::IngestionFailed(entry_missing()));
    }

    #[test]
    fn transport_failure_is_surfaced() {
        let tracker = in_flight();
        tracker.complete(ingested_with_foo()).expect("complete");
        let mut transport = MockSessionTransport::new();
        transport
            .expect_broadcast()
            .with(eq("DGSI_FileInfo"), always())
            .times(1)
            .returning(|_, _| {
                Err(PublishError {
                    reason: "session closed".to_owned(),
                })
            });
        let sync = JoinSynchronizer::new(tracker, Arc::new(transport), "DGSI_FileInfo");

        let err = sync
            .on_client_join(&ClientId::new("player-1"))
            .expect_err("publish failed");
        assert!(matches!(err, JoinError::Publish(_)));
    }

    #[test]
    fn join_before_completion_waits_for_readiness() {
        let tracker = in_flight();
        let transport = Arc::new(RecordingTransport::default());
        let sync = Arc::new(JoinSynchronizer::new(
            Arc::clone(&tracker),
            transport.clone(),
            "DGSI_FileInfo",
        ));

        let joins: Vec<_> = ["early-1", "early-2"]
            .into_iter()
            .map(|name| {
                let sync = Arc::clone(&sync);
                thread::spawn(move || sync.on_client_join(&ClientId::new(name)))
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        assert!(transport.published().is_empty());

        tracker.complete(ingested_with_foo()).expect("complete");
        let outcomes: Vec<_> = joins
            .into_iter()
            .map(|join| join.join().expect("join thread").expect("published"))
            .collect();

        let resolved_at = tracker.resolved_at().expect("resolved");
        let published = transport.published();
        assert_eq!(published.len(), 2);
        assert!(published.iter().all(|(_, _, at)| *at >= resolved_at));
        assert_eq!(published[0].1, published[1].1);
        assert!(Arc::ptr_eq(&outcomes[0].snapshot, &outcomes[1].snapshot));
    }

    #[test]
    fn debug_omits_transport() {
        let sync = JoinSynchronizer::new(
            Arc::new(IngestionTracker::new()),
            Arc::new(RecordingTransport::default()),
            "label",
        );
        let rendered = format!("{sync:?}");
        assert!(rendered.contains("label"));
        assert!(rendered.contains("Pending"));
    }
}
