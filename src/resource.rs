//! The owning resource instance.
//!
//! A [`PackageResource`] resolves its package version at construction, then
//! runs exactly one ingestion attempt on a background thread. Join handling
//! is delegated to a [`JoinSynchronizer`] that shares the resource's
//! readiness tracker.

use crate::config::ResourceConfig;
use crate::join::{JoinError, JoinOutcome, JoinSynchronizer};
use crate::session::{ClientId, SessionTransport};
use crate::state::{IngestionState, IngestionTracker};
use log::{error, info, warn};
use packsync_ingest::artefact::download::{ArchiveDownloader, FetchError, HttpDownloader};
use packsync_ingest::artefact::version::{PackageVersion, VersionLookup, VersionTable};
use packsync_ingest::catalog::{Catalog, Ingested, ResourceFile};
use packsync_ingest::error::IngestionError;
use packsync_ingest::pipeline::run_ingestion;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use thiserror::Error;

/// Name of the background ingestion thread.
const WORKER_THREAD_NAME: &str = "packsync-ingest";

/// Errors raised while constructing a [`PackageResource`].
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The configured version has no download descriptor. Identifiers that
    /// cannot name any package, such as an empty string, land here too.
    #[error(transparent)]
    UnsupportedVersion(#[from] FetchError),

    /// The ingestion thread could not be started.
    #[error("failed to spawn ingestion worker: {0}")]
    Spawn(#[source] io::Error),
}

/// A loaded package resource serving one hosting session.
///
/// # Examples
///
/// ```no_run
/// use packsync::config::ResourceConfig;
/// use packsync::resource::PackageResource;
/// use packsync::session::{ClientId, PublishError, SessionTransport};
/// use packsync_ingest::integrity::RegistrySnapshot;
/// use std::sync::Arc;
///
/// struct Host;
///
/// impl SessionTransport for Host {
///     fn broadcast(&self, _: &str, _: &RegistrySnapshot) -> Result<(), PublishError> {
///         Ok(())
///     }
/// }
///
/// let resource = PackageResource::start(ResourceConfig::default(), Arc::new(Host))
///     .expect("built-in version");
/// let outcome = resource.on_client_join(&ClientId::new("player-1"));
/// ```
#[derive(Debug)]
pub struct PackageResource {
    config: ResourceConfig,
    version: PackageVersion,
    tracker: Arc<IngestionTracker>,
    synchronizer: JoinSynchronizer,
}

impl PackageResource {
    /// Start a resource against the built-in version table over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError`] if the configured version is unsupported or
    /// the worker thread cannot be spawned.
    pub fn start(
        config: ResourceConfig,
        transport: Arc<dyn SessionTransport + Send + Sync>,
    ) -> Result<Self, ResourceError> {
        let downloader = HttpDownloader::new(config.fetch_timeout());
        Self::start_with(
            config,
            Arc::new(VersionTable::builtin()),
            Arc::new(downloader),
            transport,
        )
    }

    /// Start a resource with explicit collaborators.
    ///
    /// The version is resolved before the worker is spawned, so an unmapped
    /// version fails here and never reaches the network.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::UnsupportedVersion`] if the configured
    /// version is not mapped by `lookup`, and [`ResourceError::Spawn`] if the
    /// worker thread cannot be spawned.
    pub fn start_with(
        config: ResourceConfig,
        lookup: Arc<dyn VersionLookup + Send + Sync>,
        downloader: Arc<dyn ArchiveDownloader + Send + Sync>,
        transport: Arc<dyn SessionTransport + Send + Sync>,
    ) -> Result<Self, ResourceError> {
        let version = config.package_version().map_err(|err| {
            warn!(target: "packsync::resource", "{err}");
            FetchError::UnsupportedVersion {
                version: config.version.clone(),
                expected: lookup.supported_versions().join(", "),
            }
        })?;
        let descriptor = lookup.resolve(&version)?;
        info!(
            target: "packsync::resource",
            "starting resource {} with package {version} from {}",
            config.resource_name,
            descriptor.url(),
        );

        let tracker = Arc::new(IngestionTracker::new());
        spawn_worker(
            &config.resource_name,
            version.clone(),
            lookup,
            downloader,
            Arc::clone(&tracker),
        )?;

        let synchronizer =
            JoinSynchronizer::new(Arc::clone(&tracker), transport, config.sync_label.clone());
        Ok(Self {
            config,
            version,
            tracker,
            synchronizer,
        })
    }

    /// The configuration this resource was started with.
    #[must_use]
    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// The package version being ingested.
    #[must_use]
    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    /// The current ingestion state.
    #[must_use]
    pub fn state(&self) -> IngestionState {
        self.tracker.state()
    }

    /// When ingestion resolved, if it has.
    #[must_use]
    pub fn resolved_at(&self) -> Option<Instant> {
        self.tracker.resolved_at()
    }

    /// Block until ingestion resolves.
    ///
    /// # Errors
    ///
    /// Returns the ingestion failure reason.
    pub fn await_ready(&self) -> Result<Arc<Ingested>, IngestionError> {
        self.tracker.wait()
    }

    /// Handle a client joining the session.
    ///
    /// # Errors
    ///
    /// See [`JoinSynchronizer::on_client_join`].
    pub fn on_client_join(&self, client: &ClientId) -> Result<JoinOutcome, JoinError> {
        self.synchronizer.on_client_join(client)
    }

    /// The join handler bound to this resource.
    #[must_use]
    pub fn synchronizer(&self) -> &JoinSynchronizer {
        &self.synchronizer
    }

    /// The catalog, or an empty one unless ingestion has completed.
    ///
    /// Never blocks.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        self.completed()
            .map(|ingested| ingested.catalog.clone())
            .unwrap_or_default()
    }

    /// Distribution descriptors for the catalog; empty unless completed.
    #[must_use]
    pub fn resource_files(&self) -> Vec<ResourceFile> {
        self.completed()
            .map(|ingested| ingested.catalog.resource_files())
            .unwrap_or_default()
    }

    /// Client-callable exports; empty unless completed.
    #[must_use]
    pub fn exports(&self) -> Vec<String> {
        self.completed()
            .map(|ingested| ingested.catalog.exports().to_vec())
            .unwrap_or_default()
    }

    fn completed(&self) -> Option<Arc<Ingested>> {
        self.tracker.try_outcome().and_then(Result::ok)
    }
}

fn spawn_worker(
    resource_name: &str,
    version: PackageVersion,
    lookup: Arc<dyn VersionLookup + Send + Sync>,
    downloader: Arc<dyn ArchiveDownloader + Send + Sync>,
    tracker: Arc<IngestionTracker>,
) -> Result<(), ResourceError> {
    let name = resource_name.to_owned();
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_owned())
        .spawn(move || {
            let _guard = ResolveGuard(Arc::clone(&tracker));
            if let Err(err) = tracker.begin() {
                warn!(target: "packsync::resource", "ingestion for {name} not started: {err}");
                return;
            }
            match run_ingestion(&version, lookup.as_ref(), downloader.as_ref()) {
                Ok(ingested) => {
                    let entries = ingested.catalog.len();
                    if let Err(err) = tracker.complete(ingested) {
                        warn!(target: "packsync::resource", "discarding output for {name}: {err}");
                    } else {
                        info!(
                            target: "packsync::resource",
                            "resource {name} ready with {entries} catalog entries"
                        );
                    }
                }
                Err(reason) => {
                    error!(
                        target: "packsync::resource",
                        "ingestion of package {version} for {name} failed ({}): {reason}",
                        reason.kind(),
                    );
                    if let Err(err) = tracker.fail(reason) {
                        warn!(target: "packsync::resource", "failure for {name} not recorded: {err}");
                    }
                }
            }
        })
        .map(drop)
        .map_err(ResourceError::Spawn)
}

/// Fails the tracker if the worker unwinds before resolving it, so waiters
/// are never left blocked.
struct ResolveGuard(Arc<IngestionTracker>);

impl Drop for ResolveGuard {
    fn drop(&mut self) {
        if self.0.state().is_terminal() {
            return;
        }
        let reason = IngestionError::from(FetchError::Transport {
            url: String::new(),
            reason: "ingestion worker exited before resolving".to_owned(),
        });
        if self.0.fail(reason).is_ok() {
            error!(target: "packsync::resource", "ingestion worker exited before resolving");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PublishError;
    use packsync_ingest::artefact::version::PackageDescriptor;
    use packsync_ingest::error::IngestionErrorKind;
    use packsync_ingest::integrity::RegistrySnapshot;
    use packsync_ingest::test_utils::{PackageFixture, StubDownloader};
    use rstest::rstest;

    const ROOT: &str = "dgs-3.518";

    #[derive(Debug, Default)]
    struct NullTransport;

    impl SessionTransport for NullTransport {
        fn broadcast(&self, _: &str, _: &RegistrySnapshot) -> Result<(), PublishError> {
            Ok(())
        }
    }

    fn table() -> Arc<VersionTable> {
        let version = PackageVersion::try_from("3.518").expect("valid version");
        Arc::new(VersionTable::empty().with(PackageDescriptor::new(
            version,
            "http://mirror.test/3.518.zip",
            ROOT,
        )))
    }

    fn start(downloader: Arc<StubDownloader>) -> Result<PackageResource, ResourceError> {
        PackageResource::start_with(
            ResourceConfig::default(),
            table(),
            downloader,
            Arc::new(NullTransport),
        )
    }

    #[test]
    fn completes_and_exposes_catalog() {
        let downloader = Arc::new(StubDownloader::serving(PackageFixture::sample(ROOT).build()));
        let resource = start(Arc::clone(&downloader)).expect("started");

        let ingested = resource.await_ready().expect("completed");
        assert_eq!(ingested.catalog.len(), 2);
        assert_eq!(resource.state(), IngestionState::Completed);
        assert_eq!(resource.catalog().len(), 2);
        assert_eq!(resource.resource_files().len(), 2);
        assert_eq!(resource.exports(), vec!["sampleClientExport".to_owned()]);
        assert_eq!(downloader.requests(), 1);
    }

    #[test]
    fn failure_leaves_catalog_empty() {
        let fixture = PackageFixture::new(ROOT)
            .with_manifest(r#"<meta><file src="missing.png"/></meta>"#);
        let resource = start(Arc::new(StubDownloader::serving(fixture.build()))).expect("started");

        let err = resource.await_ready().expect_err("entry missing");
        assert_eq!(err.kind(), IngestionErrorKind::EntryMissing);
        assert!(resource.catalog().is_empty());
        assert!(resource.resource_files().is_empty());
        assert!(resource.exports().is_empty());
    }

    #[test]
    fn unsupported_version_fails_fast() {
        let downloader = Arc::new(StubDownloader::serving(Vec::new()));
        let config = ResourceConfig {
            version: "9.999".to_owned(),
            ..ResourceConfig::default()
        };
        let err = PackageResource::start_with(
            config,
            table(),
            downloader.clone(),
            Arc::new(NullTransport),
        )
        .expect_err("unsupported");

        assert!(matches!(
            err,
            ResourceError::UnsupportedVersion(FetchError::UnsupportedVersion { .. })
        ));
        assert_eq!(downloader.requests(), 0);
    }

    #[rstest]
    #[case::whitespace("3 518")]
    #[case::empty("")]
    #[case::path("3.518/../x")]
    fn unusable_version_is_unsupported(#[case] raw: &str) {
        let downloader = Arc::new(StubDownloader::serving(Vec::new()));
        let config = ResourceConfig {
            version: raw.to_owned(),
            ..ResourceConfig::default()
        };
        let err = PackageResource::start_with(
            config,
            table(),
            downloader.clone(),
            Arc::new(NullTransport),
        )
        .expect_err("unusable version");

        match err {
            ResourceError::UnsupportedVersion(FetchError::UnsupportedVersion {
                version,
                expected,
            }) => {
                assert_eq!(version, raw);
                assert_eq!(expected, "3.518");
            }
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
        assert_eq!(downloader.requests(), 0);
    }

    #[test]
    fn catalog_is_empty_while_in_flight() {
        let (downloader, gate) =
            StubDownloader::serving(PackageFixture::sample(ROOT).build()).gated();
        let resource = start(Arc::new(downloader)).expect("started");

        assert!(!resource.state().is_terminal());
        assert!(resource.catalog().is_empty());

        gate.release();
        resource.await_ready().expect("completed");
        assert_eq!(resource.catalog().len(), 2);
    }

    #[test]
    fn guard_fails_unresolved_tracker() {
        let tracker = Arc::new(IngestionTracker::new());
        tracker.begin().expect("begin");
        drop(ResolveGuard(Arc::clone(&tracker)));
        assert_eq!(
            tracker.wait().expect_err("failed").kind(),
            IngestionErrorKind::TransportError
        );
    }

    #[test]
    fn guard_leaves_resolved_tracker_alone() {
        let tracker = Arc::new(IngestionTracker::new());
        tracker.begin().expect("begin");
        tracker.complete(Ingested::default()).expect("complete");
        drop(ResolveGuard(Arc::clone(&tracker)));
        assert_eq!(tracker.state(), IngestionState::Completed);
    }
}
