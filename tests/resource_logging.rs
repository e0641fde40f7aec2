//! Log output of the resource lifecycle.
//!
//! Kept in its own test binary because `logtest` installs a process-wide
//! logger.

use log::Level;
use logtest::Logger;
use packsync::config::ResourceConfig;
use packsync::resource::PackageResource;
use packsync::session::{PublishError, SessionTransport};
use packsync_ingest::artefact::version::{PackageDescriptor, PackageVersion, VersionTable};
use packsync_ingest::integrity::RegistrySnapshot;
use packsync_ingest::test_utils::{PackageFixture, StubDownloader};
use std::sync::Arc;

struct NullTransport;

impl SessionTransport for NullTransport {
    fn broadcast(&self, _: &str, _: &RegistrySnapshot) -> Result<(), PublishError> {
        Ok(())
    }
}

#[test]
fn ingestion_failure_is_logged_as_error() {
    let mut logger = Logger::start();
    let table = VersionTable::empty().with(PackageDescriptor::new(
        PackageVersion::try_from("3.518").expect("valid version"),
        "http://mirror.test/3.518.zip",
        "dgs-3.518",
    ));
    let package = PackageFixture::new("dgs-3.518").with_entry("foo.txt", b"abc");
    let resource = PackageResource::start_with(
        ResourceConfig::default(),
        Arc::new(table),
        Arc::new(StubDownloader::serving(package.build())),
        Arc::new(NullTransport),
    )
    .expect("resource started");

    resource.await_ready().expect_err("manifest missing");

    let mut logged = false;
    while let Some(record) = logger.pop() {
        if record.level() == Level::Error
            && record.target() == "packsync::resource"
            && record.args().to_string().contains("manifest missing")
        {
            logged = true;
        }
    }
    assert!(logged, "expected an error record naming the failure kind");
}
