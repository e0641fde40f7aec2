//! Ingestion pipeline orchestration.
//!
//! Drives one ingestion attempt end to end: fetch the archive, parse the
//! manifest, extract and hash each entry, and assemble the catalog. The
//! first failing step aborts the attempt and its error is returned as-is.

use crate::artefact::download::{ArchiveDownloader, FetchedArchive, fetch_archive};
use crate::artefact::extraction::ZipPackage;
use crate::artefact::manifest_parser::parse_manifest;
use crate::artefact::version::{PackageVersion, VersionLookup};
use crate::catalog::{CatalogBuilder, Ingested};
use crate::error::Result;
use log::{debug, info};

/// Run Fetch → Parse → Extract → Hash → Catalog for `version`.
///
/// # Errors
///
/// Returns the first error raised by any step. No partial output is
/// returned on failure.
pub fn run_ingestion(
    version: &PackageVersion,
    lookup: &dyn VersionLookup,
    downloader: &dyn ArchiveDownloader,
) -> Result<Ingested> {
    info!(target: "packsync::ingest", "ingesting package {version}");
    let fetched = fetch_archive(version, lookup, downloader)?;
    let ingested = ingest_archive(fetched)?;
    info!(
        target: "packsync::ingest",
        "package {version} ingested: {} catalog entries, {} integrity records, {} exports",
        ingested.catalog.len(),
        ingested.registry.len(),
        ingested.catalog.exports().len(),
    );
    Ok(ingested)
}

/// Parse and catalog an archive that has already been downloaded.
///
/// # Errors
///
/// Returns an error if the archive is unreadable, the manifest is missing or
/// malformed, or a referenced entry cannot be extracted.
pub fn ingest_archive(fetched: FetchedArchive) -> Result<Ingested> {
    let FetchedArchive { descriptor, bytes } = fetched;
    let mut package = ZipPackage::open(bytes, descriptor.package_root())?;
    debug!(
        target: "packsync::ingest",
        "opened archive with {} entries, package root {}",
        package.len(),
        package.package_root(),
    );

    let manifest = parse_manifest(&mut package)?;
    debug!(
        target: "packsync::ingest",
        "manifest lists {} entries and {} exports",
        manifest.entries().len(),
        manifest.exports().len(),
    );

    CatalogBuilder::new(&manifest).build(&mut package)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
