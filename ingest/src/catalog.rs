//! Typed catalog of distributable package content.
//!
//! [`CatalogBuilder`] walks a parsed manifest, extracts every entry that is
//! delivered to clients, and records integrity data for assets. The result is
//! only handed out once every entry has been processed, so a failure never
//! leaves a partially populated catalog behind.

use crate::artefact::extraction::ContentExtractor;
use crate::artefact::manifest::{Manifest, ManifestEntry, Role};
use crate::error::IngestionError;
use crate::integrity::{IntegrityRecord, IntegrityRegistry, IntegrityRegistryBuilder};
use log::{debug, trace};
use md5::{Digest, Md5};
use serde::Serialize;
use std::sync::Arc;

/// One extracted file ready for distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    path: String,
    bytes: Arc<[u8]>,
    role: Role,
    auto_download: bool,
}

impl CatalogEntry {
    /// Path relative to the package root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw content.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the content, for transports that outlive the borrow.
    #[must_use]
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Asset or script.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether clients fetch this entry without being asked.
    #[must_use]
    pub fn auto_download(&self) -> bool {
        self.auto_download
    }

    /// Transport descriptor for this entry.
    #[must_use]
    pub fn resource_file(&self) -> ResourceFile {
        let mut md5 = [0u8; 16];
        md5.copy_from_slice(&Md5::digest(&self.bytes));
        ResourceFile {
            name: self.path.clone(),
            approximate_size: self.bytes.len() as u64,
            checksum: crc32fast::hash(&self.bytes),
            md5,
            file_type: match self.role {
                Role::Asset => ResourceFileType::ClientFile,
                Role::Script => ResourceFileType::ClientScript,
            },
            is_auto_download: self.auto_download.then_some(true),
        }
    }
}

/// Kind of file as understood by the distribution transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceFileType {
    /// A data file.
    ClientFile,
    /// A script executed by the client.
    ClientScript,
}

/// Descriptor handed to the distribution transport for one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceFile {
    /// Path relative to the package root.
    pub name: String,
    /// Content length in bytes.
    pub approximate_size: u64,
    /// CRC32 of the content.
    #[serde(rename = "CheckSum")]
    pub checksum: u32,
    /// MD5 of the content.
    pub md5: [u8; 16],
    /// File or script.
    pub file_type: ResourceFileType,
    /// `Some(true)` for auto-download entries, unset otherwise.
    pub is_auto_download: Option<bool>,
}

/// Every distributable entry plus the client export list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    exports: Vec<String>,
}

impl Catalog {
    /// Entries in manifest order: assets first, then client scripts.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Look up an entry by path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.path() == path)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Client-side exported function names in manifest order.
    #[must_use]
    pub fn exports(&self) -> &[String] {
        &self.exports
    }

    /// Transport descriptors for every entry, in catalog order.
    #[must_use]
    pub fn resource_files(&self) -> Vec<ResourceFile> {
        self.entries.iter().map(CatalogEntry::resource_file).collect()
    }
}

/// The complete output of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ingested {
    /// Distributable entries and exports.
    pub catalog: Catalog,
    /// Integrity records for every asset.
    pub registry: IntegrityRegistry,
}

/// Builds a [`Catalog`] and its [`IntegrityRegistry`] from a manifest.
///
/// # Examples
///
/// ```
/// use packsync_ingest::artefact::extraction::ZipPackage;
/// use packsync_ingest::artefact::manifest::{Manifest, ManifestEntry};
/// use packsync_ingest::catalog::CatalogBuilder;
/// use packsync_ingest::test_utils::PackageFixture;
///
/// let bytes = PackageFixture::new("pkg").with_entry("foo.txt", b"abc").build();
/// let mut package = ZipPackage::open(bytes, "pkg").expect("valid zip");
/// let manifest = Manifest::new(vec![ManifestEntry::asset("foo.txt", None)], Vec::new());
///
/// let ingested = CatalogBuilder::new(&manifest)
///     .build(&mut package)
///     .expect("catalog");
/// assert_eq!(ingested.catalog.len(), 1);
/// assert!(ingested.registry.contains("foo.txt"));
/// ```
#[derive(Debug)]
pub struct CatalogBuilder<'a> {
    manifest: &'a Manifest,
}

impl<'a> CatalogBuilder<'a> {
    /// A builder over `manifest`.
    #[must_use]
    pub fn new(manifest: &'a Manifest) -> Self {
        Self { manifest }
    }

    /// Extract, hash, and catalog every distributable entry.
    ///
    /// Assets become non-auto-download entries unless the manifest overrides
    /// it and always get an integrity record. Client scripts become
    /// auto-download entries without a record. Other scripts are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first extraction or integrity failure; nothing built so
    /// far is returned in that case.
    pub fn build(self, extractor: &mut dyn ContentExtractor) -> Result<Ingested, IngestionError> {
        let mut entries = Vec::new();
        let mut registry = IntegrityRegistryBuilder::new();

        for entry in self.manifest.entries() {
            if !is_distributed(entry) {
                trace!(
                    target: "packsync::ingest",
                    "skipping {} script {}",
                    entry.scope(),
                    entry.source_path(),
                );
                continue;
            }
            let bytes = extractor.extract(entry.source_path())?;
            let auto_download = match entry.role() {
                Role::Asset => {
                    registry.insert(IntegrityRecord::record(entry.source_path(), &bytes))?;
                    entry.auto_download().unwrap_or(false)
                }
                Role::Script => true,
            };
            entries.push(CatalogEntry {
                path: entry.source_path().to_owned(),
                bytes: bytes.into(),
                role: entry.role(),
                auto_download,
            });
        }

        let exports = self
            .manifest
            .client_exports()
            .into_iter()
            .map(str::to_owned)
            .collect();
        debug!(
            target: "packsync::ingest",
            "catalogued {} entries ({} hashed assets)",
            entries.len(),
            registry.len(),
        );
        Ok(Ingested {
            catalog: Catalog { entries, exports },
            registry: registry.freeze(),
        })
    }
}

fn is_distributed(entry: &ManifestEntry) -> bool {
    match entry.role() {
        Role::Asset => true,
        Role::Script => entry.scope().is_client(),
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
