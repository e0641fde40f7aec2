//! Per-file integrity records for distributed assets.
//!
//! Records are collected privately in an [`IntegrityRegistryBuilder`] while
//! the package is ingested, then frozen into an [`IntegrityRegistry`] that
//! is shared read-only between every reader. The published form handed to
//! session clients is the [`RegistrySnapshot`].

use crate::artefact::sha256_digest::Sha256Digest;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Content hash and size of one asset.
///
/// # Examples
///
/// ```
/// use packsync_ingest::integrity::IntegrityRecord;
///
/// let record = IntegrityRecord::record("foo.txt", b"abc");
/// assert_eq!(record.size_bytes(), 3);
/// assert_eq!(record, IntegrityRecord::record("foo.txt", b"abc"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityRecord {
    path: String,
    hash: Sha256Digest,
    size_bytes: u64,
}

impl IntegrityRecord {
    /// Hash `bytes` and record their length under `path`.
    #[must_use]
    pub fn record(path: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            path: path.into(),
            hash: Sha256Digest::of(bytes),
            size_bytes: bytes.len() as u64,
        }
    }

    /// Path relative to the package root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// SHA-256 of the content.
    #[must_use]
    pub fn hash(&self) -> &Sha256Digest {
        &self.hash
    }

    /// Content length in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Raised when a path is recorded twice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate integrity record for {path}")]
pub struct DuplicateRecord {
    /// The path that was already present.
    pub path: String,
}

/// Collects records during ingestion. Never shared.
#[derive(Debug, Default)]
pub struct IntegrityRegistryBuilder {
    records: BTreeMap<String, IntegrityRecord>,
}

impl IntegrityRegistryBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `record`, keeping path keys unique.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateRecord`] if the path is already present; the
    /// existing record is left untouched.
    pub fn insert(&mut self, record: IntegrityRecord) -> Result<(), DuplicateRecord> {
        if self.records.contains_key(record.path()) {
            return Err(DuplicateRecord {
                path: record.path().to_owned(),
            });
        }
        self.records.insert(record.path().to_owned(), record);
        Ok(())
    }

    /// Number of records collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freeze the collected records.
    #[must_use]
    pub fn freeze(self) -> IntegrityRegistry {
        IntegrityRegistry {
            records: Arc::new(self.records),
        }
    }
}

/// Immutable path → record mapping. Cloning shares the same storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityRegistry {
    records: Arc<BTreeMap<String, IntegrityRecord>>,
}

impl IntegrityRegistry {
    /// Look up the record for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&IntegrityRecord> {
        self.records.get(path)
    }

    /// Whether `path` has a record.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.records.contains_key(path)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ordered by path.
    pub fn iter(&self) -> impl Iterator<Item = &IntegrityRecord> {
        self.records.values()
    }

    /// The published form of the registry.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot(
            self.records
                .values()
                .map(|record| {
                    (
                        record.path().to_owned(),
                        SnapshotEntry {
                            hash: record.hash().as_str().to_owned(),
                            size_bytes: record.size_bytes(),
                        },
                    )
                })
                .collect(),
        )
    }
}

/// Hash and size as published to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    /// Lowercase hex SHA-256.
    pub hash: String,
    /// Content length in bytes.
    pub size_bytes: u64,
}

/// Path → (hash, size) mapping broadcast to session clients.
///
/// Serialises as a map keyed by path whose values carry `hash` and
/// `size_bytes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RegistrySnapshot(BTreeMap<String, SnapshotEntry>);

impl RegistrySnapshot {
    /// Look up the published entry for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&SnapshotEntry> {
        self.0.get(path)
    }

    /// Number of published entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Published paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn record_hashes_and_measures_content() {
        let record = IntegrityRecord::record("foo.txt", b"abc");
        assert_eq!(record.path(), "foo.txt");
        assert_eq!(record.hash().as_str(), ABC_SHA256);
        assert_eq!(record.size_bytes(), 3);
    }

    #[test]
    fn record_accepts_empty_content() {
        let record = IntegrityRecord::record("empty.bin", b"");
        assert_eq!(record.size_bytes(), 0);
        assert_eq!(record.hash().as_str().len(), 64);
    }

    #[test]
    fn identical_content_yields_identical_hash_across_paths() {
        let first = IntegrityRecord::record("a.png", b"same");
        let second = IntegrityRecord::record("b.png", b"same");
        assert_eq!(first.hash(), second.hash());
    }

    #[test]
    fn builder_rejects_duplicate_paths() {
        let mut builder = IntegrityRegistryBuilder::new();
        builder
            .insert(IntegrityRecord::record("a.png", b"one"))
            .expect("first insert");
        let err = builder
            .insert(IntegrityRecord::record("a.png", b"two"))
            .expect_err("duplicate");
        assert_eq!(err.path, "a.png");

        let registry = builder.freeze();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("a.png").map(IntegrityRecord::size_bytes),
            Some(3)
        );
    }

    #[test]
    fn frozen_registry_clones_share_storage() {
        let mut builder = IntegrityRegistryBuilder::new();
        builder
            .insert(IntegrityRecord::record("a.png", b"one"))
            .expect("insert");
        let registry = builder.freeze();
        let clone = registry.clone();
        assert!(Arc::ptr_eq(&registry.records, &clone.records));
    }

    #[test]
    fn snapshot_maps_paths_to_hash_and_size() {
        let mut builder = IntegrityRegistryBuilder::new();
        builder
            .insert(IntegrityRecord::record("foo.txt", b"abc"))
            .expect("insert");
        builder
            .insert(IntegrityRecord::record("bar.png", b""))
            .expect("insert");
        let snapshot = builder.freeze().snapshot();

        assert_eq!(snapshot.paths().collect::<Vec<_>>(), vec!["bar.png", "foo.txt"]);
        let foo = snapshot.get("foo.txt").expect("foo published");
        assert_eq!(foo.hash, ABC_SHA256);
        assert_eq!(foo.size_bytes, 3);
    }

    #[test]
    fn snapshot_serialises_as_path_keyed_map() {
        let mut builder = IntegrityRegistryBuilder::new();
        builder
            .insert(IntegrityRecord::record("foo.txt", b"abc"))
            .expect("insert");
        let json = serde_json::to_value(builder.freeze().snapshot()).expect("serialise");
        assert_eq!(json["foo.txt"]["hash"], ABC_SHA256);
        assert_eq!(json["foo.txt"]["size_bytes"], 3);
    }
}
