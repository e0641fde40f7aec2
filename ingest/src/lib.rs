//! Ingestion pipeline for remotely hosted resource packages.
//!
//! This crate fetches a versioned package archive, parses its `meta.xml`
//! manifest, extracts the entries that are delivered to clients, and records
//! a content hash for every asset. It is used by the `packsync` resource to
//! populate its catalog in the background.
//!
//! # Modules
//!
//! - [`artefact`] - Download, manifest, and archive access
//! - [`catalog`] - Catalog construction and transport descriptors
//! - [`error`] - Ingestion error taxonomy
//! - [`integrity`] - Per-asset integrity records and the frozen registry
//! - [`pipeline`] - End-to-end ingestion driver

pub mod artefact;
pub mod catalog;
pub mod error;
pub mod integrity;
pub mod pipeline;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
