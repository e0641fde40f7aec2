//! Package retrieval, manifest schema, and archive access.
//!
//! # Sub-modules
//!
//! - [`download`]: Archive download trait and HTTP implementation.
//! - [`error`]: Validation errors for package identifiers.
//! - [`extraction`]: Entry extraction with path traversal protection.
//! - [`manifest`]: Manifest schema types (`Manifest`, `ManifestEntry`).
//! - [`manifest_parser`]: `meta.xml` deserialization.
//! - [`sha256_digest`]: Content digests (`Sha256Digest`).
//! - [`version`]: Package versions and their download descriptors.

pub mod download;
pub mod error;
pub mod extraction;
pub mod manifest;
pub mod manifest_parser;
pub mod sha256_digest;
pub mod version;
