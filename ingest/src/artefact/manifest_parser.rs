//! Manifest deserialization for downloaded packages.
//!
//! Reads `meta.xml` from the package root and parses it into the validated
//! [`Manifest`] type. Structural problems (invalid XML, missing attributes,
//! unsafe or duplicate paths) are rejected at parse time so later pipeline
//! steps only see well-formed entries.

use super::extraction::{ContentExtractor, ExtractionError, validate_entry_path};
use super::manifest::{Manifest, ManifestEntry, ManifestExport, ScriptScope};
use serde::Deserialize;
use std::collections::HashSet;

/// Manifest location relative to the package root.
pub const MANIFEST_FILE: &str = "meta.xml";

/// Errors arising from manifest parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestParseError {
    /// The archive has no manifest at the expected location.
    #[error("manifest not found at {path}")]
    Missing {
        /// The archive path that was looked up.
        path: String,
    },

    /// The manifest exists but is structurally invalid.
    #[error("malformed manifest: {reason}")]
    Malformed {
        /// Description of the defect.
        reason: String,
    },

    /// The manifest entry could not be read from the archive.
    #[error("manifest could not be read: {0}")]
    Extraction(ExtractionError),
}

#[derive(Debug, Deserialize)]
struct MetaDocument {
    #[serde(rename = "file", default)]
    files: Vec<FileElement>,
    #[serde(rename = "script", default)]
    scripts: Vec<ScriptElement>,
    #[serde(rename = "export", default)]
    exports: Vec<ExportElement>,
}

#[derive(Debug, Deserialize)]
struct FileElement {
    #[serde(rename = "@src")]
    src: Option<String>,
    #[serde(rename = "@download")]
    download: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScriptElement {
    #[serde(rename = "@src")]
    src: Option<String>,
    #[serde(rename = "@type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExportElement {
    #[serde(rename = "@function")]
    function: Option<String>,
    #[serde(rename = "@type")]
    kind: Option<String>,
}

/// Read and parse the manifest of the package behind `extractor`.
///
/// # Errors
///
/// Returns [`ManifestParseError::Missing`] if the package has no
/// `meta.xml`, [`ManifestParseError::Malformed`] if it is not valid UTF-8 or
/// fails [`parse_meta_xml`], and [`ManifestParseError::Extraction`] for
/// other archive read failures.
pub fn parse_manifest(
    extractor: &mut dyn ContentExtractor,
) -> Result<Manifest, ManifestParseError> {
    let bytes = extractor
        .extract(MANIFEST_FILE)
        .map_err(|e| match e {
            ExtractionError::EntryMissing { path } => ManifestParseError::Missing { path },
            other => ManifestParseError::Extraction(other),
        })?;
    let text = std::str::from_utf8(&bytes).map_err(|e| ManifestParseError::Malformed {
        reason: format!("{MANIFEST_FILE} is not valid UTF-8: {e}"),
    })?;
    parse_meta_xml(text.trim_start_matches('\u{feff}'))
}

/// Parse `meta.xml` text into a validated [`Manifest`].
///
/// Unknown elements and attributes are ignored. A `<script>` or `<export>`
/// without a `type` attribute is server-side, and only an exact
/// `type="client"` marks it client-side. Text content directly inside
/// `<meta>` is not part of the format and makes the document malformed.
///
/// # Errors
///
/// Returns [`ManifestParseError::Malformed`] if the XML is invalid, a
/// `src` or `function` attribute is missing or empty, `<meta>` holds stray
/// text, a source path escapes
/// the package root, a `download` flag is not a boolean, or two entries share
/// a source path.
///
/// # Examples
///
/// ```
/// use packsync_ingest::artefact::manifest::Role;
/// use packsync_ingest::artefact::manifest_parser::parse_meta_xml;
///
/// let xml = r#"<meta>
///     <script src="client.lua" type="client"/>
///     <file src="logo.png"/>
///     <export function="dgsCreateWindow" type="client"/>
/// </meta>"#;
/// let manifest = parse_meta_xml(xml).expect("valid manifest");
/// assert_eq!(manifest.entries()[0].role(), Role::Asset);
/// assert_eq!(manifest.client_exports(), vec!["dgsCreateWindow"]);
/// ```
pub fn parse_meta_xml(xml: &str) -> Result<Manifest, ManifestParseError> {
    let document: MetaDocument =
        quick_xml::de::from_str(xml).map_err(|e| ManifestParseError::Malformed {
            reason: e.to_string(),
        })?;

    let mut entries = Vec::with_capacity(document.files.len() + document.scripts.len());
    for file in document.files {
        let source = required_path("file", file.src)?;
        let auto_download = parse_download_flag(&source, file.download.as_deref())?;
        entries.push(ManifestEntry::asset(source, auto_download));
    }
    for script in document.scripts {
        let source = required_path("script", script.src)?;
        entries.push(ManifestEntry::script(
            source,
            ScriptScope::from_attribute(script.kind.as_deref()),
        ));
    }
    reject_duplicates(&entries)?;

    let exports = document
        .exports
        .into_iter()
        .map(|export| {
            let function = required_attribute("export", "function", export.function)?;
            Ok(ManifestExport::new(
                function,
                ScriptScope::from_attribute(export.kind.as_deref()),
            ))
        })
        .collect::<Result<Vec<_>, ManifestParseError>>()?;

    Ok(Manifest::new(entries, exports))
}

fn required_attribute(
    element: &str,
    attribute: &str,
    value: Option<String>,
) -> Result<String, ManifestParseError> {
    match value.map(|raw| raw.trim().to_owned()) {
        Some(trimmed) if !trimmed.is_empty() => Ok(trimmed),
        _ => Err(ManifestParseError::Malformed {
            reason: format!("<{element}> is missing a non-empty `{attribute}` attribute"),
        }),
    }
}

fn required_path(element: &str, value: Option<String>) -> Result<String, ManifestParseError> {
    let source = required_attribute(element, "src", value)?;
    validate_entry_path(&source).map_err(|e| ManifestParseError::Malformed {
        reason: format!("<{element}> source rejected: {e}"),
    })?;
    Ok(source)
}

fn parse_download_flag(
    source: &str,
    raw: Option<&str>,
) -> Result<Option<bool>, ManifestParseError> {
    match raw.map(str::trim) {
        None => Ok(None),
        Some("true" | "1") => Ok(Some(true)),
        Some("false" | "0") => Ok(Some(false)),
        Some(other) => Err(ManifestParseError::Malformed {
            reason: format!("<file src=\"{source}\"> has non-boolean download=\"{other}\""),
        }),
    }
}

fn reject_duplicates(entries: &[ManifestEntry]) -> Result<(), ManifestParseError> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.source_path()) {
            return Err(ManifestParseError::Malformed {
                reason: format!("duplicate entry for {}", entry.source_path()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::extraction::MockContentExtractor;
    use crate::artefact::manifest::Role;
    use rstest::rstest;

    const VALID_META: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<meta>
    <info author="thisdp" type="script" name="dgs" version="3.518"/>
    <min_mta_version client="1.5.8" server="1.5.8"/>
    <script src="Core/api.lua" type="server"/>
    <script src="Core/core.lua" type="client" cache="false"/>
    <file src="image/cursor.png"/>
    <script src="Core/shared.lua" type="shared"/>
    <file src="image/ring.png" download="false"/>
    <!-- exported API -->
    <export function="dgsCreateWindow" type="client"/>
    <export function="dgsImportFunction" type="server"/>
    <export function="dgsCreateButton" type="client"/>
</meta>"#;

    #[test]
    fn parses_interleaved_elements() {
        let manifest = parse_meta_xml(VALID_META).expect("valid");
        let paths: Vec<(&str, Role)> = manifest
            .entries()
            .iter()
            .map(|entry| (entry.source_path(), entry.role()))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("image/cursor.png", Role::Asset),
                ("image/ring.png", Role::Asset),
                ("Core/api.lua", Role::Script),
                ("Core/core.lua", Role::Script),
                ("Core/shared.lua", Role::Script),
            ]
        );
        assert_eq!(manifest.entries()[1].auto_download(), Some(false));
        assert_eq!(manifest.entries()[3].scope(), &ScriptScope::Client);
        assert_eq!(manifest.entries()[4].scope(), &ScriptScope::Shared);
        assert_eq!(
            manifest.client_exports(),
            vec!["dgsCreateWindow", "dgsCreateButton"]
        );
    }

    #[test]
    fn empty_meta_has_no_entries() {
        let manifest = parse_meta_xml("<meta></meta>").expect("valid");
        assert!(manifest.entries().is_empty());
        assert!(manifest.exports().is_empty());
    }

    #[test]
    fn script_without_type_is_server_side() {
        let manifest = parse_meta_xml(r#"<meta><script src="a.lua"/></meta>"#).expect("valid");
        assert_eq!(manifest.entries()[0].scope(), &ScriptScope::Server);
    }

    #[test]
    fn client_type_must_match_exactly() {
        let xml = r#"<meta>
            <script src="padded.lua" type=" client "/>
            <script src="upper.lua" type="Client"/>
            <export function="paddedExport" type="client "/>
        </meta>"#;
        let manifest = parse_meta_xml(xml).expect("valid");
        assert!(manifest.entries().iter().all(|entry| !entry.scope().is_client()));
        assert!(manifest.client_exports().is_empty());
    }

    #[rstest]
    #[case::not_xml("{not xml")]
    #[case::missing_src("<meta><file/></meta>")]
    #[case::empty_src("<meta><script src=\" \" type=\"client\"/></meta>")]
    #[case::missing_function("<meta><export type=\"client\"/></meta>")]
    #[case::traversal("<meta><file src=\"../outside.png\"/></meta>")]
    #[case::absolute("<meta><file src=\"/etc/passwd\"/></meta>")]
    #[case::bad_download("<meta><file src=\"a.png\" download=\"maybe\"/></meta>")]
    #[case::duplicate_file("<meta><file src=\"a.png\"/><file src=\"a.png\"/></meta>")]
    #[case::text_between_elements(
        "<meta><file src=\"a.png\">x</file>text<script src=\"b.lua\" type=\"client\"/></meta>"
    )]
    #[case::duplicate_across_roles(
        "<meta><file src=\"a.lua\"/><script src=\"a.lua\" type=\"client\"/></meta>"
    )]
    fn rejects_malformed_documents(#[case] xml: &str) {
        let result = parse_meta_xml(xml);
        assert!(
            matches!(result, Err(ManifestParseError::Malformed { .. })),
            "expected Malformed for {xml}, got {result:?}"
        );
    }

    #[test]
    fn missing_manifest_maps_to_missing() {
        let mut extractor = MockContentExtractor::new();
        extractor.expect_extract().returning(|path| {
            Err(ExtractionError::EntryMissing {
                path: format!("dgs-3.518/{path}"),
            })
        });
        let err = parse_manifest(&mut extractor).expect_err("missing");
        assert_eq!(
            err,
            ManifestParseError::Missing {
                path: "dgs-3.518/meta.xml".to_owned()
            }
        );
    }

    #[test]
    fn corrupt_manifest_entry_is_an_extraction_error() {
        let mut extractor = MockContentExtractor::new();
        extractor.expect_extract().returning(|_| {
            Err(ExtractionError::ArchiveCorrupt {
                reason: "bad deflate stream".to_owned(),
            })
        });
        assert!(matches!(
            parse_manifest(&mut extractor),
            Err(ManifestParseError::Extraction(_))
        ));
    }

    #[test]
    fn non_utf8_manifest_is_malformed() {
        let mut extractor = MockContentExtractor::new();
        extractor
            .expect_extract()
            .returning(|_| Ok(vec![0xff, 0xfe, b'<']));
        assert!(matches!(
            parse_manifest(&mut extractor),
            Err(ManifestParseError::Malformed { .. })
        ));
    }

    #[test]
    fn byte_order_mark_is_tolerated() {
        let mut extractor = MockContentExtractor::new();
        extractor
            .expect_extract()
            .withf(|path| path == MANIFEST_FILE)
            .returning(|_| {
                let mut bytes = "\u{feff}".as_bytes().to_vec();
                bytes.extend_from_slice(br#"<meta><file src="a.png"/></meta>"#);
                Ok(bytes)
            });
        let manifest = parse_manifest(&mut extractor).expect("valid");
        assert_eq!(manifest.entries().len(), 1);
    }
}
