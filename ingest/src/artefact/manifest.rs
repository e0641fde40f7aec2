//! Manifest schema types for resource packages.
//!
//! A package ships a `meta.xml` describing the assets and scripts it
//! contains and the functions it exports. The types here are the validated,
//! read-only form of that document produced by
//! [`parse_meta_xml`](super::manifest_parser::parse_meta_xml).

use serde::Serialize;
use std::fmt;

/// What a manifest entry is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A data file downloaded by clients (`<file>`).
    Asset,
    /// An executable script (`<script>`).
    Script,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset => f.write_str("asset"),
            Self::Script => f.write_str("script"),
        }
    }
}

/// Where a script or export runs.
///
/// Anything other than `client`, `server`, or `shared` is kept verbatim so
/// callers can report it; such entries are never distributed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptScope {
    /// Runs on connected clients.
    Client,
    /// Runs on the server only. The default when `type` is omitted.
    Server,
    /// Runs on both sides.
    Shared,
    /// An unrecognised `type` attribute value.
    Other(String),
}

impl ScriptScope {
    /// Interpret an optional `type` attribute.
    ///
    /// Matching is exact: surrounding whitespace or a different case yields
    /// [`ScriptScope::Other`].
    ///
    /// # Examples
    ///
    /// ```
    /// use packsync_ingest::artefact::manifest::ScriptScope;
    ///
    /// assert_eq!(ScriptScope::from_attribute(Some("client")), ScriptScope::Client);
    /// assert_eq!(ScriptScope::from_attribute(None), ScriptScope::Server);
    /// ```
    #[must_use]
    pub fn from_attribute(raw: Option<&str>) -> Self {
        match raw {
            None | Some("" | "server") => Self::Server,
            Some("client") => Self::Client,
            Some("shared") => Self::Shared,
            Some(other) => Self::Other(other.to_owned()),
        }
    }

    /// Whether this scope is exactly `client`.
    #[must_use]
    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client)
    }
}

impl fmt::Display for ScriptScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Server => f.write_str("server"),
            Self::Shared => f.write_str("shared"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// One `<file>` or `<script>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    source_path: String,
    role: Role,
    scope: ScriptScope,
    auto_download: Option<bool>,
}

impl ManifestEntry {
    /// An asset entry. Assets are always delivered to clients.
    #[must_use]
    pub fn asset(source_path: impl Into<String>, auto_download: Option<bool>) -> Self {
        Self {
            source_path: source_path.into(),
            role: Role::Asset,
            scope: ScriptScope::Client,
            auto_download,
        }
    }

    /// A script entry with the given scope.
    #[must_use]
    pub fn script(source_path: impl Into<String>, scope: ScriptScope) -> Self {
        Self {
            source_path: source_path.into(),
            role: Role::Script,
            scope,
            auto_download: None,
        }
    }

    /// Path relative to the package root.
    #[must_use]
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Asset or script.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Where the entry runs.
    #[must_use]
    pub fn scope(&self) -> &ScriptScope {
        &self.scope
    }

    /// Explicit `download` override from the manifest, if any.
    #[must_use]
    pub fn auto_download(&self) -> Option<bool> {
        self.auto_download
    }
}

/// One `<export>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestExport {
    function: String,
    scope: ScriptScope,
}

impl ManifestExport {
    /// Create an export declaration.
    #[must_use]
    pub fn new(function: impl Into<String>, scope: ScriptScope) -> Self {
        Self {
            function: function.into(),
            scope,
        }
    }

    /// The exported function name.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Where the function is callable.
    #[must_use]
    pub fn scope(&self) -> &ScriptScope {
        &self.scope
    }
}

/// The parsed package manifest.
///
/// Entries hold every `<file>` in document order followed by every
/// `<script>` in document order.
///
/// # Examples
///
/// ```
/// use packsync_ingest::artefact::manifest::{
///     Manifest, ManifestEntry, ManifestExport, Role, ScriptScope,
/// };
///
/// let manifest = Manifest::new(
///     vec![
///         ManifestEntry::asset("foo.txt", None),
///         ManifestEntry::script("bar.lua", ScriptScope::Client),
///     ],
///     vec![ManifestExport::new("dgsCreateButton", ScriptScope::Client)],
/// );
/// assert_eq!(manifest.entries_with_role(Role::Asset).count(), 1);
/// assert_eq!(manifest.client_exports(), vec!["dgsCreateButton"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    exports: Vec<ManifestExport>,
}

impl Manifest {
    /// Assemble a manifest from already-validated parts.
    #[must_use]
    pub fn new(entries: Vec<ManifestEntry>, exports: Vec<ManifestExport>) -> Self {
        Self { entries, exports }
    }

    /// Every entry in manifest order.
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Entries with the given role, in manifest order.
    pub fn entries_with_role(&self, role: Role) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(move |entry| entry.role() == role)
    }

    /// Every export declaration in manifest order.
    #[must_use]
    pub fn exports(&self) -> &[ManifestExport] {
        &self.exports
    }

    /// Names of exports whose scope is `client`, in manifest order.
    #[must_use]
    pub fn client_exports(&self) -> Vec<&str> {
        self.exports
            .iter()
            .filter(|export| export.scope().is_client())
            .map(ManifestExport::function)
            .collect()
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
