//! Domain types for truck.
//!
//! A *target* is a named dependency. It is either declared in `truck.json`
//! (`{url, version}`) or reconstructed from an on-disk pin (`{name}`); both
//! shapes share [`DependencyDeclaration`] and differ only by [`Provenance`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a dependency target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetName(pub String);

impl TargetName {
    /// Derive a target name from its spec URL: the file stem of the last
    /// path segment (`https://host/sdk/zendesk-sdk.json` → `zendesk-sdk`).
    pub fn from_spec_url(url: &str) -> Option<Self> {
        let without_query = url.split(['?', '#']).next().unwrap_or(url);
        let segment = without_query.trim_end_matches('/').rsplit('/').next()?;
        let stem = Path::new(segment).file_stem()?.to_string_lossy();
        if stem.is_empty() {
            return None;
        }
        Some(Self(stem.into_owned()))
    }

    /// Case-insensitive exact match, used for CLI target selection.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TargetName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TargetName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Where a dependency record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Declared in `truck.json` with a spec URL and a version.
    Declared,
    /// Reconstructed from its on-disk pin; carries a name only.
    Discovered,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Declared => write!(f, "declared"),
            Provenance::Discovered => write!(f, "discovered"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One dependency as the run sees it.
///
/// `spec_url` and `version` are both present for [`Provenance::Declared`]
/// and both absent for [`Provenance::Discovered`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDeclaration {
    pub name: TargetName,
    pub spec_url: Option<String>,
    pub version: Option<String>,
    pub provenance: Provenance,
}

impl DependencyDeclaration {
    /// A normal `{url, version}` declaration. Returns `None` when no name can
    /// be derived from `spec_url`.
    pub fn declared(spec_url: impl Into<String>, version: impl Into<String>) -> Option<Self> {
        let spec_url = spec_url.into();
        let name = TargetName::from_spec_url(&spec_url)?;
        Some(Self {
            name,
            spec_url: Some(spec_url),
            version: Some(version.into()),
            provenance: Provenance::Declared,
        })
    }

    /// A name-only record reconstructed from disk.
    pub fn discovered(name: impl Into<TargetName>) -> Self {
        Self {
            name: name.into(),
            spec_url: None,
            version: None,
            provenance: Provenance::Discovered,
        }
    }
}

/// A remote spec document: version string → binary artifact URL.
pub type Spec = BTreeMap<String, String>;

/// Parse a spec document.
///
/// Malformed content yields an empty mapping rather than an error so callers
/// fall through to the "version missing" path (and its stale-cache retry).
pub fn parse_spec(contents: &str) -> Spec {
    match serde_json::from_str::<Spec>(contents) {
        Ok(spec) => spec,
        Err(err) => {
            tracing::warn!("malformed spec document treated as empty: {err}");
            Spec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
