//! The declared-dependency file, `truck.json`.
//!
//! # Format
//!
//! ```json
//! [
//!   { "url": "https://host/specs/zendesk-sdk.json", "version": "3.0.2" },
//!   { "name": "legacy-assets" }
//! ]
//! ```
//!
//! Each entry is either `{url, version}` (a normal declaration) or `{name}`
//! alone (a target kept in place from its on-disk pin). Entry order is
//! preserved on rewrite.
//!
//! # API pattern
//!
//! Functions take the working directory explicitly (`_at(work_dir, …)`), so
//! tests run against a `TempDir` and never the process working directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::json_file;
use crate::types::{DependencyDeclaration, TargetName};

pub const DECLARATION_FILENAME: &str = "truck.json";

/// One raw entry of `truck.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeclarationEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl DeclarationEntry {
    /// Validate this entry and convert it to the run's dependency model.
    pub fn to_declaration(&self, index: usize) -> Result<DependencyDeclaration, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidDeclaration {
            index,
            reason: reason.to_string(),
        };
        match (&self.name, &self.url, &self.version) {
            (None, Some(url), Some(version)) => DependencyDeclaration::declared(url, version)
                .ok_or_else(|| invalid("cannot derive a target name from url")),
            (Some(name), None, None) if !name.trim().is_empty() => {
                let name = name.trim();
                if !is_plain_name(name) {
                    return Err(invalid("name must not contain path separators or `..`"));
                }
                Ok(DependencyDeclaration::discovered(name))
            }
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                Err(invalid("use either {url, version} or {name}, not both"))
            }
            (None, Some(_), None) => Err(invalid("missing version")),
            (None, None, Some(_)) => Err(invalid("missing url")),
            _ => Err(invalid("expected {url, version} or {name}")),
        }
    }

    fn target_name(&self) -> Option<TargetName> {
        match (&self.name, &self.url) {
            (Some(name), None) => Some(TargetName::from(name.trim())),
            (None, Some(url)) => TargetName::from_spec_url(url),
            _ => None,
        }
    }
}

/// A target name doubles as a pin file name, so it must stay a single path
/// component.
fn is_plain_name(name: &str) -> bool {
    !name.contains(['/', '\\']) && !name.contains("..")
}

/// A loaded `truck.json`, remembering where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationFile {
    pub path: PathBuf,
    pub entries: Vec<DeclarationEntry>,
}

impl DeclarationFile {
    /// Validated dependencies in declaration order.
    pub fn dependencies(&self) -> Result<Vec<DependencyDeclaration>, ConfigError> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| entry.to_declaration(index))
            .collect()
    }

    /// Atomically write the entries back to [`DeclarationFile::path`].
    pub fn save(&self) -> Result<(), ConfigError> {
        json_file::write_atomic(&self.path, &self.entries)
    }
}

/// `<work_dir>/truck.json` (pure, no I/O).
pub fn declaration_path_at(work_dir: &Path) -> PathBuf {
    work_dir.join(DECLARATION_FILENAME)
}

/// Load `truck.json` from `work_dir`.
///
/// Returns `ConfigError::DeclarationNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed JSON.
pub fn load_at(work_dir: &Path) -> Result<DeclarationFile, ConfigError> {
    let path = declaration_path_at(work_dir);
    if !path.is_file() {
        return Err(ConfigError::DeclarationNotFound { path });
    }
    let entries: Vec<DeclarationEntry> = json_file::read(&path)?;
    Ok(DeclarationFile { path, entries })
}

/// Load and validate `truck.json` in one step.
pub fn load_dependencies_at(work_dir: &Path) -> Result<Vec<DependencyDeclaration>, ConfigError> {
    load_at(work_dir)?.dependencies()
}

/// Rewrite the declared version of `target` (case-insensitive match).
///
/// Only `{url, version}` entries can be rewritten; a name-only entry or an
/// unknown target yields `ConfigError::UnknownTarget`.
pub fn set_version_at(
    work_dir: &Path,
    target: &str,
    version: &str,
) -> Result<DependencyDeclaration, ConfigError> {
    let mut file = load_at(work_dir)?;
    let index = file
        .entries
        .iter()
        .position(|entry| {
            entry.url.is_some() && entry.target_name().is_some_and(|name| name.matches(target))
        })
        .ok_or_else(|| ConfigError::UnknownTarget {
            name: target.to_string(),
        })?;

    file.entries[index].version = Some(version.to_string());
    let updated = file.entries[index].to_declaration(index)?;
    file.save()?;
    tracing::info!(dependency = %updated.name, version, "declared version rewritten");
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provenance;
    use tempfile::TempDir;

    fn write(dir: &Path, json: &str) {
        std::fs::write(declaration_path_at(dir), json).unwrap();
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = load_at(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::DeclarationNotFound { .. }));
    }

    #[test]
    fn loads_both_entry_shapes_in_order() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            r#"[{"url": "https://x/b.json", "version": "2"}, {"name": "a"}]"#,
        );
        let deps = load_dependencies_at(tmp.path()).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name.as_str(), "b");
        assert_eq!(deps[0].provenance, Provenance::Declared);
        assert_eq!(deps[1].name.as_str(), "a");
        assert_eq!(deps[1].provenance, Provenance::Discovered);
    }

    #[test]
    fn rejects_mixed_entry() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            r#"[{"name": "a", "url": "https://x/a.json", "version": "1"}]"#,
        );
        let err = load_dependencies_at(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDeclaration { index: 0, .. }));
    }

    #[test]
    fn set_version_rewrites_only_matching_entry() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            r#"[{"url": "https://x/Alpha.json", "version": "1"},
                {"url": "https://x/beta.json", "version": "7"}]"#,
        );

        let updated = set_version_at(tmp.path(), "alpha", "1.1").unwrap();
        assert_eq!(updated.version.as_deref(), Some("1.1"));

        let file = load_at(tmp.path()).unwrap();
        assert_eq!(file.entries[0].version.as_deref(), Some("1.1"));
        assert_eq!(file.entries[1].version.as_deref(), Some("7"));
        assert!(file.entries[0].name.is_none(), "url entries never gain a name");
    }

    #[test]
    fn set_version_unknown_target() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), r#"[{"name": "pinned-only"}]"#);
        let err = set_version_at(tmp.path(), "pinned-only", "2").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTarget { .. }));
    }
}
