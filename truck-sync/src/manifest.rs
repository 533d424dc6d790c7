//! Installed manifests ("pins").
//!
//! Persists one JSON document per target at
//! `<install_root>/.truck/pins/<target>.json`:
//!
//! ```json
//! { "version": "1.2.3", "files": ["Foo.framework", "README.md"], "synced_at": "…" }
//! ```
//!
//! A manifest exists only after a successful extraction and is the sole
//! record of which top-level install-root entries a target owns. Writes use
//! the `.tmp` + rename pattern so a pin is either the old one or the new one.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use truck_core::{Settings, TargetName};

use crate::error::{io_err, SyncError};

/// On-disk pin payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledManifest {
    pub version: String,
    #[serde(default)]
    pub files: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl InstalledManifest {
    pub fn new(version: impl Into<String>, files: BTreeSet<String>) -> Self {
        Self {
            version: version.into(),
            files,
            synced_at: Some(Utc::now()),
        }
    }
}

/// Load the manifest for `target`.
///
/// Returns `None` when the file is missing. An unreadable or malformed
/// manifest is logged and also treated as absent, so the target is
/// re-classified as stale instead of failing the run.
pub fn load(settings: &Settings, target: &TargetName) -> Result<Option<InstalledManifest>, SyncError> {
    let path = settings.manifest_path(target);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(&path, err)),
    };
    match serde_json::from_str(&contents) {
        Ok(manifest) => Ok(Some(manifest)),
        Err(err) => {
            warn!(dependency = %target, "ignoring malformed manifest {}: {err}", path.display());
            Ok(None)
        }
    }
}

/// Save the manifest for `target` atomically.
pub fn save(
    settings: &Settings,
    target: &TargetName,
    manifest: &InstalledManifest,
) -> Result<(), SyncError> {
    let path = settings.manifest_path(target);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid manifest path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(manifest)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

/// Delete the manifest for `target`. A missing manifest is not an error.
pub fn remove(settings: &Settings, target: &TargetName) -> Result<(), SyncError> {
    let path = settings.manifest_path(target);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Names of every target with a manifest on disk, sorted.
pub fn discover(settings: &Settings) -> Result<Vec<TargetName>, SyncError> {
    let dir = settings.pins_dir();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_err(&dir, err)),
    };

    let mut names: Vec<TargetName> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| {
            let path = PathBuf::from(e.file_name());
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                return None;
            }
            let stem = path.file_stem()?.to_string_lossy().into_owned();
            Some(TargetName::from(stem))
        })
        .collect();
    names.sort();
    Ok(names)
}
