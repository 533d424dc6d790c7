//! Sync orchestration.
//!
//! ## Batch protocol
//!
//! 1. Classify every record; stale ones form the batch. An empty batch does
//!    no I/O beyond reading pins.
//! 2. Reset the shared scratch workspace (`.truck/tmp`).
//! 3. Per stale dependency, sequentially: resolve spec → fetch binary →
//!    remove files owned by the previous pin (minus protected files) →
//!    extract → write the new pin.
//! 4. Remove the scratch workspace.
//!
//! The pin is always the last write for a dependency. Any failure before it
//! leaves the old pin in place, so the dependency is still stale next run.
//! A failure only ends that dependency's steps; siblings carry on.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Component, Path};

use tracing::{info, warn};

use truck_core::settings::STATE_DIRNAME;
use truck_core::{DependencyDeclaration, Provenance, Settings, TargetName};

use crate::error::{io_err, SyncError};
use crate::extract;
use crate::fetch::Fetcher;
use crate::manifest::{self, InstalledManifest};
use crate::record::DependencyRecord;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Which dependencies a sync batch covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Only dependencies whose pin is missing or differs (`truck sync`).
    Stale,
    /// Every fetchable dependency regardless of pins (`truck pull`).
    All,
}

/// Outcome for one dependency of a batch.
#[derive(Debug)]
pub enum DependencyOutcome {
    /// Extracted and pinned. `warnings` lists best-effort cleanup misses.
    Synced {
        name: TargetName,
        version: String,
        files: usize,
        warnings: Vec<String>,
    },
    /// Stopped before the pin write; the previous pin (if any) is intact.
    Failed { name: TargetName, error: SyncError },
}

impl DependencyOutcome {
    pub fn name(&self) -> &TargetName {
        match self {
            DependencyOutcome::Synced { name, .. } | DependencyOutcome::Failed { name, .. } => name,
        }
    }
}

/// Result of a sync batch.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Dependencies left alone because they were already in sync.
    pub up_to_date: Vec<TargetName>,
    /// One entry per dependency in the batch, in declaration order.
    pub outcomes: Vec<DependencyOutcome>,
}

impl SyncReport {
    /// Nothing needed fetching.
    pub fn is_up_to_date(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DependencyOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, DependencyOutcome::Failed { .. }))
    }
}

/// Staleness classification shown by `truck list` / `truck check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Pinned at the wanted version.
    Current,
    /// Pinned at a different version.
    Stale { installed: String },
    /// No pin on disk.
    NeverSynced,
    /// Pinned on disk but no longer declared.
    Orphaned,
}

/// One row of [`SyncEngine::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStatus {
    pub name: TargetName,
    pub provenance: Provenance,
    pub declared_version: Option<String>,
    pub installed_version: Option<String>,
    pub state: SyncState,
}

impl TargetStatus {
    /// Declared (or name-only) and pinned at the wanted version.
    pub fn is_in_sync(&self) -> bool {
        self.state == SyncState::Current
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SyncEngine {
    settings: Settings,
    fetcher: Fetcher,
}

impl SyncEngine {
    pub fn new(settings: Settings, fetcher: Fetcher) -> Self {
        Self { settings, fetcher }
    }

    /// Engine with the default network transport.
    pub fn from_settings(settings: Settings) -> Self {
        let fetcher = Fetcher::from_settings(&settings);
        Self::new(settings, fetcher)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// One record per declaration, with pins loaded.
    pub fn records(
        &self,
        declarations: &[DependencyDeclaration],
    ) -> Result<Vec<DependencyRecord>, SyncError> {
        declarations
            .iter()
            .map(|d| DependencyRecord::load(&self.settings, d))
            .collect()
    }

    /// Run a sync batch over `declarations`.
    ///
    /// Returns `Err` only for failures that make the whole batch impossible
    /// (unreadable pins, scratch workspace not creatable). Per-dependency
    /// failures are reported in [`SyncReport::outcomes`].
    pub fn sync(
        &self,
        declarations: &[DependencyDeclaration],
        mode: SyncMode,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        let mut batch = Vec::new();
        for record in self.records(declarations)? {
            let wanted = match mode {
                SyncMode::Stale => record.is_out_of_sync(),
                SyncMode::All => record.spec_url.is_some() || record.is_out_of_sync(),
            };
            if wanted {
                batch.push(record);
            } else {
                report.up_to_date.push(record.name);
            }
        }

        if batch.is_empty() {
            info!("all dependencies are up to date");
            return Ok(report);
        }

        let scratch = self.settings.scratch_dir();
        reset_dir(&scratch)?;

        for mut record in batch {
            let name = record.name.clone();
            let outcome = match self.sync_one(&mut record, declarations, &scratch) {
                Ok((version, files, warnings)) => {
                    info!(dependency = %name, %version, files, "synced");
                    DependencyOutcome::Synced {
                        name,
                        version,
                        files,
                        warnings,
                    }
                }
                Err(error) => {
                    warn!(dependency = %name, "sync failed: {error}");
                    DependencyOutcome::Failed { name, error }
                }
            };
            report.outcomes.push(outcome);
        }

        if let Err(err) = std::fs::remove_dir_all(&scratch) {
            if err.kind() != ErrorKind::NotFound {
                warn!("could not remove scratch workspace {}: {err}", scratch.display());
            }
        }
        Ok(report)
    }

    fn sync_one(
        &self,
        record: &mut DependencyRecord,
        declarations: &[DependencyDeclaration],
        scratch: &Path,
    ) -> Result<(String, usize, Vec<String>), SyncError> {
        record.download_spec(&self.fetcher, scratch)?;
        let archive = record.download_binary(&self.fetcher, scratch)?.to_path_buf();

        let excluded = BTreeSet::from([record.name.clone()]);
        let protected = self.protected_files(declarations, &excluded)?;
        let warnings = self.remove_files(&record.owned_files(), &protected);

        extract::extract_into(&archive, &self.settings.install_root)?;

        let version = record
            .declared_version
            .clone()
            .ok_or_else(|| SyncError::NotFetchable {
                target: record.name.clone(),
            })?;
        let pin = InstalledManifest::new(version.clone(), record.new_files.clone());
        manifest::save(&self.settings, &record.name, &pin)?;
        record.manifest = Some(pin);
        Ok((version, record.new_files.len(), warnings))
    }

    /// Per-target staleness for every declaration, followed by pinned targets
    /// that are no longer declared.
    pub fn status(
        &self,
        declarations: &[DependencyDeclaration],
    ) -> Result<Vec<TargetStatus>, SyncError> {
        let mut rows = Vec::new();
        for record in self.records(declarations)? {
            let state = match (record.installed_version(), record.is_out_of_sync()) {
                (None, _) => SyncState::NeverSynced,
                (Some(_), false) => SyncState::Current,
                (Some(installed), true) => SyncState::Stale {
                    installed: installed.to_string(),
                },
            };
            rows.push(TargetStatus {
                installed_version: record.installed_version().map(str::to_string),
                name: record.name,
                provenance: record.provenance,
                declared_version: record.declared_version,
                state,
            });
        }

        for name in manifest::discover(&self.settings)? {
            if declarations.iter().any(|d| d.name == name) {
                continue;
            }
            let record = DependencyRecord::discovered(&self.settings, name)?;
            rows.push(TargetStatus {
                installed_version: record.installed_version().map(str::to_string),
                name: record.name,
                provenance: Provenance::Discovered,
                declared_version: None,
                state: SyncState::Orphaned,
            });
        }
        Ok(rows)
    }

    /// Remove the download cache. Returns `false` if it did not exist.
    pub fn nuke_cache(&self) -> Result<bool, SyncError> {
        self.fetcher.cache().nuke()
    }

    /// Files owned by the current pins of declared targets not in `excluded`.
    pub(crate) fn protected_files(
        &self,
        declarations: &[DependencyDeclaration],
        excluded: &BTreeSet<TargetName>,
    ) -> Result<BTreeSet<String>, SyncError> {
        let mut protected = BTreeSet::new();
        for declaration in declarations {
            if excluded.contains(&declaration.name) {
                continue;
            }
            if let Some(pin) = manifest::load(&self.settings, &declaration.name)? {
                protected.extend(pin.files);
            }
        }
        Ok(protected)
    }

    /// Best-effort removal of `files` under the install root, skipping
    /// `protected`. Returns one warning per file that could not be removed.
    pub(crate) fn remove_files(
        &self,
        files: &BTreeSet<String>,
        protected: &BTreeSet<String>,
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        for file in files {
            if protected.contains(file) {
                info!(file = %file, "kept, still owned by another dependency");
                continue;
            }
            if let Err(err) = remove_owned(&self.settings.install_root, file) {
                warn!("{err}");
                warnings.push(err.to_string());
            }
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn reset_dir(dir: &Path) -> Result<(), SyncError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(dir, err)),
    }
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))
}

/// Remove one owned top-level entry (file or directory) under `root`.
fn remove_owned(root: &Path, relative: &str) -> Result<(), SyncError> {
    let rel = Path::new(relative);
    let safe = !relative.is_empty()
        && relative != STATE_DIRNAME
        && rel.components().all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        return Err(SyncError::UnsafePath {
            path: relative.to_string(),
        });
    }

    let path = root.join(rel);
    let metadata = match std::fs::symlink_metadata(&path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(io_err(path, err)),
    };
    let removed = if metadata.is_dir() {
        std::fs::remove_dir_all(&path)
    } else {
        std::fs::remove_file(&path)
    };
    removed.map_err(|e| io_err(path, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn remove_owned_rejects_escaping_paths() {
        let tmp = TempDir::new().unwrap();
        for bad in ["", "../x", "/etc", ".truck", "a/../../b"] {
            assert!(
                matches!(remove_owned(tmp.path(), bad), Err(SyncError::UnsafePath { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn remove_owned_handles_files_dirs_and_absence() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("dir/nested")).unwrap();
        std::fs::write(tmp.path().join("file.txt"), "x").unwrap();

        remove_owned(tmp.path(), "dir").unwrap();
        remove_owned(tmp.path(), "file.txt").unwrap();
        remove_owned(tmp.path(), "never-existed").unwrap();
        assert!(!tmp.path().join("dir").exists());
        assert!(!tmp.path().join("file.txt").exists());
    }

    #[test]
    fn reset_dir_empties_existing_scratch() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("tmp");
        std::fs::create_dir_all(&scratch).unwrap();
        std::fs::write(scratch.join("leftover.zip"), "x").unwrap();

        reset_dir(&scratch).unwrap();
        assert!(scratch.is_dir());
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    }
}
