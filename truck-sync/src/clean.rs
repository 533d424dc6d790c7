//! Garbage collection of installed targets.
//!
//! Files still owned by a declared target that is *not* being cleaned are
//! protected, whichever selector is used. A cleaned target's pin is always
//! removed, even if some of its files could not be.

use std::collections::BTreeSet;
use std::fmt;

use tracing::info;

use truck_core::{DependencyDeclaration, TargetName};

use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::manifest;

/// What `truck clean` operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanSelector {
    /// Every pinned target.
    All,
    /// Pinned targets that are no longer declared.
    Nonexistent,
    /// One target, matched case-insensitively.
    Target(String),
}

impl CleanSelector {
    pub fn parse(arg: &str) -> Self {
        match arg {
            "all" => CleanSelector::All,
            "nonexistent" => CleanSelector::Nonexistent,
            other => CleanSelector::Target(other.to_string()),
        }
    }
}

impl fmt::Display for CleanSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanSelector::All => write!(f, "all"),
            CleanSelector::Nonexistent => write!(f, "nonexistent"),
            CleanSelector::Target(name) => write!(f, "{name}"),
        }
    }
}

/// What happened to one cleaned target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedTarget {
    pub name: TargetName,
    pub removed: Vec<String>,
    pub protected: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleanReport {
    pub cleaned: Vec<CleanedTarget>,
}

impl SyncEngine {
    /// Delete the files and pins of the targets chosen by `selector`.
    ///
    /// `declarations` is the current declared set; it decides both what
    /// `nonexistent` means and which files are protected.
    pub fn clean(
        &self,
        declarations: &[DependencyDeclaration],
        selector: &CleanSelector,
    ) -> Result<CleanReport, SyncError> {
        let installed = manifest::discover(self.settings())?;
        let targets: BTreeSet<TargetName> = installed
            .into_iter()
            .filter(|name| match selector {
                CleanSelector::All => true,
                CleanSelector::Nonexistent => !declarations.iter().any(|d| &d.name == name),
                CleanSelector::Target(wanted) => name.matches(wanted),
            })
            .collect();

        let protected = self.protected_files(declarations, &targets)?;
        let mut report = CleanReport::default();

        for name in targets {
            let owned = manifest::load(self.settings(), &name)?
                .map(|pin| pin.files)
                .unwrap_or_default();
            let (kept, removable): (BTreeSet<String>, BTreeSet<String>) =
                owned.into_iter().partition(|file| protected.contains(file));

            let warnings = self.remove_files(&removable, &BTreeSet::new());
            manifest::remove(self.settings(), &name)?;
            info!(dependency = %name, removed = removable.len(), kept = kept.len(), "cleaned");

            report.cleaned.push(CleanedTarget {
                name,
                removed: removable.into_iter().collect(),
                protected: kept.into_iter().collect(),
                warnings,
            });
        }
        Ok(report)
    }
}
