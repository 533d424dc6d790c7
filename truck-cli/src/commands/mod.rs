pub mod author;
pub mod cache;
pub mod check;
pub mod clean;
pub mod list;
pub mod set_version;
pub mod sync;

use anyhow::{Context, Result};
use truck_core::{declarations, DependencyDeclaration, Settings};

/// Declared dependencies of the working directory; missing `truck.json` is
/// fatal for every client command.
pub(crate) fn load_declarations(settings: &Settings) -> Result<Vec<DependencyDeclaration>> {
    declarations::load_dependencies_at(settings.work_dir()).context("failed to load truck.json")
}
