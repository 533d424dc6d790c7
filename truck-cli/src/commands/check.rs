//! `truck check`: `ok` when every declared dependency is pinned at its
//! declared version, `error` and the stale names otherwise.

use std::process::ExitCode;

use anyhow::{Context, Result};

use truck_core::Settings;
use truck_sync::{SyncEngine, SyncState};

use super::load_declarations;

pub fn run(settings: &Settings) -> Result<ExitCode> {
    let declared = load_declarations(settings)?;
    let rows = SyncEngine::from_settings(settings.clone())
        .status(&declared)
        .context("failed to read installed state")?;

    let stale: Vec<_> = rows
        .iter()
        .filter(|row| !matches!(row.state, SyncState::Current | SyncState::Orphaned))
        .collect();
    if stale.is_empty() {
        println!("ok");
        return Ok(ExitCode::SUCCESS);
    }

    println!("error");
    for row in stale {
        println!("{}", row.name);
    }
    Ok(ExitCode::FAILURE)
}
