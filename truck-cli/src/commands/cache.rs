//! `truck nuke_cache`

use std::process::ExitCode;

use anyhow::{Context, Result};

use truck_core::Settings;
use truck_sync::SyncEngine;

pub fn nuke(settings: &Settings) -> Result<ExitCode> {
    let engine = SyncEngine::from_settings(settings.clone());
    let removed = engine
        .nuke_cache()
        .with_context(|| format!("failed to remove {}", settings.cache_root.display()))?;
    if removed {
        println!("Removed cache at {}", settings.cache_root.display());
    } else {
        println!("No cache at {}", settings.cache_root.display());
    }
    Ok(ExitCode::SUCCESS)
}
