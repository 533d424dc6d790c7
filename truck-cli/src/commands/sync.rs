//! `truck sync` / `truck pull`: fetch, extract, and pin dependencies.

use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;

use truck_core::Settings;
use truck_sync::{DependencyOutcome, SyncEngine, SyncMode};

use super::load_declarations;

pub fn run(settings: &Settings, mode: SyncMode) -> Result<ExitCode> {
    let declared = load_declarations(settings)?;
    let engine = SyncEngine::from_settings(settings.clone());
    let report = engine.sync(&declared, mode).context("sync failed")?;

    if report.is_up_to_date() {
        println!("All deps are up to date!");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Updating:");
    for outcome in &report.outcomes {
        println!("  {}", outcome.name());
    }

    for outcome in &report.outcomes {
        match outcome {
            DependencyOutcome::Synced {
                name,
                version,
                files,
                warnings,
            } => {
                println!("{} {name} {version} synced! ({files} entries)", "✓".green());
                for warning in warnings {
                    println!("  {} {warning}", "!".yellow());
                }
            }
            DependencyOutcome::Failed { name, error } => {
                eprintln!("{} {name}: {error}", "✗".red());
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
