//! `truck clean <target|all|nonexistent>`

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use truck_core::Settings;
use truck_sync::{CleanSelector, SyncEngine};

use super::load_declarations;

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Target name (case-insensitive), `all`, or `nonexistent` for targets
    /// no longer declared in truck.json.
    pub target: String,
}

impl CleanArgs {
    pub fn run(self, settings: &Settings) -> Result<ExitCode> {
        let declared = load_declarations(settings)?;
        let selector = CleanSelector::parse(&self.target);
        let report = SyncEngine::from_settings(settings.clone())
            .clean(&declared, &selector)
            .with_context(|| format!("clean {selector} failed"))?;

        if report.cleaned.is_empty() {
            println!("Nothing to clean for '{selector}'");
            return Ok(ExitCode::SUCCESS);
        }

        for target in &report.cleaned {
            println!(
                "{} cleaned {} ({} removed, {} kept)",
                "✓".green(),
                target.name,
                target.removed.len(),
                target.protected.len()
            );
            for kept in &target.protected {
                println!("  ·  {kept} (still owned by another dependency)");
            }
            for warning in &target.warnings {
                println!("  {} {warning}", "!".yellow());
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}
