//! `truck list`: declared vs installed versions.

use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use truck_core::Settings;
use truck_sync::{SyncEngine, SyncState, TargetStatus};

use super::load_declarations;

#[derive(Tabled)]
struct ListRow {
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "declared")]
    declared: String,
    #[tabled(rename = "installed")]
    installed: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "source")]
    source: String,
}

pub fn run(settings: &Settings) -> Result<ExitCode> {
    let declared = load_declarations(settings)?;
    let rows = SyncEngine::from_settings(settings.clone())
        .status(&declared)
        .context("failed to read installed state")?;

    if rows.is_empty() {
        println!("No dependencies declared in truck.json.");
        return Ok(ExitCode::SUCCESS);
    }

    let needs_sync = rows.iter().any(|row| !row.is_in_sync() && row.state != SyncState::Orphaned);
    let has_orphans = rows.iter().any(|row| row.state == SyncState::Orphaned);

    let mut table = Table::new(rows.iter().map(to_row));
    table.with(Style::rounded());
    println!("{table}");

    if needs_sync {
        println!("Run 'truck sync' to update stale dependencies.");
    }
    if has_orphans {
        println!("Run 'truck clean nonexistent' to remove undeclared dependencies.");
    }
    Ok(ExitCode::SUCCESS)
}

fn to_row(status: &TargetStatus) -> ListRow {
    ListRow {
        target: status.name.to_string(),
        declared: status.declared_version.clone().unwrap_or_else(|| "-".to_string()),
        installed: status.installed_version.clone().unwrap_or_else(|| "-".to_string()),
        status: state_label(&status.state),
        source: status.provenance.to_string(),
    }
}

fn state_label(state: &SyncState) -> String {
    match state {
        SyncState::Current => "current".green().bold().to_string(),
        SyncState::Stale { .. } => "stale".yellow().bold().to_string(),
        SyncState::NeverSynced => "not installed".bright_black().bold().to_string(),
        SyncState::Orphaned => "undeclared".magenta().bold().to_string(),
    }
}
