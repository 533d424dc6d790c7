//! `truck set_version <target> <version>`

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use truck_core::{declarations, Settings};

#[derive(Args, Debug)]
pub struct SetVersionArgs {
    /// Declared target, matched case-insensitively.
    pub target: String,

    /// New version to declare.
    pub version: String,
}

impl SetVersionArgs {
    pub fn run(self, settings: &Settings) -> Result<ExitCode> {
        let updated = declarations::set_version_at(settings.work_dir(), &self.target, &self.version)
            .with_context(|| format!("failed to set version of '{}'", self.target))?;
        println!(
            "{} {} declared at {}; run `truck sync` to fetch it",
            "✓".green(),
            updated.name,
            self.version
        );
        Ok(ExitCode::SUCCESS)
    }
}
