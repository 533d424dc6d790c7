//! Author commands: `truck init`, `truck add`, `truck release`.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use truck_core::author::{self, AddOutcome, AUTHOR_CONFIG_FILENAME};
use truck_core::{secrets, Settings};
use truck_hosting::{release_at, CommandUploader, HostingRegistry};
use truck_sync::Fetcher;

pub fn init(settings: &Settings) -> Result<ExitCode> {
    if author::init_author_at(settings.work_dir()).context("failed to write author config")? {
        println!("{} Created {AUTHOR_CONFIG_FILENAME}", "✓".green());
    } else {
        println!("{AUTHOR_CONFIG_FILENAME} already exists");
    }

    let secrets_path = secrets::default_secrets_path()?;
    if secrets::init_secrets_at(&secrets_path)
        .with_context(|| format!("failed to write {}", secrets_path.display()))?
    {
        println!("{} Created {}", "✓".green(), secrets_path.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// Add a file or directory to a target's release.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Target being authored (e.g. zendesk-sdk).
    pub target: String,

    /// File or directory, relative to the current directory.
    pub path: String,
}

impl AddArgs {
    pub fn run(self, settings: &Settings) -> Result<ExitCode> {
        let outcome = author::add_file_at(settings.work_dir(), &self.target, &self.path)
            .with_context(|| format!("failed to add '{}' to {}", self.path, self.target))?;
        if outcome == AddOutcome::Added {
            println!(
                "{} Added {} to {}",
                "✓".green(),
                self.path.trim_end_matches('/'),
                author::target_config_path_at(settings.work_dir(), &self.target).display()
            );
        }
        Ok(ExitCode::SUCCESS)
    }
}

/// Package and publish a target.
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Target to release.
    pub target: String,

    /// Version to publish; defaults to the next version after the latest.
    pub version: Option<String>,
}

impl ReleaseArgs {
    pub fn run(self, settings: &Settings) -> Result<ExitCode> {
        let work_dir = settings.work_dir();
        let hosting = author::load_hosting_at(work_dir).context("failed to load author config")?;
        let registry = HostingRegistry::from_config(&hosting);
        let secrets_path = secrets::default_secrets_path()?;
        let secrets = secrets::load_secrets_at(&secrets_path)
            .with_context(|| format!("failed to load {}", secrets_path.display()))?;

        let release = release_at(
            work_dir,
            &self.target,
            self.version.as_deref(),
            &registry,
            &Fetcher::from_settings(settings),
            &CommandUploader::new(secrets),
        )
        .with_context(|| format!("release of '{}' failed", self.target))?;

        println!("Updated {} spec:", release.target);
        println!("{} -> {}", release.version, release.binary_uri);
        println!("Created {} ({} files)", release.archive_path.display(), release.entries);
        for upload in &release.uploads {
            println!("  ↑  {} -> {}", upload.file.display(), upload.destination);
        }
        println!("{} Done!", "✓".green());
        println!("Updated {}", release.spec_uri);
        println!("Created {}", release.binary_uri);
        Ok(ExitCode::SUCCESS)
    }
}
