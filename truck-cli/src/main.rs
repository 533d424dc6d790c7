//! Truck: a straight-forward dependency/binary manager.
//!
//! # Usage
//!
//! ```text
//! truck sync                       fetch stale dependencies
//! truck pull                       fetch every dependency
//! truck check                      print ok|error, no side effects
//! truck clean <target|all|nonexistent>
//! truck list
//! truck set_version <target> <version>
//! truck nuke_cache
//! truck version
//!
//! truck init                       author: write config templates
//! truck add <target> <path>        author: stage a file for release
//! truck release <target> [version] author: package and publish
//! ```

mod commands;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use commands::{
    author::{AddArgs, ReleaseArgs},
    clean::CleanArgs,
    set_version::SetVersionArgs,
};
use truck_core::Settings;
use truck_sync::SyncMode;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "truck",
    version,
    about = "Fetch prebuilt binary dependencies declared in truck.json",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Download cache directory.
    #[arg(long, global = true, env = "TRUCK_CACHE_DIR", value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Never draw download progress bars.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download dependencies whose pinned version differs from truck.json.
    Sync,

    /// Download every dependency regardless of local state.
    Pull,

    /// Print `ok` if every dependency is in sync, `error` otherwise.
    Check,

    /// Delete the files and pin of a target, `all`, or `nonexistent`.
    Clean(CleanArgs),

    /// Show declared and installed versions.
    List,

    /// Print the truck version.
    Version,

    /// Delete the download cache.
    #[command(name = "nuke_cache", alias = "nuke-cache")]
    NukeCache,

    /// Change the declared version of a target in truck.json.
    #[command(name = "set_version", alias = "set-version")]
    SetVersion(SetVersionArgs),

    /// Create truck-author.json and ~/.truckrc templates.
    Init,

    /// Add a file or directory to a target's release.
    Add(AddArgs),

    /// Package a target and publish it to the configured backend.
    Release(ReleaseArgs),
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let work_dir = std::env::current_dir().context("could not determine current directory")?;
        let show_progress = !self.no_progress && std::io::stderr().is_terminal();
        let mut settings = Settings::new(work_dir).with_progress(show_progress);
        if let Some(dir) = &self.cache_dir {
            settings = settings.with_cache_root(dir.clone());
        }
        Ok(settings)
    }

    fn run(self) -> Result<ExitCode> {
        let settings = self.settings()?;
        debug!(
            work_dir = %settings.work_dir.display(),
            cache = %settings.cache_root.display(),
            "settings resolved"
        );
        match self.command {
            Commands::Sync => commands::sync::run(&settings, SyncMode::Stale),
            Commands::Pull => commands::sync::run(&settings, SyncMode::All),
            Commands::Check => commands::check::run(&settings),
            Commands::Clean(args) => args.run(&settings),
            Commands::List => commands::list::run(&settings),
            Commands::Version => {
                println!("truck {}", env!("CARGO_PKG_VERSION"));
                Ok(ExitCode::SUCCESS)
            }
            Commands::NukeCache => commands::cache::nuke(&settings),
            Commands::SetVersion(args) => args.run(&settings),
            Commands::Init => commands::author::init(&settings),
            Commands::Add(args) => args.run(&settings),
            Commands::Release(args) => args.run(&settings),
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.verbose);
    match cli.run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
