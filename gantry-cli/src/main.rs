//! Gantry — version and deploy jobs and shared modules.
//!
//! # Usage
//!
//! ```text
//! gantry new <job|module> --name <name>
//! gantry status [--jobs|--modules] [--json]
//! gantry lock
//! gantry package [--purge]
//! gantry check
//! gantry deploy [--dry-run]
//! gantry diff <job>
//! ```
//!
//! Every command takes `-C <dir>` to run against a project other than the
//! current directory, and `-v` / `-vv` to raise log verbosity. `GANTRY_LOG`
//! overrides the log filter entirely.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{
    check::CheckArgs, deploy::DeployArgs, diff::DiffArgs, lock::LockArgs, new::NewArgs,
    package::PackageArgs, status::StatusArgs,
};

const LOG_ENV: &str = "GANTRY_LOG";

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "gantry",
    version,
    about = "Version, package and deploy jobs and shared modules",
    long_about = None,
)]
struct Cli {
    /// Project root directory.
    #[arg(short = 'C', long = "project-dir", global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scaffold a new job or module at version 0.
    New(NewArgs),

    /// Show local and remote state of every component.
    Status(StatusArgs),

    /// Lock every component with edits in progress.
    Lock(LockArgs),

    /// Build (or purge) module package artifacts.
    Package(PackageArgs),

    /// Report components that would block a deploy.
    Check(CheckArgs),

    /// Publish every deployable component.
    Deploy(DeployArgs),

    /// Show unified diff of what deploy would write to a job's deployment.yml.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let root = cli.project_dir;
    match cli.command {
        Commands::New(args) => args.run(&root),
        Commands::Status(args) => args.run(&root),
        Commands::Lock(args) => args.run(&root),
        Commands::Package(args) => args.run(&root),
        Commands::Check(args) => args.run(&root),
        Commands::Deploy(args) => args.run(&root),
        Commands::Diff(args) => args.run(&root),
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
