//! Patchkit CLI - command-line interface
//!
//! Thin front end over the `patchkit` library: resolves configuration from
//! the config file and flags, runs the synchronization workflow, and renders
//! the engine's event stream as terminal progress.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use console::style;

use commands::config::ConfigCommands;
use commands::{check::CheckArgs, sync::SyncArgs};

#[derive(Debug, Parser)]
#[command(
    name = "patchkit",
    version = patchkit::VERSION,
    about = "Keep a local install synchronized with a remote manifest"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check local files and download anything missing or stale
    Sync(SyncArgs),

    /// Verify local files and report what a sync would download
    Check(CheckArgs),

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    patchkit::logging::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sync(args) => commands::sync::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}
