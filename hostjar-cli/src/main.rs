//! Hostjar CLI - command-line interface
//!
//! This binary provides a command-line interface to the hostjar library:
//! resolving host artifacts, inspecting the artifact cache, and showing
//! the effective configuration.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use commands::cache::CacheCommands;
use commands::config::ConfigCommands;
use commands::resolve::ResolveArgs;
use error::CliError;

#[derive(Parser)]
#[command(
    name = "hostjar",
    version,
    about = "Compile-time host application artifacts for plugin builds"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the host dependency into a stub archive.
    Resolve(ResolveArgs),

    /// Inspect or prune the artifact cache.
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Show configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{} {}", style("error:").red().bold(), err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Resolve(args) => commands::resolve::run(args),
        Commands::Cache(cmd) => commands::cache::run(cmd),
        Commands::Config(cmd) => commands::config::run(cmd),
    }
}

/// Install the log subscriber. `RUST_LOG` controls verbosity; default is
/// warnings only so progress output stays readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
