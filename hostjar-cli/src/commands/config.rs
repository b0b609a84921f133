//! `hostjar config` - show the effective configuration.

use clap::Subcommand;
use console::style;

use hostjar::cache::ArtifactCache;
use hostjar::config::ConfigFile;

use crate::error::CliError;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration and where it comes from.
    Show,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => show(),
    }
}

fn show() -> Result<(), CliError> {
    let path = ConfigFile::default_path();
    match &path {
        Some(path) if path.exists() => println!("config file: {}", path.display()),
        Some(path) => println!(
            "config file: {} {}",
            path.display(),
            style("(not present)").dim()
        ),
        None => println!("config file: {}", style("no config directory").dim()),
    }

    let config = ConfigFile::load()?;

    println!("\n[cache]");
    println!(
        "directory = {}",
        config
            .cache
            .directory
            .or_else(ArtifactCache::default_root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(unset)
    );

    println!("\n[host]");
    println!(
        "metadata_url = {}",
        config.host.metadata_url.unwrap_or_else(unset)
    );
    println!(
        "package_url = {}",
        config.host.package_url.unwrap_or_else(unset)
    );
    println!(
        "timeout_secs = {}",
        config
            .host
            .timeout_secs
            .map(|t| t.to_string())
            .unwrap_or_else(unset)
    );

    Ok(())
}

fn unset() -> String {
    style("(unset)").dim().to_string()
}
