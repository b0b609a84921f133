//! `hostjar cache` - inspect and prune the artifact cache.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Subcommand;
use console::style;
use dialoguer::Confirm;
use indicatif::HumanBytes;

use hostjar::cache::ArtifactCache;
use hostjar::provider::HostArtifactProvider;

use super::{load_config, resolve_cache_dir};
use crate::error::CliError;

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cached host versions.
    List {
        /// Override the cache root directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Remove cached artifacts for one version, or all of them.
    Clear {
        /// Remove only this version; omit to clear everything.
        #[arg(long)]
        version: Option<u32>,

        /// Override the cache root directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

pub fn run(command: CacheCommands) -> Result<(), CliError> {
    let config = load_config();

    match command {
        CacheCommands::List { cache_dir } => {
            let cache = open_cache(cache_dir, &config)?;
            list(&cache)
        }
        CacheCommands::Clear {
            version,
            cache_dir,
            yes,
        } => {
            let cache = open_cache(cache_dir, &config)?;
            clear(&cache, version, yes)
        }
    }
}

fn open_cache(
    cache_dir: Option<PathBuf>,
    config: &hostjar::config::ConfigFile,
) -> Result<ArtifactCache, CliError> {
    let root = resolve_cache_dir(cache_dir, config)?;
    Ok(ArtifactCache::new(root, HostArtifactProvider::DEFAULT_NAME))
}

fn list(cache: &ArtifactCache) -> Result<(), CliError> {
    let versions = cache.versions()?;
    if versions.is_empty() {
        println!("cache is empty ({})", cache.root().display());
        return Ok(());
    }

    println!("cached versions in {}:", cache.root().display());
    for version in versions {
        let entry = cache.entry(version);
        println!(
            "  v{:<8} package: {:<10} archive: {}",
            version,
            describe(&entry.package_path),
            describe(&entry.archive_path),
        );
    }
    Ok(())
}

/// Human-readable size of a file, or "absent".
fn describe(path: &Path) -> String {
    match fs::metadata(path) {
        Ok(meta) => HumanBytes(meta.len()).to_string(),
        Err(_) => "absent".to_string(),
    }
}

fn clear(cache: &ArtifactCache, version: Option<u32>, yes: bool) -> Result<(), CliError> {
    let what = match version {
        Some(v) => format!("cached artifacts for version {}", v),
        None => format!("all cached artifacts under {}", cache.root().display()),
    };

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove {}?", what))
            .default(false)
            .interact()
            .map_err(|e| CliError::Prompt(e.to_string()))?;
        if !confirmed {
            println!("aborted");
            return Ok(());
        }
    }

    match version {
        Some(v) => cache.remove(v)?,
        None => cache.clear()?,
    }

    println!("{} removed {}", style("ok:").green().bold(), what);
    Ok(())
}
