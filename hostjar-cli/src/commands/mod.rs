//! CLI command implementations.
//!
//! Each submodule owns one subcommand: argument types (clap-derived) and
//! the handler. Shared config-fallback helpers live here so every command
//! resolves settings the same way: CLI flag first, then config file, then
//! platform default, then a descriptive error naming the flag and config
//! key to set.

pub mod cache;
pub mod config;
pub mod resolve;

use std::path::PathBuf;

use hostjar::cache::ArtifactCache;
use hostjar::config::ConfigFile;

use crate::error::CliError;

/// Load config or fall back to the empty default.
pub fn load_config() -> ConfigFile {
    ConfigFile::load().unwrap_or_default()
}

/// Resolve the cache root: flag, then config, then platform default.
pub fn resolve_cache_dir(
    cli_dir: Option<PathBuf>,
    config: &ConfigFile,
) -> Result<PathBuf, CliError> {
    cli_dir
        .or_else(|| config.cache.directory.clone())
        .or_else(ArtifactCache::default_root)
        .ok_or_else(|| {
            CliError::Config(
                "no cache directory available; use --cache-dir or set directory in the \
                 config [cache] section"
                    .to_string(),
            )
        })
}

/// Resolve the metadata URL: flag, then config, then error.
pub fn require_metadata_url(
    cli_url: Option<String>,
    config: &ConfigFile,
) -> Result<String, CliError> {
    cli_url
        .or_else(|| config.host.metadata_url.clone())
        .ok_or_else(|| {
            CliError::Config(
                "no metadata URL specified; use --metadata-url or set metadata_url in the \
                 config [host] section"
                    .to_string(),
            )
        })
}

/// Resolve the package URL template: flag, then config, then error.
pub fn require_package_url(
    cli_url: Option<String>,
    config: &ConfigFile,
) -> Result<String, CliError> {
    cli_url
        .or_else(|| config.host.package_url.clone())
        .ok_or_else(|| {
            CliError::Config(
                "no package URL specified; use --package-url or set package_url in the \
                 config [host] section"
                    .to_string(),
            )
        })
}
