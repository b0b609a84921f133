//! CLI error type.

use thiserror::Error;

use hostjar::cache::CacheError;
use hostjar::config::ConfigError;
use hostjar::provider::ProviderError;
use hostjar::registry::RegistryError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A required setting is configured nowhere.
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Interactive prompt failed (e.g. no TTY).
    #[error("prompt failed: {0}")]
    Prompt(String),
}
