//! Toolchain configuration file.
//!
//! Configuration lives in an INI file in the platform config directory
//! (e.g. `~/.config/hostjar/config.ini` on Linux):
//!
//! ```ini
//! [cache]
//! directory = /home/dev/.cache/hostjar
//!
//! [host]
//! metadata_url = https://updates.example.com/host/latest.json
//! package_url = https://updates.example.com/host/{version}/host.apk
//! timeout_secs = 300
//! ```
//!
//! Every value is optional in the file; the CLI layers its flags on top
//! and raises a descriptive error when a required value is configured
//! nowhere.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read or parsed.
    #[error("failed to load config from {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// A config value has the wrong shape.
    #[error("invalid value for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        reason: String,
    },
}

/// Cache settings.
#[derive(Debug, Clone, Default)]
pub struct CacheSection {
    /// Root directory of the artifact cache.
    pub directory: Option<PathBuf>,
}

/// Host endpoint settings.
#[derive(Debug, Clone, Default)]
pub struct HostSection {
    /// URL of the version metadata document.
    pub metadata_url: Option<String>,
    /// URL template of the package download, containing `{version}`.
    pub package_url: Option<String>,
    /// HTTP timeout for package downloads.
    pub timeout_secs: Option<u64>,
}

/// Loaded configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub cache: CacheSection,
    pub host: HostSection,
}

impl ConfigFile {
    /// Default location of the config file, if the platform has a config
    /// directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hostjar").join("config.ini"))
    }

    /// Load from the default location.
    ///
    /// A missing file is not an error; it yields the default (empty)
    /// configuration.
    pub fn load() -> ConfigResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let cache = CacheSection {
            directory: get(&ini, "cache", "directory").map(PathBuf::from),
        };

        let timeout_secs = match get(&ini, "host", "timeout_secs") {
            Some(raw) => Some(raw.parse().map_err(|_| ConfigError::InvalidValue {
                section: "host".to_string(),
                key: "timeout_secs".to_string(),
                reason: format!("'{}' is not a number of seconds", raw),
            })?),
            None => None,
        };

        let host = HostSection {
            metadata_url: get(&ini, "host", "metadata_url").map(str::to_string),
            package_url: get(&ini, "host", "package_url").map(str::to_string),
            timeout_secs,
        };

        Ok(Self { cache, host })
    }
}

fn get<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section)).and_then(|s| s.get(key))
}
