//! Version-keyed on-disk artifact cache.
//!
//! The cache maps a resolved host version to a pair of files under a
//! versioned subdirectory of the cache root:
//!
//! ```text
//! <root>/
//!   42/
//!     host-42.apk    raw fetched package
//!     host-42.jar    converted stub archive
//!   43/
//!     ...
//! ```
//!
//! Entries persist across builds; presence of a non-empty archive file is
//! the sole idempotence check. The cache performs no content validation -
//! a corrupted entry is reused as-is (documented trade-off, see DESIGN.md).
//! Directories are treated as append-only per version, and atomic rename by
//! the writers is the only cross-process safety.

mod naming;

pub use naming::{archive_filename, package_filename};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to create a cache directory.
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read the cache directory.
    #[error("failed to read cache directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to remove a cache entry.
    #[error("failed to remove cache entry {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The pair of cached files for one resolved version.
///
/// Path construction is deterministic; the files may or may not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The resolved version this entry belongs to.
    pub version: u32,
    /// Path of the raw fetched package.
    pub package_path: PathBuf,
    /// Path of the converted stub archive.
    pub archive_path: PathBuf,
}

/// Filesystem-backed artifact cache, keyed by resolved version.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
    provider: String,
}

impl ArtifactCache {
    /// Create a cache rooted at `root` for artifacts of `provider`.
    pub fn new(root: impl Into<PathBuf>, provider: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            provider: provider.into(),
        }
    }

    /// Default cache root under the platform cache directory
    /// (e.g. `~/.cache/hostjar` on Linux).
    pub fn default_root() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join("hostjar"))
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the files for `version`.
    pub fn version_dir(&self, version: u32) -> PathBuf {
        self.root.join(version.to_string())
    }

    /// Deterministic entry paths for `version`. Performs no I/O.
    pub fn entry(&self, version: u32) -> CacheEntry {
        let dir = self.version_dir(version);
        CacheEntry {
            version,
            package_path: dir.join(package_filename(&self.provider, version)),
            archive_path: dir.join(archive_filename(&self.provider, version)),
        }
    }

    /// Create the versioned directory if it does not exist yet.
    pub fn ensure_dir(&self, version: u32) -> CacheResult<PathBuf> {
        let dir = self.version_dir(version);
        fs::create_dir_all(&dir).map_err(|e| CacheError::CreateDir {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }

    /// Whether the raw package file exists for `version`.
    pub fn package_exists(&self, version: u32) -> bool {
        self.entry(version).package_path.is_file()
    }

    /// Whether the converted archive exists and is non-empty for `version`.
    ///
    /// This is the idempotence check for the whole pipeline: a hit means
    /// no network and no conversion work.
    pub fn archive_exists(&self, version: u32) -> bool {
        let path = self.entry(version).archive_path;
        fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false)
    }

    /// All versions with a directory in the cache, ascending.
    ///
    /// Directories whose names do not parse as a version are ignored.
    pub fn versions(&self) -> CacheResult<Vec<u32>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|e| CacheError::ReadDir {
            path: self.root.clone(),
            source: e,
        })?;

        let mut versions: Vec<u32> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_string_lossy().parse::<u32>().ok())
            .collect();

        versions.sort_unstable();
        Ok(versions)
    }

    /// Remove the cached files for one version.
    pub fn remove(&self, version: u32) -> CacheResult<()> {
        let dir = self.version_dir(version);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| CacheError::Remove {
                path: dir.clone(),
                source: e,
            })?;
            debug!(version, "removed cache entry");
        }
        Ok(())
    }

    /// Remove every cached version.
    pub fn clear(&self) -> CacheResult<()> {
        for version in self.versions()? {
            self.remove(version)?;
        }
        Ok(())
    }
}
