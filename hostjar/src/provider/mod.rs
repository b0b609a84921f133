//! Configuration providers for virtual dependencies.
//!
//! A *virtual dependency* is a build-declared name/version pair that no
//! package repository can serve; it is resolved by custom provider logic
//! instead. [`ConfigurationProvider`] is the capability interface: any
//! implementation can be registered with the
//! [`ProviderRegistry`](crate::registry::ProviderRegistry) under its name,
//! and adding a new kind of virtual dependency means implementing this
//! trait - never branching on type tags inside the registry.
//!
//! [`HostArtifactProvider`] is the concrete provider that resolves the host
//! application into a compile-only stub archive.

mod host;
mod http;

pub use host::{HostArtifactProvider, HostEndpoints, LATEST_SPEC};
pub use http::{MetadataClient, ReqwestMetadataClient};

use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheError;
use crate::dex::TranscodeError;
use crate::download::DownloadError;
use crate::session::BuildSession;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur while a provider resolves a declaration.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The declared version spec is neither an integer nor the symbolic
    /// "latest" token.
    #[error("invalid version spec '{spec}': expected an integer or 'latest'")]
    InvalidVersion { spec: String },

    /// Fetching the remote version metadata document failed.
    #[error("failed to fetch version metadata from {url}: {reason}")]
    MetadataFetch { url: String, reason: String },

    /// The version metadata document did not have the expected shape.
    #[error("failed to parse version metadata from {url}: {reason}")]
    MetadataParse { url: String, reason: String },

    /// Downloading the host package failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Converting the host package failed.
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    /// A cache operation failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A local filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A virtual dependency declaration made by the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Name of the provider expected to resolve this declaration.
    pub provider: String,
    /// Literal integer version, or a symbolic token such as "latest".
    pub version_spec: String,
}

impl Declaration {
    /// Create a declaration against `provider` with the given spec.
    pub fn new(provider: impl Into<String>, version_spec: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            version_spec: version_spec.into(),
        }
    }
}

/// The successful output of a provider: a compile-only classpath entry.
///
/// The archive referenced here contains class signatures only; it is added
/// to the compile classpath and never linked into the shipped artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Name of the provider that produced the artifact.
    pub provider: String,
    /// The resolved (always literal) version.
    pub version: u32,
    /// Path of the stub archive on disk.
    pub archive_path: PathBuf,
}

/// Named unit of resolution logic for one kind of virtual dependency.
///
/// Implementations are invoked at most once per build, after all
/// declarations have been collected, with the single declaration made
/// against their name.
pub trait ConfigurationProvider {
    /// The name builds use to declare dependencies against this provider.
    fn name(&self) -> &str;

    /// Resolve the declaration into a classpath entry.
    fn provide(
        &self,
        session: &mut BuildSession,
        declaration: &Declaration,
    ) -> ProviderResult<ResolvedArtifact>;
}
