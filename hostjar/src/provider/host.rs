//! Host application artifact provider.
//!
//! Resolves the build's declared host version into a cached, compile-only
//! stub archive:
//!
//! 1. Resolve the version spec (literal integer, or "latest" via the
//!    remote metadata endpoint, memoized per session)
//! 2. Check the artifact cache; a non-empty archive short-circuits
//!    everything below
//! 3. Download the raw package into the versioned cache directory
//! 4. Transcode the package into the stub archive
//! 5. Publish the archive path as the classpath entry
//!
//! Every failure is fatal for the build invocation; there is no retry. A
//! transient network failure is resolved by re-running the build.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::cache::ArtifactCache;
use crate::dex;
use crate::download::{HttpSource, ProgressSink, RemoteSource};
use crate::session::BuildSession;

use super::http::{MetadataClient, ReqwestMetadataClient};
use super::{ConfigurationProvider, Declaration, ProviderError, ProviderResult, ResolvedArtifact};

/// Symbolic version spec meaning "whatever the remote source currently
/// considers latest".
pub const LATEST_SPEC: &str = "latest";

/// Placeholder substituted with the resolved version in the package URL.
const VERSION_PLACEHOLDER: &str = "{version}";

/// The remote endpoints a host provider resolves against.
#[derive(Debug, Clone)]
pub struct HostEndpoints {
    /// URL of the JSON version metadata document.
    pub metadata_url: String,
    /// URL template of the package download, containing `{version}`.
    pub package_url: String,
}

impl HostEndpoints {
    /// Create an endpoint pair.
    pub fn new(metadata_url: impl Into<String>, package_url: impl Into<String>) -> Self {
        Self {
            metadata_url: metadata_url.into(),
            package_url: package_url.into(),
        }
    }

    /// Concrete package URL for a resolved version.
    pub fn package_url_for(&self, version: u32) -> String {
        self.package_url
            .replace(VERSION_PLACEHOLDER, &version.to_string())
    }
}

/// Shape of the remote version metadata document.
#[derive(Debug, Deserialize)]
struct VersionMetadata {
    version: u32,
}

/// Concrete [`ConfigurationProvider`] for the host application dependency.
pub struct HostArtifactProvider {
    name: String,
    endpoints: HostEndpoints,
    cache: ArtifactCache,
    metadata: Box<dyn MetadataClient>,
    source: Box<dyn RemoteSource>,
    progress: Option<ProgressSink>,
}

impl HostArtifactProvider {
    /// Default provider name builds declare dependencies against.
    pub const DEFAULT_NAME: &'static str = "host";

    /// Create a provider with the production HTTP transport.
    pub fn new(endpoints: HostEndpoints, cache: ArtifactCache) -> ProviderResult<Self> {
        Ok(Self::with_transport(
            endpoints,
            cache,
            Box::new(ReqwestMetadataClient::new()?),
            Box::new(HttpSource::new()),
        ))
    }

    /// Create a provider with explicit transport implementations.
    ///
    /// This is the seam tests use to substitute local metadata and package
    /// sources.
    pub fn with_transport(
        endpoints: HostEndpoints,
        cache: ArtifactCache,
        metadata: Box<dyn MetadataClient>,
        source: Box<dyn RemoteSource>,
    ) -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            endpoints,
            cache,
            metadata,
            source,
            progress: None,
        }
    }

    /// Override the provider name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach a progress sink forwarded to package downloads.
    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Resolve a version spec into a concrete version.
    ///
    /// Symbolic specs hit the session memo first; only the first resolution
    /// per endpoint per session touches the network.
    fn resolve_version(&self, session: &mut BuildSession, spec: &str) -> ProviderResult<u32> {
        if spec != LATEST_SPEC {
            return spec.parse().map_err(|_| ProviderError::InvalidVersion {
                spec: spec.to_string(),
            });
        }

        if let Some(version) = session.memoized_latest(&self.endpoints.metadata_url) {
            debug!(version, "symbolic version resolved from session memo");
            return Ok(version);
        }

        let version = self.fetch_latest()?;
        session.memoize_latest(&self.endpoints.metadata_url, version);
        info!(version, "resolved latest host version");
        Ok(version)
    }

    fn fetch_latest(&self) -> ProviderResult<u32> {
        let url = &self.endpoints.metadata_url;
        let body = self.metadata.get(url)?;

        let metadata: VersionMetadata =
            serde_json::from_slice(&body).map_err(|e| ProviderError::MetadataParse {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        Ok(metadata.version)
    }

    /// Transcode the cached package into the stub archive.
    ///
    /// The archive is assembled fully in memory and only then written via a
    /// sibling temporary file and atomic rename, so a conversion failure
    /// never leaves a partial archive in the cache.
    fn convert(&self, package_path: &Path, archive_path: &Path) -> ProviderResult<()> {
        let package = fs::read(package_path).map_err(|e| ProviderError::Io {
            path: package_path.to_path_buf(),
            source: e,
        })?;

        let archive = dex::transcode(&package)?;

        let temp = archive_path.with_file_name(format!(
            "{}.tmp",
            archive_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "archive".to_string())
        ));

        fs::write(&temp, &archive).map_err(|e| ProviderError::Io {
            path: temp.clone(),
            source: e,
        })?;
        fs::rename(&temp, archive_path).map_err(|e| {
            fs::remove_file(&temp).ok();
            ProviderError::Io {
                path: archive_path.to_path_buf(),
                source: e,
            }
        })?;

        Ok(())
    }
}

impl ConfigurationProvider for HostArtifactProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provide(
        &self,
        session: &mut BuildSession,
        declaration: &Declaration,
    ) -> ProviderResult<ResolvedArtifact> {
        let version = self.resolve_version(session, &declaration.version_spec)?;
        let entry = self.cache.entry(version);

        if self.cache.archive_exists(version) {
            info!(version, archive = %entry.archive_path.display(), "cache hit");
            return Ok(ResolvedArtifact {
                provider: self.name.clone(),
                version,
                archive_path: entry.archive_path,
            });
        }

        self.cache.ensure_dir(version)?;

        if !self.cache.package_exists(version) {
            let url = self.endpoints.package_url_for(version);
            info!(version, url = %url, "fetching host package");
            self.source
                .download(&url, &entry.package_path, self.progress.as_ref())?;
        } else {
            debug!(version, "raw package already cached, skipping fetch");
        }

        info!(version, "converting host package to stub archive");
        self.convert(&entry.package_path, &entry.archive_path)?;

        info!(version, archive = %entry.archive_path.display(), "host artifact ready");
        Ok(ResolvedArtifact {
            provider: self.name.clone(),
            version,
            archive_path: entry.archive_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{DownloadResult, ProgressSink};
    use crate::provider::http::tests::MockMetadataClient;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Counting metadata client.
    struct CountingMetadata {
        body: Vec<u8>,
        calls: Arc<AtomicUsize>,
    }

    impl MetadataClient for CountingMetadata {
        fn get(&self, _url: &str) -> ProviderResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    /// Local source serving fixed package bytes, counting downloads.
    struct LocalSource {
        package: Vec<u8>,
        calls: Arc<AtomicUsize>,
    }

    impl RemoteSource for LocalSource {
        fn download(
            &self,
            _url: &str,
            dest: &Path,
            _progress: Option<&ProgressSink>,
        ) -> DownloadResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            fs::write(dest, &self.package).unwrap();
            Ok(self.package.len() as u64)
        }
    }

    fn endpoints() -> HostEndpoints {
        HostEndpoints::new(
            "https://host.example/version.json",
            "https://host.example/pkg/{version}/host.apk",
        )
    }

    /// A package whose single dex part defines no classes - enough to run
    /// the full fetch/convert pipeline in tests.
    fn empty_package() -> Vec<u8> {
        let mut dex = vec![0u8; 0x70];
        dex[0..8].copy_from_slice(b"dex\n035\0");
        dex[0x28..0x2c].copy_from_slice(&0x1234_5678u32.to_le_bytes());

        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("classes.dex", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&dex).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn provider_with(
        temp: &TempDir,
        metadata_calls: &Arc<AtomicUsize>,
        download_calls: &Arc<AtomicUsize>,
    ) -> HostArtifactProvider {
        HostArtifactProvider::with_transport(
            endpoints(),
            ArtifactCache::new(temp.path(), "host"),
            Box::new(CountingMetadata {
                body: br#"{"version": 9}"#.to_vec(),
                calls: Arc::clone(metadata_calls),
            }),
            Box::new(LocalSource {
                package: empty_package(),
                calls: Arc::clone(download_calls),
            }),
        )
    }

    #[test]
    fn test_package_url_substitution() {
        assert_eq!(
            endpoints().package_url_for(42),
            "https://host.example/pkg/42/host.apk"
        );
    }

    #[test]
    fn test_literal_version_parses() {
        let temp = TempDir::new().unwrap();
        let provider = provider_with(&temp, &Arc::default(), &Arc::default());
        let mut session = BuildSession::new();

        assert_eq!(provider.resolve_version(&mut session, "42").unwrap(), 42);
    }

    #[test]
    fn test_invalid_literal_is_rejected_without_network() {
        let temp = TempDir::new().unwrap();
        let metadata_calls = Arc::new(AtomicUsize::new(0));
        let provider = provider_with(&temp, &metadata_calls, &Arc::default());
        let mut session = BuildSession::new();

        let err = provider
            .resolve_version(&mut session, "1.2.3")
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidVersion { .. }));
        assert_eq!(metadata_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_latest_is_memoized_per_session() {
        let temp = TempDir::new().unwrap();
        let metadata_calls = Arc::new(AtomicUsize::new(0));
        let provider = provider_with(&temp, &metadata_calls, &Arc::default());
        let mut session = BuildSession::new();

        assert_eq!(
            provider.resolve_version(&mut session, LATEST_SPEC).unwrap(),
            9
        );
        assert_eq!(
            provider.resolve_version(&mut session, LATEST_SPEC).unwrap(),
            9
        );
        assert_eq!(metadata_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_session_fetches_again() {
        let temp = TempDir::new().unwrap();
        let metadata_calls = Arc::new(AtomicUsize::new(0));
        let provider = provider_with(&temp, &metadata_calls, &Arc::default());

        provider
            .resolve_version(&mut BuildSession::new(), LATEST_SPEC)
            .unwrap();
        provider
            .resolve_version(&mut BuildSession::new(), LATEST_SPEC)
            .unwrap();
        assert_eq!(metadata_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_metadata_parse_error() {
        let temp = TempDir::new().unwrap();
        let provider = HostArtifactProvider::with_transport(
            endpoints(),
            ArtifactCache::new(temp.path(), "host"),
            Box::new(MockMetadataClient {
                body: b"<html>not json</html>".to_vec(),
            }),
            Box::new(LocalSource {
                package: Vec::new(),
                calls: Arc::default(),
            }),
        );

        let err = provider
            .resolve_version(&mut BuildSession::new(), LATEST_SPEC)
            .unwrap_err();
        assert!(matches!(err, ProviderError::MetadataParse { .. }));
    }

    #[test]
    fn test_provide_populates_cache_on_miss() {
        let temp = TempDir::new().unwrap();
        let download_calls = Arc::new(AtomicUsize::new(0));
        let provider = provider_with(&temp, &Arc::default(), &download_calls);

        let artifact = provider
            .provide(&mut BuildSession::new(), &Declaration::new("host", "42"))
            .unwrap();

        assert_eq!(artifact.version, 42);
        assert_eq!(artifact.archive_path, temp.path().join("42/host-42.jar"));
        assert!(artifact.archive_path.is_file());
        assert_eq!(download_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_provide_is_idempotent_with_populated_cache() {
        let temp = TempDir::new().unwrap();
        let download_calls = Arc::new(AtomicUsize::new(0));
        let provider = provider_with(&temp, &Arc::default(), &download_calls);
        let declaration = Declaration::new("host", "42");

        provider
            .provide(&mut BuildSession::new(), &declaration)
            .unwrap();
        provider
            .provide(&mut BuildSession::new(), &declaration)
            .unwrap();

        assert_eq!(
            download_calls.load(Ordering::SeqCst),
            1,
            "second build must not download"
        );
    }

    #[test]
    fn test_provide_skips_fetch_when_package_cached() {
        let temp = TempDir::new().unwrap();
        let download_calls = Arc::new(AtomicUsize::new(0));
        let provider = provider_with(&temp, &Arc::default(), &download_calls);

        let cache = ArtifactCache::new(temp.path(), "host");
        cache.ensure_dir(7).unwrap();
        fs::write(cache.entry(7).package_path, empty_package()).unwrap();

        provider
            .provide(&mut BuildSession::new(), &Declaration::new("host", "7"))
            .unwrap();

        assert_eq!(download_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_conversion_leaves_no_archive() {
        let temp = TempDir::new().unwrap();
        let download_calls = Arc::new(AtomicUsize::new(0));
        let provider = HostArtifactProvider::with_transport(
            endpoints(),
            ArtifactCache::new(temp.path(), "host"),
            Box::new(MockMetadataClient { body: Vec::new() }),
            Box::new(LocalSource {
                package: b"garbage, not a package".to_vec(),
                calls: Arc::clone(&download_calls),
            }),
        );

        let err = provider
            .provide(&mut BuildSession::new(), &Declaration::new("host", "3"))
            .unwrap_err();

        assert!(matches!(err, ProviderError::Transcode(_)));
        let cache = ArtifactCache::new(temp.path(), "host");
        assert!(!cache.archive_exists(3), "no partial archive may be cached");
    }
}
