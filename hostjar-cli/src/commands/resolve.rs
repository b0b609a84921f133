//! `hostjar resolve` - resolve the host dependency into a stub archive.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use hostjar::cache::ArtifactCache;
use hostjar::download::{DownloadProgress, HttpSource, ProgressSink};
use hostjar::provider::{
    HostArtifactProvider, HostEndpoints, ReqwestMetadataClient,
};
use hostjar::registry::ProviderRegistry;
use hostjar::session::BuildSession;

use super::{load_config, require_metadata_url, require_package_url, resolve_cache_dir};
use crate::error::CliError;

#[derive(Args)]
pub struct ResolveArgs {
    /// Version to resolve: an integer, or "latest" to ask the remote
    /// source.
    #[arg(long, default_value = "latest")]
    pub version: String,

    /// Override the version metadata URL.
    #[arg(long)]
    pub metadata_url: Option<String>,

    /// Override the package URL template (must contain `{version}`).
    #[arg(long)]
    pub package_url: Option<String>,

    /// Override the cache root directory.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Suppress the progress bar.
    #[arg(long)]
    pub quiet: bool,
}

pub fn run(args: ResolveArgs) -> Result<(), CliError> {
    let config = load_config();

    let endpoints = HostEndpoints::new(
        require_metadata_url(args.metadata_url, &config)?,
        require_package_url(args.package_url, &config)?,
    );
    let cache_root = resolve_cache_dir(args.cache_dir, &config)?;
    debug!(
        metadata_url = %endpoints.metadata_url,
        cache_root = %cache_root.display(),
        "resolving against configured endpoints"
    );
    let cache = ArtifactCache::new(cache_root, HostArtifactProvider::DEFAULT_NAME);

    // A configured timeout applies to package downloads; the metadata
    // document is a few bytes and keeps the client default.
    let mut provider = match config.host.timeout_secs {
        Some(secs) => HostArtifactProvider::with_transport(
            endpoints,
            cache,
            Box::new(ReqwestMetadataClient::new()?),
            Box::new(HttpSource::with_timeout(Duration::from_secs(secs))),
        ),
        None => HostArtifactProvider::new(endpoints, cache)?,
    };

    let bar = ProgressBar::hidden();
    if !args.quiet {
        provider = provider.with_progress(progress_sink(bar.clone()));
    }

    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(provider))?;
    registry.declare(HostArtifactProvider::DEFAULT_NAME, args.version.as_str());

    let mut session = BuildSession::new();
    let artifacts = registry.resolve_all(&mut session)?;
    bar.finish_and_clear();

    for artifact in &artifacts {
        println!(
            "{} {} v{} {} {}",
            style("resolved").green().bold(),
            artifact.provider,
            artifact.version,
            style("->").dim(),
            artifact.archive_path.display()
        );
    }

    Ok(())
}

/// Bind a progress bar to the download progress sink.
///
/// The bar is configured lazily on the first report, once the total size
/// (if any) is known.
fn progress_sink(bar: ProgressBar) -> ProgressSink {
    let configured = AtomicBool::new(false);

    Box::new(move |progress: &DownloadProgress| {
        if !configured.swap(true, Ordering::Relaxed) {
            bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            bar.set_message(progress.label.clone());
            match progress.total_bytes {
                Some(total) => {
                    bar.set_length(total);
                    bar.set_style(
                        ProgressStyle::with_template(
                            "{msg} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec}",
                        )
                        .expect("valid progress template")
                        .progress_chars("=> "),
                    );
                }
                None => {
                    bar.set_style(
                        ProgressStyle::with_template("{spinner} {msg} {bytes} {bytes_per_sec}")
                            .expect("valid progress template"),
                    );
                }
            }
        }
        bar.set_position(progress.bytes_transferred);
    })
}
