//! HTTP-based package downloader.
//!
//! Streams the response body in fixed-size chunks into a temporary file and
//! promotes it to the destination path with an atomic rename. A failed or
//! interrupted transfer deletes the temporary file, so callers can always
//! distinguish "fully present" from "absent" - never "partially present".

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::debug;

use super::progress::{DownloadProgress, ProgressSink};

/// Default timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that can occur while fetching a remote resource.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The server answered with a non-success status code.
    #[error("download of {url} failed with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The request could not be completed (connect failure, timeout,
    /// interrupted stream).
    #[error("download of {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// A local filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A source of remote resources.
///
/// The resolution pipeline depends on this trait rather than on a concrete
/// HTTP client, so tests can substitute a local implementation that serves
/// synthetic packages.
pub trait RemoteSource: Send + Sync {
    /// Fetch `url` into `dest`, reporting progress after each chunk.
    ///
    /// On success the destination file is complete and byte-identical to
    /// the remote resource; on error the destination path is untouched.
    /// Returns the number of bytes transferred.
    fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressSink>,
    ) -> DownloadResult<u64>;
}

/// HTTP implementation of [`RemoteSource`] backed by a blocking reqwest
/// client.
#[derive(Debug)]
pub struct HttpSource {
    client: Client,
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpSource {
    /// Create a new HTTP source with the default timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new HTTP source with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }
}

impl RemoteSource for HttpSource {
    fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressSink>,
    ) -> DownloadResult<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| DownloadError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| DownloadError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        let written = persist_stream(&mut response, dest, total, progress)?;

        debug!(url, dest = %dest.display(), bytes = written, "download complete");
        Ok(written)
    }
}

/// Stream `reader` into `dest` via a sibling temporary file.
///
/// The temporary file lives in the destination's directory so the final
/// rename stays on one filesystem and is atomic. Any error removes the
/// temporary file and leaves the destination untouched.
pub(crate) fn persist_stream(
    reader: &mut dyn Read,
    dest: &Path,
    total: Option<u64>,
    progress: Option<&ProgressSink>,
) -> DownloadResult<u64> {
    let temp = temp_path(dest);

    match stream_to(reader, &temp, dest, total, progress) {
        Ok(written) => {
            fs::rename(&temp, dest).map_err(|e| {
                fs::remove_file(&temp).ok();
                DownloadError::Io {
                    path: dest.to_path_buf(),
                    source: e,
                }
            })?;
            Ok(written)
        }
        Err(e) => {
            fs::remove_file(&temp).ok();
            Err(e)
        }
    }
}

/// Sibling temporary path for a destination file.
fn temp_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    dest.with_file_name(format!("{}.part", name))
}

fn stream_to(
    reader: &mut dyn Read,
    temp: &Path,
    dest: &Path,
    total: Option<u64>,
    progress: Option<&ProgressSink>,
) -> DownloadResult<u64> {
    let label = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let file = File::create(temp).map_err(|e| DownloadError::Io {
        path: temp.to_path_buf(),
        source: e,
    })?;

    let mut writer = BufWriter::new(file);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| DownloadError::Network {
            url: label.clone(),
            reason: format!("read error: {}", e),
        })?;

        if bytes_read == 0 {
            break;
        }

        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| DownloadError::Io {
                path: temp.to_path_buf(),
                source: e,
            })?;

        written += bytes_read as u64;

        if let Some(sink) = progress {
            sink(&DownloadProgress {
                bytes_transferred: written,
                total_bytes: total,
                label: label.clone(),
            });
        }
    }

    writer.flush().map_err(|e| DownloadError::Io {
        path: temp.to_path_buf(),
        source: e,
    })?;

    Ok(written)
}
