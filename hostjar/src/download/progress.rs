//! Progress reporting types for downloads.

/// A point-in-time snapshot of one transfer, passed to the progress sink
/// after every chunk.
///
/// Ephemeral and observer-only; nothing in the pipeline persists it.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    /// Cumulative bytes written so far.
    pub bytes_transferred: u64,
    /// Total size of the resource, when the server reported one.
    pub total_bytes: Option<u64>,
    /// Short label identifying the transfer (the destination file name).
    pub label: String,
}

/// Callback invoked after each chunk of a transfer.
///
/// Invoked synchronously on the transfer thread; implementations must not
/// block for long or they will stall the download loop.
pub type ProgressSink = Box<dyn Fn(&DownloadProgress) + Send + Sync>;
