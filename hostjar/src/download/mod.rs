//! Streaming HTTP downloads with progress reporting.
//!
//! This module provides the single-file download primitive used to fetch
//! host packages:
//!
//! - Fixed-size chunked streaming with a progress callback per chunk
//! - Writes go to a temporary file in the destination directory, promoted
//!   to the final path with an atomic rename only on success
//! - On any failure the temporary file is removed and the destination is
//!   left untouched, so a destination path that exists is always complete
//!
//! The [`RemoteSource`] trait is the seam between the resolution pipeline
//! and the network; tests substitute a local implementation.

mod http;
mod progress;

pub use http::{DownloadError, DownloadResult, HttpSource, RemoteSource};
pub use progress::{DownloadProgress, ProgressSink};
