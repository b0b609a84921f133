//! Per-build resolution session.
//!
//! A [`BuildSession`] is created when a build's configuration phase starts
//! and dropped when it ends. It owns the memo for symbolic version
//! resolution, so every declaration that resolves "latest" against the same
//! endpoint within one build observes the same version, and at most one
//! metadata fetch happens per endpoint per session. Scoping the memo to a
//! session object (rather than process-global state) gives it an explicit
//! lifetime and keeps independent builds in one process independent.

use std::collections::HashMap;

/// Build-scoped state shared across provider invocations.
#[derive(Debug, Default)]
pub struct BuildSession {
    /// Resolved "latest" versions, keyed by metadata endpoint URL.
    latest_versions: HashMap<String, u32>,
}

impl BuildSession {
    /// Create a fresh session with an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// The memoized "latest" version for `metadata_url`, if any
    /// declaration already resolved it this session.
    pub fn memoized_latest(&self, metadata_url: &str) -> Option<u32> {
        self.latest_versions.get(metadata_url).copied()
    }

    /// Record the resolved "latest" version for `metadata_url`.
    pub fn memoize_latest(&mut self, metadata_url: &str, version: u32) {
        self.latest_versions
            .insert(metadata_url.to_string(), version);
    }
}
