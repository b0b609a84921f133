//! HTTP client abstraction for metadata fetches.

use std::time::Duration;

use super::{ProviderError, ProviderResult};

/// Default timeout for metadata requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Trait for fetching small remote documents.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock clients in tests. The version metadata document is a
/// few bytes of JSON, so the whole body is returned at once; bulk package
/// downloads go through [`RemoteSource`](crate::download::RemoteSource)
/// instead.
pub trait MetadataClient: Send + Sync {
    /// Perform an HTTP GET and return the response body.
    fn get(&self, url: &str) -> ProviderResult<Vec<u8>>;
}

/// Real metadata client backed by a blocking reqwest client.
pub struct ReqwestMetadataClient {
    client: reqwest::blocking::Client,
}

impl ReqwestMetadataClient {
    /// Create a client with the default timeout.
    pub fn new() -> ProviderResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> ProviderResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::MetadataFetch {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

impl MetadataClient for ReqwestMetadataClient {
    fn get(&self, url: &str) -> ProviderResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ProviderError::MetadataFetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::MetadataFetch {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| ProviderError::MetadataFetch {
                url: url.to_string(),
                reason: format!("failed to read response: {}", e),
            })
    }
}
