//! HTTP client for fetching the remote manifest.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{SyncError, SyncResult};

use super::types::Manifest;

/// Default HTTP request timeout (30 seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for fetching the manifest document.
///
/// This trait abstracts HTTP fetching to enable testing without network
/// access; the engine only ever talks to the manifest endpoint through it.
pub trait ManifestClient: Send + Sync {
    /// Fetch and parse the manifest at `url`.
    fn fetch_manifest(&self, url: &str) -> SyncResult<Manifest>;
}

/// HTTP-based implementation of [`ManifestClient`].
#[derive(Clone)]
pub struct HttpManifestClient {
    client: Client,
    timeout: Duration,
}

impl std::fmt::Debug for HttpManifestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpManifestClient")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for HttpManifestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpManifestClient {
    /// Create a new client with the default timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("patchkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to create HTTP client");

        Self { client, timeout }
    }

    /// Fetch the raw manifest body.
    fn fetch_text(&self, url: &str) -> SyncResult<String> {
        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                SyncError::ManifestFetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::ManifestFetch {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        response.text().map_err(|e| SyncError::ManifestFetch {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

impl ManifestClient for HttpManifestClient {
    fn fetch_manifest(&self, url: &str) -> SyncResult<Manifest> {
        let body = self.fetch_text(url)?;

        Manifest::from_json(&body).map_err(|e| SyncError::ManifestParse {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
