//! Time-caching manifest provider.
//!
//! Wraps a [`ManifestClient`] with a TTL cache so repeated workflow runs
//! within the cache window never touch the network, and serializes
//! overlapping fetch calls on one provider instance.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::SyncResult;

use super::client::ManifestClient;
use super::types::Manifest;

/// Default cache TTL (5 minutes).
const DEFAULT_TTL_SECS: u64 = 300;

/// A cached manifest with its fetch timestamp.
struct CacheEntry {
    manifest: Manifest,
    fetched_at: Instant,
}

/// Fetches the manifest through a [`ManifestClient`], caching the result.
///
/// The cache is owned by one provider instance and replaced wholesale on
/// each successful fetch; a failed fetch leaves any previous (possibly
/// stale) cache untouched so later calls can still use it.
///
/// The internal lock is held across the network call, so overlapping
/// `fetch` calls on the same instance are serialized rather than
/// duplicated: a second caller entering after the first completes observes
/// the freshly written cache and performs no network access of its own.
pub struct ManifestProvider<C: ManifestClient> {
    client: C,
    url: String,
    ttl: Duration,
    cache: Mutex<Option<CacheEntry>>,
}

impl<C: ManifestClient> ManifestProvider<C> {
    /// Create a provider for the manifest at `url` with the default TTL.
    pub fn new(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            cache: Mutex::new(None),
        }
    }

    /// Set the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The configured cache TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The manifest endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the manifest, honoring the cache.
    ///
    /// With `force_refresh` false, a cache younger than the TTL is returned
    /// without network access. Otherwise the manifest is fetched, and on
    /// success the cache (manifest plus fresh timestamp) is replaced.
    pub fn fetch(&self, force_refresh: bool) -> SyncResult<Manifest> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());

        if !force_refresh {
            if let Some(entry) = cache.as_ref() {
                let age = entry.fetched_at.elapsed();
                if age < self.ttl {
                    tracing::debug!(age_secs = age.as_secs(), "manifest cache hit");
                    return Ok(entry.manifest.clone());
                }
                tracing::debug!(age_secs = age.as_secs(), "manifest cache expired");
            }
        }

        tracing::debug!(url = %self.url, "fetching manifest");
        let manifest = self.client.fetch_manifest(&self.url)?;
        tracing::info!(
            version = %manifest.version,
            files = manifest.file_count(),
            "manifest fetched"
        );

        *cache = Some(CacheEntry {
            manifest: manifest.clone(),
            fetched_at: Instant::now(),
        });

        Ok(manifest)
    }

    /// Age of the cached manifest, if one is cached.
    pub fn cache_age(&self) -> Option<Duration> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.as_ref().map(|entry| entry.fetched_at.elapsed())
    }

    /// Whether a manifest is currently cached (valid or stale).
    pub fn has_cached(&self) -> bool {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.is_some()
    }

    /// Drop the cached manifest so the next fetch goes to the network.
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = None;
    }
}
