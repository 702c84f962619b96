//! Bandwidth-capped single-file download with post-write verification.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use md5::{Digest, Md5};
use reqwest::blocking::Client;
use tokio_util::sync::CancellationToken;

use crate::error::{SyncError, SyncResult};
use crate::manifest::FileEntry;

use super::hash::{file_md5, hashes_match};
use super::throttle::{RateLimiter, SpeedGauge};

/// Default timeout for file download requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Buffer size for streaming response bodies (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Downloads one delta entry at a time.
///
/// The trait seam lets the engine be exercised with scripted downloaders in
/// tests. `on_progress` receives `(percent_of_this_file, average_speed_mbps)`
/// per chunk; the percent is derived from Content-Length and only reported
/// when the server provides one.
pub trait EntryDownloader: Send {
    /// Transfer `entry` to `dest`, verify its hash, and return the bytes
    /// written.
    fn download_entry(
        &mut self,
        entry: &FileEntry,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(f64, Option<f64>),
    ) -> SyncResult<u64>;

    /// Change the bandwidth cap, in bytes per second (zero disables pacing).
    fn set_rate(&mut self, max_bytes_per_sec: u64);
}

/// HTTP downloader pacing transfers to a global bandwidth ceiling.
///
/// Throttle state is scoped to a single file and reset at the start of each
/// [`download_entry`](EntryDownloader::download_entry) call; rate history
/// never carries over between files.
pub struct ThrottledDownloader {
    client: Client,
    files_base_url: String,
    timeout: Duration,
    limiter: RateLimiter,
    gauge: SpeedGauge,
}

impl std::fmt::Debug for ThrottledDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottledDownloader")
            .field("files_base_url", &self.files_base_url)
            .field("timeout", &self.timeout)
            .field("max_bytes_per_sec", &self.limiter.rate())
            .finish()
    }
}

impl ThrottledDownloader {
    /// Create a downloader for files hosted under `files_base_url`.
    pub fn new(files_base_url: impl Into<String>, max_bytes_per_sec: u64) -> Self {
        Self::with_timeout(
            files_base_url,
            max_bytes_per_sec,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Create a downloader with a custom per-request timeout.
    pub fn with_timeout(
        files_base_url: impl Into<String>,
        max_bytes_per_sec: u64,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("patchkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to create HTTP client");

        Self {
            client,
            files_base_url: files_base_url.into(),
            timeout,
            limiter: RateLimiter::new(max_bytes_per_sec),
            gauge: SpeedGauge::new(),
        }
    }

    /// URL for a manifest entry under the configured base.
    fn file_url(&self, path: &str) -> String {
        format!("{}/{}", self.files_base_url.trim_end_matches('/'), path)
    }

    /// Stream the response body to `dest`, pacing and hashing as it goes.
    fn stream_to_file(
        &mut self,
        entry: &FileEntry,
        mut response: reqwest::blocking::Response,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(f64, Option<f64>),
    ) -> SyncResult<(u64, String)> {
        let total_size = response.content_length().unwrap_or(0);

        let file = File::create(dest).map_err(|e| SyncError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        let mut hasher = Md5::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut downloaded = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| SyncError::Download {
                    path: entry.path.clone(),
                    reason: format!("read error: {}", e),
                })?;

            if bytes_read == 0 {
                break;
            }

            self.limiter.record(bytes_read);
            hasher.update(&buffer[..bytes_read]);

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| SyncError::Io {
                    path: dest.to_path_buf(),
                    source: e,
                })?;

            downloaded += bytes_read as u64;

            if total_size > 0 {
                let percent = (downloaded as f64 / total_size as f64) * 100.0;
                let speed = self.gauge.sample(downloaded);
                on_progress(percent, speed);
            }
        }

        writer.flush().map_err(|e| SyncError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;

        Ok((downloaded, format!("{:x}", hasher.finalize())))
    }
}

impl EntryDownloader for ThrottledDownloader {
    fn download_entry(
        &mut self,
        entry: &FileEntry,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(f64, Option<f64>),
    ) -> SyncResult<u64> {
        // Fresh throttle baseline for every file.
        self.limiter.reset();
        self.gauge.reset();

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let url = self.file_url(&entry.path);
        tracing::debug!(path = %entry.path, url = %url, "downloading");

        let response = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout {
                    url: url.clone(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                SyncError::Download {
                    path: entry.path.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Download {
                path: entry.path.clone(),
                reason: format!("HTTP {}", status),
            });
        }

        let result = self.stream_to_file(entry, response, dest, cancel, on_progress);

        let (downloaded, streamed_hash) = match result {
            Ok(ok) => ok,
            Err(e) => {
                // A cancelled or failed transfer must not leave a file that
                // a later verification could mistake for applied content.
                fs::remove_file(dest).ok();
                return Err(e);
            }
        };

        // Re-hash the written bytes; the streamed digest alone would not
        // catch corruption between the socket and the disk.
        let actual = file_md5(dest)?;
        if !hashes_match(&actual, &entry.hash) {
            tracing::warn!(
                path = %entry.path,
                expected = %entry.hash,
                actual = %actual,
                streamed = %streamed_hash,
                "hash mismatch after download"
            );
            return Err(SyncError::IntegrityMismatch {
                path: entry.path.clone(),
                expected: entry.hash.to_lowercase(),
                actual,
            });
        }

        tracing::debug!(path = %entry.path, bytes = downloaded, "downloaded and verified");
        Ok(downloaded)
    }

    fn set_rate(&mut self, max_bytes_per_sec: u64) {
        self.limiter.set_rate(max_bytes_per_sec);
    }
}
