//! Error types for the synchronization engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during manifest fetching, verification, and download.
///
/// Manifest-stage and download-stage errors abort the workflow and surface to
/// the caller; local read errors during verification are absorbed (the entry
/// is simply scheduled for re-download) and never appear here.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network failure while fetching the manifest.
    #[error("failed to fetch manifest from {url}: {reason}")]
    ManifestFetch { url: String, reason: String },

    /// The manifest body was malformed or violated a manifest invariant.
    #[error("failed to parse manifest from {url}: {reason}")]
    ManifestParse { url: String, reason: String },

    /// Non-success HTTP status or transport failure while fetching a file.
    #[error("failed to download {path}: {reason}")]
    Download { path: String, reason: String },

    /// A downloaded file did not hash to the value the manifest promised.
    #[error("hash mismatch for {path}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Local filesystem failure outside of verification.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Network request exceeded its configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The workflow was cancelled via its cancellation token.
    #[error("synchronization cancelled")]
    Cancelled,
}
