//! CLI error type.

use patchkit::config::ConfigError;
use patchkit::error::SyncError;
use thiserror::Error;

/// Errors surfaced to the terminal user.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration problem (missing setting, bad value, unknown key).
    #[error("{0}")]
    Config(String),

    /// The synchronization engine failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The config file could not be read or written.
    #[error(transparent)]
    ConfigFile(#[from] ConfigError),
}
