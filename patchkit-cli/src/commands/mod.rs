//! CLI command implementations.
//!
//! Each subcommand resolves its configuration from the config file with
//! command-line flags taking precedence, then drives the library API.

pub mod check;
pub mod config;
pub mod sync;

use std::path::PathBuf;

use patchkit::config::{ConfigFile, EngineConfig};

use crate::error::CliError;

/// Flag overrides shared by `sync` and `check`.
#[derive(Debug, Clone, clap::Args)]
pub struct RemoteArgs {
    /// Manifest URL (overrides remote.manifest_url)
    #[arg(long)]
    pub manifest_url: Option<String>,

    /// Base URL for file downloads (overrides remote.files_base_url)
    #[arg(long)]
    pub files_base_url: Option<String>,

    /// Installation directory (overrides install.root)
    #[arg(long)]
    pub install_root: Option<PathBuf>,

    /// Bandwidth ceiling in MiB/s (overrides download.max_speed_mib)
    #[arg(long)]
    pub max_speed: Option<u64>,
}

/// Load config or return default.
fn load_config() -> ConfigFile {
    ConfigFile::load().unwrap_or_default()
}

/// Merge the config file and flag overrides into an [`EngineConfig`].
pub fn resolve_engine_config(args: &RemoteArgs) -> Result<EngineConfig, CliError> {
    let mut file = load_config();

    if let Some(url) = &args.manifest_url {
        file.manifest_url = Some(url.clone());
    }
    if let Some(url) = &args.files_base_url {
        file.files_base_url = Some(url.clone());
    }
    if let Some(root) = &args.install_root {
        file.install_root = Some(root.clone());
    }
    if let Some(speed) = args.max_speed {
        file.max_speed_mib = Some(speed);
    }

    file.engine_config().map_err(|e| {
        CliError::Config(format!(
            "{}. Pass the matching flag or set it with 'patchkit config set'.",
            e
        ))
    })
}
