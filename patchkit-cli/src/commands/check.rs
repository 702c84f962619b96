//! The `check` command: report what a sync would download, without
//! transferring anything.

use console::style;
use tokio_util::sync::CancellationToken;

use patchkit::manifest::{HttpManifestClient, ManifestProvider};
use patchkit::sync::{EventBus, IntegrityChecker, VersionMarker};

use crate::error::CliError;

use super::{resolve_engine_config, RemoteArgs};

/// Arguments for `patchkit check`.
#[derive(Debug, clap::Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,
}

/// Fetch the manifest, verify the local tree, and print the delta.
pub fn run(args: CheckArgs) -> Result<(), CliError> {
    let config = resolve_engine_config(&args.remote)?;

    let client = HttpManifestClient::with_timeout(config.http_timeout);
    let provider = ManifestProvider::new(client, config.manifest_url.clone());
    let manifest = provider.fetch(true)?;

    let marker = VersionMarker::new(&config.install_root);
    let applied = marker.load_or_init()?;

    println!(
        "Remote version: {}   applied: {}",
        style(&manifest.version).cyan(),
        applied.as_deref().unwrap_or("(none)")
    );

    let checker = IntegrityChecker::new(&config.install_root);
    let events = EventBus::new();
    let cancel = CancellationToken::new();
    let delta = checker.verify(&manifest, &events, &cancel)?;

    if delta.is_empty() {
        println!("{} all {} files up to date", style("✓").green(), manifest.file_count());
        return Ok(());
    }

    println!(
        "{} of {} files need download:",
        style(delta.len()).yellow(),
        manifest.file_count()
    );
    let mut known_bytes = 0u64;
    for entry in &delta {
        match entry.size {
            Some(size) => {
                known_bytes += size;
                println!("  {} ({} bytes)", entry.path, size);
            }
            None => println!("  {}", entry.path),
        }
    }
    if known_bytes > 0 {
        println!("Total known size: {} bytes", known_bytes);
    }

    Ok(())
}
