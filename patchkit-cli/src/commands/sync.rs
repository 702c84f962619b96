//! The `sync` command: check and update the local installation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;

use patchkit::error::SyncError;
use patchkit::sync::{SyncEngine, SyncEvent, SyncOutcome};

use crate::error::CliError;

use super::{resolve_engine_config, RemoteArgs};

/// Arguments for `patchkit sync`.
#[derive(Debug, clap::Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Re-fetch the manifest even if the cached copy is still fresh
    #[arg(long)]
    pub force_refresh: bool,
}

/// Run the synchronization workflow with terminal progress.
pub fn run(args: SyncArgs) -> Result<(), CliError> {
    let config = resolve_engine_config(&args.remote)?;

    println!(
        "Synchronizing {} from {}",
        style(config.install_root.display()).cyan(),
        style(&config.manifest_url).dim()
    );

    let mut engine = SyncEngine::new(config);

    // Ctrl-C cancels cleanly between chunks; partial files are discarded.
    let cancel = engine.cancellation_token();
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received, cancelling");
        cancel.cancel();
    })
    .map_err(|e| CliError::Config(format!("failed to install interrupt handler: {}", e)))?;

    let events = engine.subscribe();
    let done = Arc::new(AtomicBool::new(false));
    let reporter = spawn_reporter(events, Arc::clone(&done));

    let outcome = engine.check_and_update(args.force_refresh);

    done.store(true, Ordering::SeqCst);
    reporter.join().ok();

    match outcome {
        Ok(SyncOutcome::UpToDate) => {
            println!("{} already up to date", style("✓").green());
            Ok(())
        }
        Ok(SyncOutcome::Updated {
            files_downloaded,
            bytes_downloaded,
        }) => {
            println!(
                "{} downloaded {} files ({} bytes)",
                style("✓").green(),
                files_downloaded,
                bytes_downloaded
            );
            Ok(())
        }
        Err(SyncError::Cancelled) => {
            println!("{} cancelled", style("✗").yellow());
            Err(SyncError::Cancelled.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Render engine events on a single progress bar until `done`.
fn spawn_reporter(
    mut events: broadcast::Receiver<SyncEvent>,
    done: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {wide_msg}")
                .expect("valid progress template")
                .progress_chars("=>-"),
        );

        loop {
            match events.try_recv() {
                Ok(event) => render(&bar, event),
                Err(broadcast::error::TryRecvError::Empty) => {
                    if done.load(Ordering::SeqCst) {
                        break;
                    }
                    thread::sleep(Duration::from_millis(30));
                }
                Err(broadcast::error::TryRecvError::Closed) => break,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            }
        }

        bar.finish_and_clear();
    })
}

fn render(bar: &ProgressBar, event: SyncEvent) {
    match event {
        SyncEvent::Status(message) => bar.set_message(message),
        SyncEvent::Verify { percent, path, .. } => {
            bar.set_position(u64::from(percent));
            bar.set_message(format!("verifying {}", path));
        }
        SyncEvent::Download {
            path,
            index,
            total,
            speed_mbps,
            ..
        } => {
            let speed = speed_mbps
                .map(|s| format!(" @ {:.1} MB/s", s))
                .unwrap_or_default();
            bar.set_message(format!("[{}/{}] {}{}", index, total, path, speed));
        }
        SyncEvent::Aggregate { percent } => bar.set_position(u64::from(percent)),
        SyncEvent::Phase(_) | SyncEvent::FileCompleted { .. } => {}
    }
}
