//! The check-and-update workflow state machine.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::manifest::{HttpManifestClient, Manifest, ManifestClient, ManifestProvider};

use super::download::{EntryDownloader, ThrottledDownloader};
use super::events::{EventBus, SyncEvent, SyncPhase};
use super::marker::VersionMarker;
use super::verify::IntegrityChecker;

/// Result of a completed workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Verification found nothing to transfer.
    UpToDate,
    /// The delta was downloaded and verified in full.
    Updated {
        files_downloaded: usize,
        bytes_downloaded: u64,
    },
}

/// Composes manifest fetch, verification, and throttled download into one
/// sequential workflow.
///
/// One engine instance owns the manifest cache, so callers that want cache
/// reuse across runs hold a single engine and invoke
/// [`check_and_update`](Self::check_and_update) repeatedly. The engine is an
/// explicitly constructed object with injected configuration; there is no
/// process-wide instance.
///
/// Phase sequence:
///
/// ```text
/// Idle → FetchingManifest → VerifyingFiles → UpToDate
///                                  └──→ Downloading → UpToDate
/// ```
///
/// with `Failed` on any unrecovered error and `Cancelled` when the
/// cancellation token fires.
pub struct SyncEngine<C: ManifestClient = HttpManifestClient, D: EntryDownloader = ThrottledDownloader>
{
    provider: ManifestProvider<C>,
    checker: IntegrityChecker,
    downloader: D,
    marker: VersionMarker,
    install_root: PathBuf,
    events: EventBus,
    cancel: CancellationToken,
    phase: SyncPhase,
}

impl SyncEngine {
    /// Create an engine with the production HTTP client and downloader.
    pub fn new(config: EngineConfig) -> Self {
        let client = HttpManifestClient::with_timeout(config.http_timeout);
        let downloader =
            ThrottledDownloader::new(config.files_base_url.clone(), config.max_bytes_per_sec);
        Self::with_parts(&config, client, downloader)
    }
}

impl<C: ManifestClient, D: EntryDownloader> SyncEngine<C, D> {
    /// Create an engine from explicit collaborators.
    ///
    /// This is the seam tests use to inject mock clients and downloaders.
    pub fn with_parts(config: &EngineConfig, client: C, downloader: D) -> Self {
        let provider = ManifestProvider::new(client, config.manifest_url.clone())
            .with_ttl(config.manifest_ttl);

        Self {
            provider,
            checker: IntegrityChecker::new(&config.install_root),
            downloader,
            marker: VersionMarker::new(&config.install_root),
            install_root: config.install_root.clone(),
            events: EventBus::new(),
            cancel: CancellationToken::new(),
            phase: SyncPhase::Idle,
        }
    }

    /// Subscribe to the engine's event stream.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// The engine's event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Token that cancels the running workflow when triggered.
    ///
    /// Checked between chunks and between files; cancellation discards any
    /// partially written destination file.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The most recently entered phase.
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// The version recorded as fully applied, if any.
    pub fn applied_version(&self) -> SyncResult<Option<String>> {
        self.marker.load_or_init()
    }

    /// Change the bandwidth ceiling for subsequent transfers.
    pub fn set_max_download_speed(&mut self, max_bytes_per_sec: u64) {
        tracing::info!(max_bytes_per_sec, "download speed limit changed");
        self.downloader.set_rate(max_bytes_per_sec);
    }

    /// Force-refresh the manifest, bypassing and replacing the cache.
    pub fn refresh_manifest(&self) -> SyncResult<Manifest> {
        self.provider.fetch(true)
    }

    /// Run the full workflow: fetch manifest (honoring the cache), verify
    /// local files, download the delta sequentially, and record the applied
    /// version.
    ///
    /// Any manifest or download error aborts the run and is returned to the
    /// caller; there is no internal retry. Running twice against an
    /// unchanged remote with a synced tree downloads nothing the second
    /// time.
    pub fn check_and_update(&mut self, force_refresh: bool) -> SyncResult<SyncOutcome> {
        let result = self.run(force_refresh);

        let terminal = match &result {
            Ok(_) => SyncPhase::UpToDate,
            Err(SyncError::Cancelled) => SyncPhase::Cancelled,
            Err(_) => SyncPhase::Failed,
        };
        self.set_phase(terminal);

        if let Err(e) = &result {
            tracing::warn!(error = %e, "synchronization failed");
            self.events.publish(SyncEvent::Status(format!("Error: {}", e)));
        }

        result
    }

    fn run(&mut self, force_refresh: bool) -> SyncResult<SyncOutcome> {
        self.set_phase(SyncPhase::FetchingManifest);
        self.events
            .publish(SyncEvent::Status("Fetching manifest...".to_string()));
        let manifest = self.provider.fetch(force_refresh)?;

        self.set_phase(SyncPhase::VerifyingFiles);
        self.events
            .publish(SyncEvent::Status("Verifying files...".to_string()));
        let delta = self.checker.verify(&manifest, &self.events, &self.cancel)?;

        if delta.is_empty() {
            // A tree synced by other means still converges on the fetched
            // manifest version.
            self.marker.record(&manifest.version)?;
            self.events.publish(SyncEvent::Aggregate { percent: 100 });
            self.events
                .publish(SyncEvent::Status("Up to date".to_string()));
            return Ok(SyncOutcome::UpToDate);
        }

        self.set_phase(SyncPhase::Downloading);
        self.events.publish(SyncEvent::Status(format!(
            "Downloading {} files...",
            delta.len()
        )));

        let total = delta.len();
        let mut bytes_downloaded = 0u64;
        let events = self.events.clone();

        for (completed, entry) in delta.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let dest = self.install_root.join(&entry.path);
            let index = completed + 1;
            let path = entry.path.clone();

            let mut on_progress = |file_percent: f64, speed_mbps: Option<f64>| {
                let aggregate = ((completed as f64 / total as f64) * 100.0
                    + file_percent / total as f64)
                    .clamp(0.0, 100.0);
                events.publish(SyncEvent::Download {
                    percent: file_percent,
                    path: path.clone(),
                    index,
                    total,
                    speed_mbps,
                });
                events.publish(SyncEvent::Aggregate {
                    percent: aggregate.round() as u8,
                });
            };

            let bytes =
                self.downloader
                    .download_entry(entry, &dest, &self.cancel, &mut on_progress)?;

            bytes_downloaded += bytes;
            events.publish(SyncEvent::FileCompleted {
                path: entry.path.clone(),
                bytes,
            });
        }

        self.marker.record(&manifest.version)?;
        self.events.publish(SyncEvent::Aggregate { percent: 100 });
        self.events
            .publish(SyncEvent::Status("Up to date".to_string()));

        tracing::info!(
            files = total,
            bytes = bytes_downloaded,
            version = %manifest.version,
            "synchronization complete"
        );

        Ok(SyncOutcome::Updated {
            files_downloaded: total,
            bytes_downloaded,
        })
    }

    fn set_phase(&mut self, phase: SyncPhase) {
        self.phase = phase;
        self.events.publish(SyncEvent::Phase(phase));
    }
}
