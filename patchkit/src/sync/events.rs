//! The engine event stream.
//!
//! Progress and phase changes are published as [`SyncEvent`] values on a
//! broadcast channel rather than through nested callbacks, decoupling the
//! engine from any presentation layer. Subscribers are pure observers:
//! publishing never blocks, and a missing or lagging subscriber never
//! alters engine behavior.

use tokio::sync::broadcast;

/// Capacity of the broadcast buffer. Lagging receivers lose the oldest
/// events; progress events are droppable observations, never control flow.
const EVENT_BUFFER: usize = 256;

/// Phases of the check-and-update workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No workflow has run yet.
    Idle,
    /// Fetching (or reusing the cached) manifest.
    FetchingManifest,
    /// Hashing local files against the manifest.
    VerifyingFiles,
    /// Transferring the delta, one file at a time.
    Downloading,
    /// Terminal: local tree matches the manifest.
    UpToDate,
    /// Terminal: an unrecovered error aborted the workflow.
    Failed,
    /// Terminal: the workflow was cancelled.
    Cancelled,
}

impl SyncPhase {
    /// Human-readable phase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::FetchingManifest => "Fetching manifest",
            Self::VerifyingFiles => "Verifying files",
            Self::Downloading => "Downloading",
            Self::UpToDate => "Up to date",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether this phase ends the workflow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::UpToDate | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An observation published by the engine while a workflow runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The workflow entered a new phase.
    Phase(SyncPhase),
    /// Human-readable status line for the current activity.
    Status(String),
    /// Verification progress after each manifest entry.
    Verify {
        percent: u8,
        path: String,
        processed: usize,
        total: usize,
    },
    /// Per-file download progress.
    Download {
        /// Percent of the current file (from Content-Length when known).
        percent: f64,
        path: String,
        /// 1-based index of the current file within the delta.
        index: usize,
        total: usize,
        /// Average speed in MB/s; reported at most once per second.
        speed_mbps: Option<f64>,
    },
    /// Aggregate batch progress, clamped to 0..=100.
    Aggregate { percent: u8 },
    /// A delta entry finished downloading and verified clean.
    FileCompleted { path: String, bytes: u64 },
}

/// Subscribable stream of [`SyncEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with the default buffer size.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// Best-effort: a send with no subscribers is not an error.
    pub fn publish(&self, event: SyncEvent) {
        let _ = self.sender.send(event);
    }
}
