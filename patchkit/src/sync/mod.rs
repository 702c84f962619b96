//! The synchronization engine.
//!
//! This module composes manifest verification and throttled download into
//! the check-and-update workflow:
//!
//! - Streamed MD5 hashing of local and downloaded files (`hash`)
//! - Average-since-start transfer pacing with an injectable clock (`throttle`)
//! - Delta computation against the installed tree (`verify`)
//! - Single-file bandwidth-capped download with post-write verification
//!   (`download`)
//! - Applied-version marker persistence (`marker`)
//! - The subscribable engine event stream (`events`)
//! - The workflow state machine itself (`engine`)
//!
//! # Architecture
//!
//! ```text
//! SyncEngine (workflow state machine)
//!         │
//!         ├── ManifestProvider (TTL-cached manifest fetch)
//!         │
//!         ├── IntegrityChecker (ordered delta of stale files)
//!         │
//!         ├── ThrottledDownloader (one file at a time, capped, verified)
//!         │       └── RateLimiter / SpeedGauge
//!         │
//!         ├── VersionMarker (applied-version token on disk)
//!         │
//!         └── EventBus (broadcast progress/phase stream)
//! ```

mod download;
mod engine;
mod events;
mod hash;
mod marker;
mod throttle;
mod verify;

pub use download::{EntryDownloader, ThrottledDownloader};
pub use engine::{SyncEngine, SyncOutcome};
pub use events::{EventBus, SyncEvent, SyncPhase};
pub use hash::{file_md5, hashes_match};
pub use marker::{VersionMarker, MARKER_FILE_NAME};
pub use throttle::{Clock, RateLimiter, SpeedGauge, SystemClock};
pub use verify::IntegrityChecker;
