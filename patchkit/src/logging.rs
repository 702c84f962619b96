//! Logging initialization for patchkit binaries.
//!
//! Installs a `tracing` subscriber writing to stderr, filtered by the
//! `RUST_LOG` environment variable (defaults to `info`). The engine itself
//! only emits `tracing` events and never touches the global subscriber;
//! binaries call [`init`] once at startup.

use std::io;

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Safe to call once per process; subsequent calls are ignored (the first
/// subscriber wins), which keeps tests that share a process harmless.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
