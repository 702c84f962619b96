//! Patchkit - manifest-driven file synchronization
//!
//! This library keeps a local directory tree synchronized with a remote
//! authoritative file set described by a versioned JSON manifest. It detects
//! which local files are missing or stale by streamed content hashing,
//! downloads only those files under a global bandwidth ceiling, and verifies
//! every fetched file before treating it as applied.
//!
//! # High-Level API
//!
//! For most use cases, construct a [`sync::SyncEngine`] from an
//! [`config::EngineConfig`] and run the workflow:
//!
//! ```ignore
//! use patchkit::config::EngineConfig;
//! use patchkit::sync::SyncEngine;
//!
//! let config = EngineConfig::new(
//!     "https://example.com/game/manifest.json",
//!     "https://example.com/game/files/",
//!     "/home/user/Documents/MyGame",
//! );
//!
//! let mut engine = SyncEngine::new(config);
//! let mut events = engine.subscribe();
//!
//! let outcome = engine.check_and_update(false)?;
//! ```
//!
//! Progress and phase changes are published on the engine's event stream
//! (see [`sync::SyncEvent`]); subscribers never influence engine behavior.

pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod sync;

/// Version of the patchkit library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
