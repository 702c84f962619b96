//! Remote manifest fetching, parsing, and caching.
//!
//! The manifest is the authoritative description of the target file set:
//! a version token plus an ordered list of relative paths with content
//! hashes. This module provides:
//!
//! - Typed manifest data with parse-time invariant checks (`types`)
//! - An HTTP client behind a trait seam for testability (`client`)
//! - A time-caching provider that serializes overlapping fetches (`provider`)

mod client;
mod provider;
mod types;

pub use client::{HttpManifestClient, ManifestClient};
pub use provider::ManifestProvider;
pub use types::{FileEntry, Manifest, ManifestError};
