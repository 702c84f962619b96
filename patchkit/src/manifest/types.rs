//! Manifest data model and parsing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while parsing or validating a manifest body.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The body was not valid JSON for the manifest schema.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Two entries share the same path.
    #[error("duplicate path in manifest: {0}")]
    DuplicatePath(String),

    /// An entry path is empty, absolute, or escapes the install root.
    #[error("invalid path in manifest: {0}")]
    InvalidPath(String),
}

/// A single file in the manifest: relative path, content hash, optional size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// POSIX-style path relative to the install root.
    pub path: String,
    /// MD5 content digest, hex-encoded (compared case-insensitively).
    pub hash: String,
    /// File size in bytes, if the publisher recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// The remote, versioned descriptor of the expected file set.
///
/// Replaced wholesale on each successful refresh; never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Opaque version token; recorded in the version marker once fully applied.
    pub version: String,
    /// Ordered file entries. Order is preserved through verification and
    /// download so the transfer order is reproducible.
    pub files: Vec<FileEntry>,
}

impl Manifest {
    /// Parse a manifest from its JSON body and validate its invariants.
    ///
    /// Rejects duplicate paths, absolute paths, and paths containing `..`
    /// segments; a manifest that names files outside the install root must
    /// never reach the downloader.
    pub fn from_json(body: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(body)?;

        let mut seen = HashSet::new();
        for entry in &manifest.files {
            if !is_valid_entry_path(&entry.path) {
                return Err(ManifestError::InvalidPath(entry.path.clone()));
            }
            if !seen.insert(entry.path.as_str()) {
                return Err(ManifestError::DuplicatePath(entry.path.clone()));
            }
        }

        Ok(manifest)
    }

    /// Number of files described by the manifest.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Sum of the sizes the publisher recorded, where present.
    pub fn known_total_size(&self) -> u64 {
        self.files.iter().filter_map(|f| f.size).sum()
    }
}

/// A path is acceptable when it is relative, non-empty, and contains no
/// `..` segments (forward-slash separated, per the manifest format).
fn is_valid_entry_path(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return false;
    }
    !path.split('/').any(|segment| segment.is_empty() || segment == "..")
}
