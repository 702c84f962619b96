//! Applied-version marker persistence.
//!
//! A small text file under the install root records which manifest version
//! was last fully applied. On first run the marker is created with an empty
//! token so later reads never have to distinguish "fresh install" from
//! "marker missing".

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};

/// File name of the version marker inside the install root.
pub const MARKER_FILE_NAME: &str = ".patchkit-version";

/// The persisted applied-version token.
#[derive(Debug, Clone)]
pub struct VersionMarker {
    path: PathBuf,
}

impl VersionMarker {
    /// Marker for the given install root.
    pub fn new(install_root: &Path) -> Self {
        Self {
            path: install_root.join(MARKER_FILE_NAME),
        }
    }

    /// Location of the marker file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the applied version, creating an empty marker on first run.
    ///
    /// Returns `None` when no version has been applied yet.
    pub fn load_or_init(&self) -> SyncResult<Option<String>> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent).map_err(|e| SyncError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            fs::write(&self.path, "").map_err(|e| SyncError::Io {
                path: self.path.clone(),
                source: e,
            })?;
            tracing::info!(path = %self.path.display(), "created version marker");
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| SyncError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        let token = content.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    /// Record `version` as fully applied.
    pub fn record(&self, version: &str) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::write(&self.path, format!("{}\n", version.trim())).map_err(|e| SyncError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        tracing::info!(version = version.trim(), "version marker updated");
        Ok(())
    }
}
