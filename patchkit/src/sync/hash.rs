//! Streamed MD5 hashing for file verification.
//!
//! The manifest identifies file content by MD5 hex digest. Files are hashed
//! in bounded-size chunks so verification never loads a whole file into
//! memory.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};

use crate::error::{SyncError, SyncResult};

/// Buffer size for reading files during hashing (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the MD5 digest of a file.
///
/// Returns the lowercase hexadecimal digest of the file contents, streaming
/// the file in [`BUFFER_SIZE`] chunks.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the file cannot be opened or read.
pub fn file_md5(path: &Path) -> SyncResult<String> {
    let mut file = File::open(path).map_err(|e| SyncError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| SyncError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compare two hex digests case-insensitively.
pub fn hashes_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
