//! Durable snapshot document on disk.
//!
//! One JSON file holds the complete workspace state. Writes go through a
//! temp file and an atomic rename so a crash mid-write never leaves a
//! truncated document behind.

use std::fs;
use std::path::Path;

use thiserror::Error;

use tally_core::Snapshot;

/// Snapshot file failures.
#[derive(Debug, Error)]
pub enum SnapshotFileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed snapshot document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Loads the snapshot at `path`.
///
/// A missing file is a fresh workspace, not an error. A present but
/// unreadable or malformed file is surfaced to the caller; the store never
/// silently discards user data.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, SnapshotFileError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no snapshot yet, starting empty");
            return Ok(Snapshot::default());
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&content)?)
}

/// Writes the snapshot atomically (temp file + rename).
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotFileError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string(snapshot)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &content)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}
