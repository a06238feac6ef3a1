//! Import command: rebuild state from a backup file set.
//!
//! The reconciliation builder produces a complete replacement snapshot
//! before anything is committed, so a failed import leaves the previous
//! state untouched.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use tally_core::{Millis, Workspace};

/// Reconciles a new workspace from the given sources.
///
/// App-level counters (install timestamp, usage) are carried over from the
/// current workspace; imported data only replaces entities and sessions.
pub fn run(
    current: &Workspace,
    dir: Option<&Path>,
    files: &[PathBuf],
    now: Millis,
) -> Result<Workspace> {
    let mut snapshot = match dir {
        Some(dir) => tally_store::import_dir(dir)
            .with_context(|| format!("import from {} failed", dir.display()))?,
        None => {
            if files.is_empty() {
                bail!("nothing to import: pass --dir or at least one file");
            }
            tally_store::import_files(files).context("import failed")?
        }
    };
    snapshot.install_at_ms = current.install_at_ms.or(Some(now));
    snapshot.app_usage_ms = current.app_usage_ms;
    Ok(Workspace::from_snapshot(snapshot))
}
