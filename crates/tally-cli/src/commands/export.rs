//! Export command: write the backup file set.

use std::path::Path;

use anyhow::{Context, Result};

use tally_core::Workspace;

pub fn run(workspace: &Workspace, dir: &Path) -> Result<()> {
    tally_store::write_backup(dir, &workspace.to_snapshot())
        .with_context(|| format!("failed to write backup to {}", dir.display()))?;
    Ok(())
}
