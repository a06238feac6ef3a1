//! CLI command implementations.

pub mod export;
pub mod import;
pub mod status;
pub mod tag;
pub mod task;

use std::time::Duration;

use anyhow::{Context, Result};

use tally_core::{Millis, Workspace};
use tally_store::Persister;

use crate::Config;

/// Loads the workspace from the configured snapshot document.
pub fn load_workspace(config: &Config) -> Result<Workspace> {
    let snapshot = tally_store::load_snapshot(&config.snapshot_path)
        .with_context(|| format!("failed to load {}", config.snapshot_path.display()))?;
    Ok(Workspace::from_snapshot(snapshot))
}

/// Persists the workspace through the debounced writer.
///
/// Persistence is a fire-and-forget side effect of a successful mutation;
/// a failed write is logged and retried on the next one. One-shot commands
/// flush before returning so the delay window never outlives the process.
pub fn save_workspace(config: &Config, workspace: &Workspace, now: Millis) {
    let mut snapshot = workspace.to_snapshot();
    if snapshot.install_at_ms.is_none() {
        snapshot.install_at_ms = Some(now);
    }
    let persister = Persister::new(
        &config.snapshot_path,
        Duration::from_millis(config.persist_delay_ms),
    );
    persister.schedule(snapshot);
    persister.flush();
}

/// Renders milliseconds as `1h 02m 03s`, `4m 05s`, or `9s`.
#[must_use]
pub fn format_duration(ms: Millis) -> String {
    let total_secs = ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
