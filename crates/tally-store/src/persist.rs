//! Debounced snapshot persistence.
//!
//! Mutations trigger persistence as a fire-and-forget side effect. Rapid
//! consecutive mutations within the delay window collapse into one durable
//! write, and a cheap content signature (count + last end timestamp of each
//! session log) skips writes that would store identical session history. A
//! superseded pending write is dropped whole, never partially applied.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tally_core::{Millis, Snapshot};

use crate::snapshot_file::save_snapshot;

type Signature = (usize, Millis, usize, Millis);

#[derive(Debug, Default)]
struct Inner {
    pending: Option<Snapshot>,
    /// Bumped on every schedule; a sleeper only writes if it is still the
    /// latest one when it wakes.
    generation: u64,
    last_written: Option<Signature>,
    writes: u64,
}

/// Coalescing writer for the durable snapshot.
#[derive(Debug, Clone)]
pub struct Persister {
    path: PathBuf,
    delay: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl Persister {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            path: path.into(),
            delay,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Queues a snapshot for writing after the delay window.
    ///
    /// A newer schedule supersedes this one. Must be called from within a
    /// tokio runtime.
    pub fn schedule(&self, snapshot: Snapshot) {
        let generation = {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            inner.pending = Some(snapshot);
            inner.generation += 1;
            inner.generation
        };
        let inner = Arc::clone(&self.inner);
        let path = self.path.clone();
        let delay = self.delay;
        // Detached on purpose; dropping the handle does not cancel the task.
        let _sleeper = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Ok(mut inner) = inner.lock() else {
                return;
            };
            if inner.generation != generation {
                // A newer schedule owns the pending snapshot now.
                return;
            }
            write_pending(&path, &mut inner);
        });
    }

    /// Writes any pending snapshot immediately.
    ///
    /// One-shot callers use this before exit so the debounce window never
    /// outlives the process.
    pub fn flush(&self) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        write_pending(&self.path, &mut inner);
    }

    /// Number of durable writes performed so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.lock().map_or(0, |inner| inner.writes)
    }
}

fn write_pending(path: &Path, inner: &mut Inner) {
    let Some(snapshot) = inner.pending.take() else {
        return;
    };
    let signature = snapshot.signature();
    if inner.last_written == Some(signature) {
        tracing::debug!(?signature, "session history unchanged, skipping write");
        return;
    }
    match save_snapshot(path, &snapshot) {
        Ok(()) => {
            inner.last_written = Some(signature);
            inner.writes += 1;
            tracing::debug!(path = %path.display(), "snapshot persisted");
        }
        Err(e) => {
            // Keep running; the next mutation schedules another attempt.
            tracing::warn!(path = %path.display(), error = %e, "failed to persist snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot_file::load_snapshot;
    use tally_core::{TaskId, TaskSession};

    fn snapshot_with_sessions(count: usize) -> Snapshot {
        let task_sessions = (0..count)
            .map(|i| TaskSession {
                task_id: TaskId::new(1),
                task_name: "write".into(),
                start_ms: i as Millis * 100,
                end_ms: i as Millis * 100 + 50,
            })
            .collect();
        Snapshot {
            task_sessions,
            ..Snapshot::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_schedules_coalesces_into_one_write() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("snapshot.json");
        let persister = Persister::new(&path, Duration::from_millis(500));

        persister.schedule(snapshot_with_sessions(1));
        persister.schedule(snapshot_with_sessions(2));
        persister.schedule(snapshot_with_sessions(3));

        tokio::time::sleep(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;

        assert_eq!(persister.write_count(), 1);
        let written = load_snapshot(&path).unwrap();
        assert_eq!(written.task_sessions.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_signature_skips_the_write() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("snapshot.json");
        let persister = Persister::new(&path, Duration::from_millis(500));

        persister.schedule(snapshot_with_sessions(2));
        persister.flush();
        assert_eq!(persister.write_count(), 1);

        persister.schedule(snapshot_with_sessions(2));
        persister.flush();
        assert_eq!(persister.write_count(), 1);

        persister.schedule(snapshot_with_sessions(3));
        persister.flush();
        assert_eq!(persister.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_preempts_the_delay_window() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("snapshot.json");
        let persister = Persister::new(&path, Duration::from_secs(3600));

        persister.schedule(snapshot_with_sessions(1));
        persister.flush();
        assert_eq!(persister.write_count(), 1);
        assert!(path.exists());

        // The sleeper wakes later, finds nothing pending, and writes nothing.
        tokio::time::sleep(Duration::from_secs(3601)).await;
        tokio::task::yield_now().await;
        assert_eq!(persister.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_write_is_dropped_not_partially_applied() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("snapshot.json");
        let persister = Persister::new(&path, Duration::from_millis(500));

        persister.schedule(snapshot_with_sessions(1));
        // Let the first sleeper expire only after the second schedule.
        tokio::time::sleep(Duration::from_millis(300)).await;
        persister.schedule(snapshot_with_sessions(5));
        tokio::time::sleep(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;

        assert_eq!(persister.write_count(), 1);
        let written = load_snapshot(&path).unwrap();
        assert_eq!(written.task_sessions.len(), 5);
    }
}
