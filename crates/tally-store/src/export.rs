//! Backup file-set writer.
//!
//! Exports the flat, human-readable ledger: session logs as CSV, derived
//! totals, the entity dictionary, and a manifest declaring the set. Session
//! rows carry the denormalized names captured at close time, so the export
//! stays self-describing after entities are renamed or deleted.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tally_core::{DictTag, DictTask, EntityDict, Snapshot};

use crate::csv::format_record;

pub const SESSIONS_FILE: &str = "sessions.csv";
pub const TAG_SESSIONS_FILE: &str = "tag_sessions.csv";
pub const TOTALS_FILE: &str = "totals.csv";
pub const TAG_TOTALS_FILE: &str = "tag_totals.csv";
pub const DICT_FILE: &str = "dict.json";
pub const MANIFEST_FILE: &str = "manifest.json";

pub const SESSIONS_HEADER: &str = "task_id,task_name,start_ts,end_ts";
pub const TAG_SESSIONS_HEADER: &str = "tag_id,tag_name,task_id,task_name,start_ts,end_ts";
pub const TOTALS_HEADER: &str = "task_id,task_name,total_ms";
pub const TAG_TOTALS_HEADER: &str = "tag_id,tag_name,total_ms";

/// Version stamped into `manifest.json`.
pub const SCHEMA_VERSION: u32 = 1;

/// Export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode {file}: {source}")]
    Encode {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Backup-set manifest: schema version plus the declared file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    pub files: Vec<ManifestFile>,
}

/// One declared file with its import metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    pub name: String,
    pub required: bool,
    pub handler: String,
}

impl Manifest {
    /// The manifest written by this version of the exporter.
    #[must_use]
    pub fn current() -> Self {
        let file = |name: &str, required: bool, handler: &str| ManifestFile {
            name: name.to_string(),
            required,
            handler: handler.to_string(),
        };
        Self {
            schema_version: SCHEMA_VERSION,
            files: vec![
                file(SESSIONS_FILE, true, "task_sessions"),
                file(TAG_SESSIONS_FILE, true, "tag_sessions"),
                file(TOTALS_FILE, false, "task_totals"),
                file(TAG_TOTALS_FILE, false, "tag_totals"),
                file(DICT_FILE, false, "dictionary"),
            ],
        }
    }
}

/// Renders `sessions.csv`.
#[must_use]
pub fn render_sessions(snapshot: &Snapshot) -> String {
    let mut out = String::from(SESSIONS_HEADER);
    out.push('\n');
    for session in &snapshot.task_sessions {
        out.push_str(&format_record(&[
            &session.task_id.to_string(),
            &session.task_name,
            &session.start_ms.to_string(),
            &session.end_ms.to_string(),
        ]));
        out.push('\n');
    }
    out
}

/// Renders `tag_sessions.csv`.
#[must_use]
pub fn render_tag_sessions(snapshot: &Snapshot) -> String {
    let mut out = String::from(TAG_SESSIONS_HEADER);
    out.push('\n');
    for session in &snapshot.tag_sessions {
        out.push_str(&format_record(&[
            &session.tag_id.to_string(),
            &session.tag_name,
            &session.task_id.to_string(),
            &session.task_name,
            &session.start_ms.to_string(),
            &session.end_ms.to_string(),
        ]));
        out.push('\n');
    }
    out
}

/// Renders `totals.csv`. Derived from entity totals; ignored on import.
#[must_use]
pub fn render_totals(snapshot: &Snapshot) -> String {
    let mut out = String::from(TOTALS_HEADER);
    out.push('\n');
    for task in snapshot.tasks.iter().filter(|t| t.is_visible()) {
        out.push_str(&format_record(&[
            &task.id.to_string(),
            &task.name,
            &task.total_ms.to_string(),
        ]));
        out.push('\n');
    }
    out
}

/// Renders `tag_totals.csv`. Derived; ignored on import.
#[must_use]
pub fn render_tag_totals(snapshot: &Snapshot) -> String {
    let mut out = String::from(TAG_TOTALS_HEADER);
    out.push('\n');
    for tag in snapshot.tags.iter().filter(|t| t.is_visible()) {
        out.push_str(&format_record(&[
            &tag.id.to_string(),
            &tag.name,
            &tag.total_ms.to_string(),
        ]));
        out.push('\n');
    }
    out
}

/// The dictionary declaring visible structure (no totals, no running state).
#[must_use]
pub fn dict_from_snapshot(snapshot: &Snapshot) -> EntityDict {
    EntityDict {
        tasks: snapshot
            .tasks
            .iter()
            .filter(|t| t.is_visible())
            .map(|t| DictTask {
                id: t.id,
                name: t.name.clone(),
                link: t.link.clone(),
                tag_ids: t.tag_ids.iter().copied().collect(),
            })
            .collect(),
        tags: snapshot
            .tags
            .iter()
            .filter(|t| t.is_visible())
            .map(|t| DictTag {
                id: t.id,
                name: t.name.clone(),
                link: None,
            })
            .collect(),
    }
}

/// Writes the complete backup set into `dir`, creating it if needed.
pub fn write_backup(dir: &Path, snapshot: &Snapshot) -> Result<(), ExportError> {
    fs::create_dir_all(dir)?;

    fs::write(dir.join(SESSIONS_FILE), render_sessions(snapshot))?;
    fs::write(dir.join(TAG_SESSIONS_FILE), render_tag_sessions(snapshot))?;
    fs::write(dir.join(TOTALS_FILE), render_totals(snapshot))?;
    fs::write(dir.join(TAG_TOTALS_FILE), render_tag_totals(snapshot))?;

    let dict = serde_json::to_string_pretty(&dict_from_snapshot(snapshot)).map_err(|source| {
        ExportError::Encode {
            file: DICT_FILE,
            source,
        }
    })?;
    fs::write(dir.join(DICT_FILE), dict)?;

    let manifest =
        serde_json::to_string_pretty(&Manifest::current()).map_err(|source| ExportError::Encode {
            file: MANIFEST_FILE,
            source,
        })?;
    fs::write(dir.join(MANIFEST_FILE), manifest)?;

    tracing::debug!(dir = %dir.display(), "backup set written");
    Ok(())
}
