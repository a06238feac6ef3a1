//! Backup file-set reader.
//!
//! Accepts an arbitrary set of externally-supplied documents matched by
//! filename, or a well-known folder holding the same set. Parsed logs and
//! the optional dictionary are handed to the reconciliation builder, which
//! produces a full replacement snapshot before anything is committed — a
//! failed import never leaves state partially updated.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use tally_core::{
    EntityDict, ReconcileError, Snapshot, TagId, TagSession, TaskId, TaskSession, reconcile,
};

use crate::csv::{CsvError, parse_record};
use crate::export::{
    DICT_FILE, MANIFEST_FILE, Manifest, SCHEMA_VERSION, SESSIONS_FILE, SESSIONS_HEADER,
    TAG_SESSIONS_FILE, TAG_SESSIONS_HEADER, TAG_TOTALS_FILE, TAG_TOTALS_HEADER, TOTALS_FILE,
    TOTALS_HEADER,
};

/// Import failures.
///
/// Validation problems (headers, records, empty selections) and structural
/// problems (missing required files) both abort before any state changes.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no importable files in selection")]
    EmptySelection,
    #[error("manifest declares required file {name} but it is missing")]
    MissingRequired { name: String },
    #[error("unsupported backup schema version {found}, supported up to {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },
    #[error("malformed {name}: {source}")]
    MalformedJson {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{name}: expected header `{expected}`")]
    BadHeader {
        name: String,
        expected: &'static str,
    },
    #[error("{name} line {line}: {message}")]
    BadRecord {
        name: String,
        line: usize,
        message: String,
    },
    #[error("{name}: {source}")]
    Csv {
        name: String,
        #[source]
        source: CsvError,
    },
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Imports from a well-known backup folder.
pub fn import_dir(dir: &Path) -> Result<Snapshot, ImportError> {
    let mut docs = BTreeMap::new();
    for name in KNOWN_FILES {
        let path = dir.join(name);
        match fs::read_to_string(&path) {
            Ok(content) => {
                docs.insert((*name).to_string(), content);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ImportError::Io {
                    name: path.display().to_string(),
                    source,
                });
            }
        }
    }
    import_documents(docs)
}

/// Imports from an arbitrary selection of files, matched by filename.
///
/// Files whose names are not part of the backup set are ignored.
pub fn import_files<P: AsRef<Path>>(paths: &[P]) -> Result<Snapshot, ImportError> {
    let mut docs = BTreeMap::new();
    for path in paths {
        let path = path.as_ref();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !KNOWN_FILES.contains(&name) {
            tracing::debug!(path = %path.display(), "ignoring unrecognized file in selection");
            continue;
        }
        let content = fs::read_to_string(path).map_err(|source| ImportError::Io {
            name: path.display().to_string(),
            source,
        })?;
        docs.insert(name.to_string(), content);
    }
    import_documents(docs)
}

const KNOWN_FILES: &[&str] = &[
    SESSIONS_FILE,
    TAG_SESSIONS_FILE,
    TOTALS_FILE,
    TAG_TOTALS_FILE,
    DICT_FILE,
    MANIFEST_FILE,
];

/// Reconciles a snapshot from in-memory documents keyed by filename.
pub fn import_documents(docs: BTreeMap<String, String>) -> Result<Snapshot, ImportError> {
    if docs.is_empty() {
        return Err(ImportError::EmptySelection);
    }

    let have_dict = docs.contains_key(DICT_FILE);

    if let Some(text) = docs.get(MANIFEST_FILE) {
        let manifest: Manifest =
            serde_json::from_str(text).map_err(|source| ImportError::MalformedJson {
                name: MANIFEST_FILE.to_string(),
                source,
            })?;
        if manifest.schema_version > SCHEMA_VERSION {
            return Err(ImportError::UnsupportedSchema {
                found: manifest.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        // A dictionary can stand in for missing session logs; anything else
        // the manifest requires must actually be present.
        for file in manifest.files.iter().filter(|f| f.required) {
            if !docs.contains_key(&file.name) && !have_dict {
                return Err(ImportError::MissingRequired {
                    name: file.name.clone(),
                });
            }
        }
    }

    let dict: Option<EntityDict> = docs
        .get(DICT_FILE)
        .map(|text| {
            serde_json::from_str(text).map_err(|source| ImportError::MalformedJson {
                name: DICT_FILE.to_string(),
                source,
            })
        })
        .transpose()?;

    let task_sessions = docs
        .get(SESSIONS_FILE)
        .map(|text| parse_task_sessions(text))
        .transpose()?;
    let tag_sessions = docs
        .get(TAG_SESSIONS_FILE)
        .map(|text| parse_tag_sessions(text))
        .transpose()?;

    // Derived totals are validated for shape but their values are discarded:
    // the session logs are the ledger of truth for accumulated time.
    if let Some(text) = docs.get(TOTALS_FILE) {
        validate_header(TOTALS_FILE, text, TOTALS_HEADER)?;
    }
    if let Some(text) = docs.get(TAG_TOTALS_FILE) {
        validate_header(TAG_TOTALS_FILE, text, TAG_TOTALS_HEADER)?;
    }

    Ok(reconcile::build(dict.as_ref(), task_sessions, tag_sessions)?)
}

fn validate_header(
    name: &'static str,
    text: &str,
    expected: &'static str,
) -> Result<(), ImportError> {
    let first = text.lines().next().unwrap_or("").trim_end_matches('\r');
    if first == expected {
        Ok(())
    } else {
        Err(ImportError::BadHeader {
            name: name.to_string(),
            expected,
        })
    }
}

/// Parses `sessions.csv`.
fn parse_task_sessions(text: &str) -> Result<Vec<TaskSession>, ImportError> {
    validate_header(SESSIONS_FILE, text, SESSIONS_HEADER)?;
    let mut sessions = Vec::new();
    for (line_no, line) in text.lines().enumerate().skip(1) {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let fields = parse_record(line, line_no + 1).map_err(|source| ImportError::Csv {
            name: SESSIONS_FILE.to_string(),
            source,
        })?;
        let [task_id, task_name, start_ts, end_ts] = fields.as_slice() else {
            return Err(bad_record(SESSIONS_FILE, line_no + 1, "expected 4 fields"));
        };
        sessions.push(TaskSession {
            task_id: TaskId::new(parse_id(SESSIONS_FILE, line_no + 1, "task_id", task_id)?),
            task_name: task_name.clone(),
            start_ms: parse_ts(SESSIONS_FILE, line_no + 1, "start_ts", start_ts)?,
            end_ms: parse_ts(SESSIONS_FILE, line_no + 1, "end_ts", end_ts)?,
        });
    }
    Ok(sessions)
}

/// Parses `tag_sessions.csv`.
fn parse_tag_sessions(text: &str) -> Result<Vec<TagSession>, ImportError> {
    validate_header(TAG_SESSIONS_FILE, text, TAG_SESSIONS_HEADER)?;
    let mut sessions = Vec::new();
    for (line_no, line) in text.lines().enumerate().skip(1) {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let fields = parse_record(line, line_no + 1).map_err(|source| ImportError::Csv {
            name: TAG_SESSIONS_FILE.to_string(),
            source,
        })?;
        let [tag_id, tag_name, task_id, task_name, start_ts, end_ts] = fields.as_slice() else {
            return Err(bad_record(
                TAG_SESSIONS_FILE,
                line_no + 1,
                "expected 6 fields",
            ));
        };
        sessions.push(TagSession {
            tag_id: TagId::new(parse_id(TAG_SESSIONS_FILE, line_no + 1, "tag_id", tag_id)?),
            tag_name: tag_name.clone(),
            task_id: TaskId::new(parse_id(TAG_SESSIONS_FILE, line_no + 1, "task_id", task_id)?),
            task_name: task_name.clone(),
            start_ms: parse_ts(TAG_SESSIONS_FILE, line_no + 1, "start_ts", start_ts)?,
            end_ms: parse_ts(TAG_SESSIONS_FILE, line_no + 1, "end_ts", end_ts)?,
        });
    }
    Ok(sessions)
}

fn bad_record(name: &str, line: usize, message: &str) -> ImportError {
    ImportError::BadRecord {
        name: name.to_string(),
        line,
        message: message.to_string(),
    }
}

fn parse_id(name: &str, line: usize, field: &str, value: &str) -> Result<u64, ImportError> {
    value
        .parse()
        .map_err(|_| bad_record(name, line, &format!("invalid {field}: {value:?}")))
}

fn parse_ts(name: &str, line: usize, field: &str, value: &str) -> Result<i64, ImportError> {
    value
        .parse()
        .map_err(|_| bad_record(name, line, &format!("invalid {field}: {value:?}")))
}
