//! Snapshot reconciliation.
//!
//! Rebuilds a consistent entity+session snapshot from partially-overlapping,
//! partially-stale external sources: an optional authoritative entity
//! dictionary and flat task/tag session logs. Precedence is deterministic:
//! the dictionary supplies structure (names, associations), the session logs
//! are the ledger of truth for accumulated time, and session evidence may
//! augment declared associations but never remove one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Tag, TagId, TagSession, Task, TaskId, TaskSession};
use crate::snapshot::Snapshot;

/// Reconciliation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Without a dictionary, both session logs are needed to reconstruct
    /// structure.
    #[error("cannot reconcile: no entity dictionary and a session log is absent")]
    InsufficientSources,
}

/// Declared task structure, stripped of running/timing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictTask {
    pub id: TaskId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

/// Declared tag structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictTag {
    pub id: TagId,
    pub name: String,
    /// Accepted for format tolerance; tags carry no link in the data model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Authoritative entity dictionary (`dict.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDict {
    #[serde(default)]
    pub tasks: Vec<DictTask>,
    #[serde(default)]
    pub tags: Vec<DictTag>,
}

/// Fallback name for a task synthesized without a usable denormalized name.
fn placeholder_name(id: TaskId) -> String {
    format!("task_{id}")
}

/// True when `name` is the synthetic fallback for this task id.
///
/// The check is exact so real names that merely start with `task_` are never
/// treated as placeholders.
fn is_placeholder(name: &str, id: TaskId) -> bool {
    name == placeholder_name(id)
}

/// Builds a consistent snapshot from the available sources.
///
/// `None` for a session log means the source is entirely absent (as opposed
/// to present but empty). The result is a closed-book picture: nothing is
/// running, no interval is open, and totals are the summed session durations.
pub fn build(
    dict: Option<&EntityDict>,
    task_sessions: Option<Vec<TaskSession>>,
    tag_sessions: Option<Vec<TagSession>>,
) -> Result<Snapshot, ReconcileError> {
    if dict.is_none() && (task_sessions.is_none() || tag_sessions.is_none()) {
        return Err(ReconcileError::InsufficientSources);
    }

    let mut tasks: BTreeMap<TaskId, Task> = BTreeMap::new();
    let mut tags: BTreeMap<TagId, Tag> = BTreeMap::new();

    // 1. Seed structure from the dictionary, zeroing all accumulated state.
    if let Some(dict) = dict {
        for dict_tag in &dict.tags {
            tags.insert(dict_tag.id, Tag::new(dict_tag.id, dict_tag.name.clone()));
        }
        for dict_task in &dict.tasks {
            let mut task = Task::new(
                dict_task.id,
                dict_task.name.clone(),
                dict_task.link.clone(),
                dict_task.tag_ids.iter().copied().collect(),
            );
            // Declared associations may point at tags the dictionary itself
            // does not list; synthesize those below only if sessions mention
            // them, otherwise drop the dangling reference.
            task.tag_ids.retain(|id| tags.contains_key(id));
            tasks.insert(task.id, task);
        }
    }

    // 2. Tag sessions: synthesize missing entities, augment associations.
    if let Some(sessions) = &tag_sessions {
        for session in sessions {
            tags.entry(session.tag_id).or_insert_with(|| {
                tracing::debug!(tag_id = session.tag_id.value(), "tag synthesized from session log");
                Tag::new(session.tag_id, session.tag_name.clone())
            });
            let task = tasks.entry(session.task_id).or_insert_with(|| {
                let name = if session.task_name.trim().is_empty() {
                    placeholder_name(session.task_id)
                } else {
                    session.task_name.clone()
                };
                tracing::debug!(task_id = session.task_id.value(), "task synthesized from tag sessions");
                Task::new(session.task_id, name, None, [session.tag_id].into())
            });
            // Session evidence augments declared associations, never removes.
            task.tag_ids.insert(session.tag_id);
        }
    }

    // 3. Task sessions: synthesize missing tasks, upgrade placeholder names.
    if let Some(sessions) = &task_sessions {
        for session in sessions {
            match tasks.get_mut(&session.task_id) {
                Some(task) => {
                    if is_placeholder(&task.name, task.id) && !session.task_name.trim().is_empty()
                    {
                        task.name = session.task_name.clone();
                    }
                }
                None => {
                    let name = if session.task_name.trim().is_empty() {
                        placeholder_name(session.task_id)
                    } else {
                        session.task_name.clone()
                    };
                    tracing::debug!(task_id = session.task_id.value(), "task synthesized from task sessions");
                    tasks.insert(
                        session.task_id,
                        Task::new(session.task_id, name, None, [].into()),
                    );
                }
            }
        }
    }

    // 4. Totals strictly from the session logs.
    if let Some(sessions) = &task_sessions {
        for session in sessions {
            if let Some(task) = tasks.get_mut(&session.task_id) {
                task.total_ms += (session.end_ms - session.start_ms).max(0);
            }
        }
    }
    if let Some(sessions) = &tag_sessions {
        for session in sessions {
            if let Some(tag) = tags.get_mut(&session.tag_id) {
                tag.total_ms += (session.end_ms - session.start_ms).max(0);
            }
        }
    }

    // 5. Emit by id, running/open state cleared by construction.
    Ok(Snapshot {
        tasks: tasks.into_values().collect(),
        tags: tags.into_values().collect(),
        task_sessions: task_sessions.unwrap_or_default(),
        tag_sessions: tag_sessions.unwrap_or_default(),
        ..Snapshot::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_session(task_id: u64, name: &str, start: i64, end: i64) -> TaskSession {
        TaskSession {
            task_id: TaskId::new(task_id),
            task_name: name.into(),
            start_ms: start,
            end_ms: end,
        }
    }

    fn tag_session(
        tag_id: u64,
        tag_name: &str,
        task_id: u64,
        task_name: &str,
        start: i64,
        end: i64,
    ) -> TagSession {
        TagSession {
            tag_id: TagId::new(tag_id),
            tag_name: tag_name.into(),
            task_id: TaskId::new(task_id),
            task_name: task_name.into(),
            start_ms: start,
            end_ms: end,
        }
    }

    fn dict() -> EntityDict {
        EntityDict {
            tasks: vec![DictTask {
                id: TaskId::new(1),
                name: "write report".into(),
                link: Some("https://example.com/report".into()),
                tag_ids: vec![TagId::new(1)],
            }],
            tags: vec![
                DictTag {
                    id: TagId::new(1),
                    name: "work".into(),
                    link: None,
                },
                DictTag {
                    id: TagId::new(2),
                    name: "focus".into(),
                    link: None,
                },
            ],
        }
    }

    #[test]
    fn dictionary_alone_yields_zero_totals() {
        let snapshot = build(Some(&dict()), None, None).unwrap();
        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.tags.len(), 2);
        assert_eq!(snapshot.tasks[0].name, "write report");
        assert_eq!(snapshot.tasks[0].tag_ids, [TagId::new(1)].into());
        assert!(snapshot.tasks.iter().all(|t| t.total_ms == 0 && !t.is_running));
        assert!(snapshot.tags.iter().all(|t| t.total_ms == 0 && t.active_children == 0));
        assert!(snapshot.task_sessions.is_empty());
    }

    #[test]
    fn no_dictionary_and_missing_log_fails() {
        assert_eq!(
            build(None, Some(vec![]), None),
            Err(ReconcileError::InsufficientSources)
        );
        assert_eq!(
            build(None, None, Some(vec![])),
            Err(ReconcileError::InsufficientSources)
        );
        assert_eq!(build(None, None, None), Err(ReconcileError::InsufficientSources));
    }

    #[test]
    fn session_logs_alone_reconstruct_everything() {
        let task_log = vec![
            task_session(1, "write report", 0, 100),
            task_session(1, "write report", 200, 250),
            task_session(2, "review", 0, 40),
        ];
        let tag_log = vec![
            tag_session(1, "work", 1, "write report", 0, 100),
            tag_session(1, "work", 2, "review", 0, 40),
            tag_session(2, "focus", 1, "write report", 200, 250),
        ];
        let snapshot = build(None, Some(task_log), Some(tag_log)).unwrap();

        assert_eq!(snapshot.tasks.len(), 2);
        assert_eq!(snapshot.tags.len(), 2);

        let write = &snapshot.tasks[0];
        assert_eq!(write.id, TaskId::new(1));
        assert_eq!(write.name, "write report");
        assert_eq!(write.total_ms, 150);
        assert_eq!(write.tag_ids, [TagId::new(1), TagId::new(2)].into());

        let review = &snapshot.tasks[1];
        assert_eq!(review.total_ms, 40);
        assert_eq!(review.tag_ids, [TagId::new(1)].into());

        assert_eq!(snapshot.tags[0].total_ms, 140);
        assert_eq!(snapshot.tags[1].total_ms, 50);
        assert!(snapshot.active_task_start.is_empty());
    }

    #[test]
    fn dictionary_names_are_never_overwritten() {
        let task_log = vec![task_session(1, "stale exported name", 0, 100)];
        let tag_log = vec![];
        let snapshot = build(Some(&dict()), Some(task_log), Some(tag_log)).unwrap();
        assert_eq!(snapshot.tasks[0].name, "write report");
        assert_eq!(snapshot.tasks[0].total_ms, 100);
    }

    #[test]
    fn placeholder_names_are_upgraded_by_task_sessions() {
        // Tag session with a blank task name forces the synthetic fallback.
        let tag_log = vec![tag_session(1, "work", 7, "", 0, 50)];
        let task_log = vec![task_session(7, "actual name", 0, 50)];
        let snapshot = build(None, Some(task_log), Some(tag_log)).unwrap();
        assert_eq!(snapshot.tasks[0].name, "actual name");
    }

    #[test]
    fn real_names_starting_with_task_prefix_survive() {
        let tag_log = vec![tag_session(1, "work", 3, "task_force sync", 0, 50)];
        let task_log = vec![task_session(3, "other", 0, 50)];
        let snapshot = build(None, Some(task_log), Some(tag_log)).unwrap();
        assert_eq!(snapshot.tasks[0].name, "task_force sync");
    }

    #[test]
    fn session_evidence_augments_but_never_removes_associations() {
        // Dictionary declares tag 1 on the task; sessions show tag 2 as well.
        let tag_log = vec![tag_session(2, "focus", 1, "write report", 0, 30)];
        let snapshot = build(Some(&dict()), Some(vec![]), Some(tag_log)).unwrap();
        assert_eq!(
            snapshot.tasks[0].tag_ids,
            [TagId::new(1), TagId::new(2)].into()
        );
    }

    #[test]
    fn negative_durations_count_as_zero() {
        let task_log = vec![
            task_session(1, "t", 100, 40),
            task_session(1, "t", 0, 25),
        ];
        let tag_log = vec![tag_session(1, "g", 1, "t", 100, 40)];
        let snapshot = build(None, Some(task_log), Some(tag_log)).unwrap();
        assert_eq!(snapshot.tasks[0].total_ms, 25);
        assert_eq!(snapshot.tags[0].total_ms, 0);
    }

    #[test]
    fn dangling_dictionary_tag_refs_are_dropped() {
        let dict = EntityDict {
            tasks: vec![DictTask {
                id: TaskId::new(1),
                name: "t".into(),
                link: None,
                tag_ids: vec![TagId::new(9)],
            }],
            tags: vec![],
        };
        let snapshot = build(Some(&dict), None, None).unwrap();
        assert!(snapshot.tasks[0].tag_ids.is_empty());
    }

    #[test]
    fn output_is_sorted_by_id() {
        let task_log = vec![
            task_session(5, "five", 0, 1),
            task_session(2, "two", 0, 1),
            task_session(9, "nine", 0, 1),
        ];
        let snapshot = build(None, Some(task_log), Some(vec![])).unwrap();
        let ids: Vec<u64> = snapshot.tasks.iter().map(|t| t.id.value()).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }
}
