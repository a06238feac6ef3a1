//! Core entity types with validation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Milliseconds since the Unix epoch.
///
/// Timestamps are opaque: they are only ever compared by relative order and
/// subtracted to form durations. No time-zone logic lives in this crate.
pub type Millis = i64;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty or whitespace-only.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
}

/// Rejects empty or whitespace-only names.
pub(crate) fn validate_name(name: &str, field: &'static str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

/// Generates a numeric ID newtype with common trait implementations.
///
/// IDs are assigned monotonically by the engine and never reused, even after
/// the entity they identified is deleted.
macro_rules! define_numeric_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw ID value.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw ID value.
            #[must_use]
            pub const fn value(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_numeric_id!(
    /// Identifier of a task.
    TaskId
);

define_numeric_id!(
    /// Identifier of a tag.
    TagId
);

/// A user-defined unit of work that accumulates timed intervals.
///
/// `total_ms` holds closed time only; the currently open interval is computed
/// on demand via [`display_ms`](crate::engine::display_ms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Free-text URI attached to the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Tags attached to the task. Unique, order-irrelevant.
    #[serde(default)]
    pub tag_ids: BTreeSet<TagId>,
    #[serde(default)]
    pub is_running: bool,
    /// Accumulated closed time. Never includes the open interval.
    #[serde(default)]
    pub total_ms: Millis,
    /// Start of the current open interval. Present iff `is_running`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_started_at_ms: Option<Millis>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at_ms: Option<Millis>,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        name: String,
        link: Option<String>,
        tag_ids: BTreeSet<TagId>,
    ) -> Self {
        Self {
            id,
            name,
            link,
            tag_ids,
            is_running: false,
            total_ms: 0,
            last_started_at_ms: None,
            deleted: false,
            deleted_at_ms: None,
        }
    }

    /// Soft-deleted entities stay in the collection but are not visible.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        !self.deleted
    }
}

/// A label shared by any number of tasks, accounting time transitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    /// Number of running tasks currently feeding an open interval into this
    /// tag. Tracked incrementally, never recomputed.
    #[serde(default)]
    pub active_children: u32,
    #[serde(default)]
    pub total_ms: Millis,
    /// Display hint only. With several tasks sharing the tag the single
    /// timestamp is ambiguous; `active_children` plus the per-(task, tag)
    /// interval map is the authoritative signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_started_at_ms: Option<Millis>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at_ms: Option<Millis>,
    /// Tasks that held this tag immediately before a tag-only deletion.
    /// Consumed to restore the associations when the tag is undeleted.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub restore_task_ids: BTreeSet<TaskId>,
}

impl Tag {
    pub(crate) fn new(id: TagId, name: String) -> Self {
        Self {
            id,
            name,
            active_children: 0,
            total_ms: 0,
            last_started_at_ms: None,
            deleted: false,
            deleted_at_ms: None,
            restore_task_ids: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        !self.deleted
    }
}

/// A closed task interval, kept for reporting and export.
///
/// `task_name` is denormalized at close time so exports stay self-describing
/// after the task is renamed or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSession {
    pub task_id: TaskId,
    pub task_name: String,
    pub start_ms: Millis,
    pub end_ms: Millis,
}

/// A closed (task, tag) interval.
///
/// A tag can have several concurrently open intervals when multiple running
/// tasks share it; each task's contribution closes into its own record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSession {
    pub tag_id: TagId,
    pub tag_name: String,
    pub task_id: TaskId,
    pub task_name: String,
    pub start_ms: Millis,
    pub end_ms: Millis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_display_and_value() {
        let id = TaskId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.value(), 42);
        assert_eq!(TaskId::from(42), id);
    }

    #[test]
    fn id_serde_is_transparent() {
        let id = TagId::new(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let parsed: TagId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn validate_name_rejects_blank() {
        assert!(validate_name("", "task name").is_err());
        assert!(validate_name("   ", "task name").is_err());
        assert!(validate_name("write spec", "task name").is_ok());
    }

    #[test]
    fn task_deserializes_without_optional_fields() {
        let task: Task = serde_json::from_str(r#"{"id":1,"name":"review"}"#).unwrap();
        assert_eq!(task.id, TaskId::new(1));
        assert_eq!(task.name, "review");
        assert!(task.link.is_none());
        assert!(task.tag_ids.is_empty());
        assert!(!task.is_running);
        assert_eq!(task.total_ms, 0);
        assert!(!task.deleted);
    }

    #[test]
    fn tag_deserializes_without_optional_fields() {
        let tag: Tag = serde_json::from_str(r#"{"id":3,"name":"deep work"}"#).unwrap();
        assert_eq!(tag.id, TagId::new(3));
        assert_eq!(tag.active_children, 0);
        assert!(tag.restore_task_ids.is_empty());
    }

    #[test]
    fn session_serde_round_trip() {
        let session = TagSession {
            tag_id: TagId::new(2),
            tag_name: "focus".into(),
            task_id: TaskId::new(5),
            task_name: "draft report".into(),
            start_ms: 1_000,
            end_ms: 2_500,
        };
        let json = serde_json::to_string(&session).unwrap();
        let parsed: TagSession = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, session);
    }
}
