//! The complete serializable state of a workspace.
//!
//! A [`Snapshot`] carries everything needed to resume accounting exactly:
//! entities, closed-session logs, and the engine's open-interval bookkeeping.
//! A task still marked running in a restored snapshot simply keeps accruing
//! display time against its restored start timestamp.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::model::{Millis, Tag, TagId, TagSession, Task, TaskId, TaskSession};

/// Open task interval carried across process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTaskStart {
    pub task_id: TaskId,
    pub start_ms: Millis,
}

/// Open (task, tag) interval carried across process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTagStart {
    pub task_id: TaskId,
    pub tag_id: TagId,
    pub start_ms: Millis,
}

/// Durable snapshot document.
///
/// Tolerant of missing fields in both directions: every field defaults, so
/// documents written by older or newer revisions still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub tags: Vec<Tag>,
    pub task_sessions: Vec<TaskSession>,
    pub tag_sessions: Vec<TagSession>,
    pub app_usage_ms: Millis,
    pub install_at_ms: Option<Millis>,
    pub active_task_start: Vec<ActiveTaskStart>,
    pub active_tag_start: Vec<ActiveTagStart>,
    /// Id allocator positions. Older documents omit them; restore then
    /// resumes above the highest id seen instead.
    pub next_task_id: u64,
    pub next_tag_id: u64,
}

impl Snapshot {
    /// Cheap content signature used to skip redundant durable writes:
    /// count and last end timestamp of each session log.
    #[must_use]
    pub fn signature(&self) -> (usize, Millis, usize, Millis) {
        (
            self.task_sessions.len(),
            self.task_sessions.last().map_or(0, |s| s.end_ms),
            self.tag_sessions.len(),
            self.tag_sessions.last().map_or(0, |s| s.end_ms),
        )
    }
}

/// In-memory workspace: engine bookkeeping plus the entity collections it
/// transforms, and the app-level counters carried through the codec.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workspace {
    pub engine: Engine,
    pub tasks: Vec<Task>,
    pub tags: Vec<Tag>,
    pub app_usage_ms: Millis,
    pub install_at_ms: Option<Millis>,
}

impl Workspace {
    /// Rebuilds the workspace from a snapshot.
    ///
    /// Id counters resume strictly above every id seen in entities or
    /// sessions, so ids are never reused even for purged entities that left
    /// sessions behind. Open-interval entries are re-keyed into the engine
    /// maps; a running task whose map entry is missing falls back to its own
    /// `last_started_at_ms` at the next stop.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut open_tasks: HashMap<TaskId, Millis> = HashMap::new();
        for entry in &snapshot.active_task_start {
            open_tasks.insert(entry.task_id, entry.start_ms);
        }
        let mut open_task_tags: HashMap<(TaskId, TagId), Millis> = HashMap::new();
        for entry in &snapshot.active_tag_start {
            open_task_tags.insert((entry.task_id, entry.tag_id), entry.start_ms);
        }

        let max_task_id = snapshot
            .tasks
            .iter()
            .map(|t| t.id.value())
            .chain(snapshot.task_sessions.iter().map(|s| s.task_id.value()))
            .max()
            .unwrap_or(0);
        let max_tag_id = snapshot
            .tags
            .iter()
            .map(|t| t.id.value())
            .chain(snapshot.tag_sessions.iter().map(|s| s.tag_id.value()))
            .max()
            .unwrap_or(0);

        let engine = Engine {
            next_task_id: snapshot.next_task_id.max(max_task_id + 1),
            next_tag_id: snapshot.next_tag_id.max(max_tag_id + 1),
            open_tasks,
            open_task_tags,
            task_sessions: snapshot.task_sessions,
            tag_sessions: snapshot.tag_sessions,
        };

        Self {
            engine,
            tasks: snapshot.tasks,
            tags: snapshot.tags,
            app_usage_ms: snapshot.app_usage_ms,
            install_at_ms: snapshot.install_at_ms,
        }
    }

    /// Creates a task and adds it to the collection. Returns the new id.
    pub fn create_task(
        &mut self,
        name: &str,
        link: Option<String>,
        tag_ids: &std::collections::BTreeSet<TagId>,
    ) -> Result<TaskId, crate::model::ValidationError> {
        let task = self.engine.create_task(name, link, tag_ids, &self.tags)?;
        let id = task.id;
        self.tasks.push(task);
        Ok(id)
    }

    /// Creates a tag and adds it to the collection. Returns the new id.
    pub fn create_tag(&mut self, name: &str) -> Result<TagId, crate::model::ValidationError> {
        let tag = self.engine.create_tag(name)?;
        let id = tag.id;
        self.tags.push(tag);
        Ok(id)
    }

    /// Toggles a task, replacing the entity collections with the new version.
    pub fn toggle_task(&mut self, task_id: TaskId, now: Millis) {
        let (tasks, tags) = self.engine.toggle_task(
            std::mem::take(&mut self.tasks),
            std::mem::take(&mut self.tags),
            task_id,
            now,
        );
        self.tasks = tasks;
        self.tags = tags;
    }

    /// Replaces a task's tag set through the engine.
    pub fn reassign_task_tags(
        &mut self,
        task_id: TaskId,
        new_tag_ids: std::collections::BTreeSet<TagId>,
        now: Millis,
    ) {
        let (tasks, tags) = self.engine.reassign_task_tags(
            std::mem::take(&mut self.tasks),
            std::mem::take(&mut self.tags),
            task_id,
            new_tag_ids,
            now,
        );
        self.tasks = tasks;
        self.tags = tags;
    }

    /// Soft-deletes a task, stopping it first if needed.
    pub fn delete_task(&mut self, task_id: TaskId, now: Millis) {
        let (tasks, tags) = self.engine.delete_task(
            std::mem::take(&mut self.tasks),
            std::mem::take(&mut self.tags),
            task_id,
            now,
        );
        self.tasks = tasks;
        self.tags = tags;
    }

    /// Soft-deletes a tag, detaching it from every holder first.
    pub fn delete_tag(&mut self, tag_id: TagId, now: Millis) {
        let (tasks, tags) = self.engine.delete_tag(
            std::mem::take(&mut self.tasks),
            std::mem::take(&mut self.tags),
            tag_id,
            now,
        );
        self.tasks = tasks;
        self.tags = tags;
    }

    /// Undeletes a task.
    pub fn restore_task(&mut self, task_id: TaskId) {
        self.tasks = crate::engine::restore_task(std::mem::take(&mut self.tasks), &self.tags, task_id);
    }

    /// Undeletes a tag and its remembered associations.
    pub fn restore_tag(&mut self, tag_id: TagId, now: Millis) {
        let (tasks, tags) = self.engine.restore_tag(
            std::mem::take(&mut self.tasks),
            std::mem::take(&mut self.tags),
            tag_id,
            now,
        );
        self.tasks = tasks;
        self.tags = tags;
    }

    /// Captures the workspace into a snapshot document.
    ///
    /// Active-interval lists are emitted in id order so equal states
    /// serialize identically.
    #[must_use]
    pub fn to_snapshot(&self) -> Snapshot {
        let mut active_task_start: Vec<ActiveTaskStart> = self
            .engine
            .open_tasks
            .iter()
            .map(|(task_id, start_ms)| ActiveTaskStart {
                task_id: *task_id,
                start_ms: *start_ms,
            })
            .collect();
        active_task_start.sort_by_key(|e| e.task_id);

        let mut active_tag_start: Vec<ActiveTagStart> = self
            .engine
            .open_task_tags
            .iter()
            .map(|((task_id, tag_id), start_ms)| ActiveTagStart {
                task_id: *task_id,
                tag_id: *tag_id,
                start_ms: *start_ms,
            })
            .collect();
        active_tag_start.sort_by_key(|e| (e.task_id, e.tag_id));

        Snapshot {
            tasks: self.tasks.clone(),
            tags: self.tags.clone(),
            task_sessions: self.engine.task_sessions.clone(),
            tag_sessions: self.engine.tag_sessions.clone(),
            app_usage_ms: self.app_usage_ms,
            install_at_ms: self.install_at_ms,
            active_task_start,
            active_tag_start,
            next_task_id: self.engine.next_task_id,
            next_tag_id: self.engine.next_tag_id,
        }
    }
}
