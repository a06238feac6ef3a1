//! Interval accounting engine.
//!
//! Opens and closes timed intervals for tasks and, transitively, for their
//! tags. The engine owns only the mutable bookkeeping: id counters, the
//! open-interval maps, and the closed-session logs. Entity collections are
//! taken by value and returned transformed, so each operation yields a new
//! immutable-per-version snapshot the caller can publish however it likes.
//!
//! All operations are synchronous and complete atomically; the caller is the
//! single writer and serializes mutations. [`display_ms`] reads are pure and
//! may run concurrently with each other.

use std::collections::{BTreeSet, HashMap, hash_map::Entry};

use crate::model::{
    Millis, Tag, TagId, TagSession, Task, TaskId, TaskSession, ValidationError, validate_name,
};

/// Live elapsed time for an entity.
///
/// Returns `total_ms` when no interval is open, otherwise
/// `total_ms + max(0, now - last_started_at_ms)`. This is the only way live
/// time is computed; callers re-invoke it on every refresh tick instead of
/// incrementing counters. Idempotent and monotone in `now`.
#[must_use]
pub fn display_ms(total_ms: Millis, last_started_at_ms: Option<Millis>, now: Millis) -> Millis {
    last_started_at_ms.map_or(total_ms, |started| total_ms + (now - started).max(0))
}

/// Restores a soft-deleted task.
///
/// A pure relabeling: the task was stopped when it was deleted, so no
/// bookkeeping changes hands. Tag references that went away while the task
/// was deleted are dropped so the task never points at a missing tag.
#[must_use]
pub fn restore_task(mut tasks: Vec<Task>, tags: &[Tag], task_id: TaskId) -> Vec<Task> {
    if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id && t.deleted) {
        task.deleted = false;
        task.deleted_at_ms = None;
        task.tag_ids
            .retain(|id| tags.iter().any(|t| t.id == *id && t.is_visible()));
    }
    tasks
}

/// State machine over tasks, tags, and their open intervals.
///
/// Counters are instance-owned; two engines share a logical workspace only
/// if the caller intentionally hands them the same restored state.
#[derive(Debug, Clone, PartialEq)]
pub struct Engine {
    pub(crate) next_task_id: u64,
    pub(crate) next_tag_id: u64,
    /// task id -> start of its open interval.
    pub(crate) open_tasks: HashMap<TaskId, Millis>,
    /// (task id, tag id) -> start of that pairing's open interval.
    pub(crate) open_task_tags: HashMap<(TaskId, TagId), Millis>,
    pub(crate) task_sessions: Vec<TaskSession>,
    pub(crate) tag_sessions: Vec<TagSession>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_task_id: 1,
            next_tag_id: 1,
            open_tasks: HashMap::new(),
            open_task_tags: HashMap::new(),
            task_sessions: Vec::new(),
            tag_sessions: Vec::new(),
        }
    }

    /// Closed task sessions accumulated so far, oldest first.
    #[must_use]
    pub fn task_sessions(&self) -> &[TaskSession] {
        &self.task_sessions
    }

    /// Closed tag sessions accumulated so far, oldest first.
    #[must_use]
    pub fn tag_sessions(&self) -> &[TagSession] {
        &self.tag_sessions
    }

    /// Live elapsed time for a tag: closed total plus every open
    /// (task, tag) interval currently feeding it.
    #[must_use]
    pub fn live_tag_ms(&self, tag: &Tag, now: Millis) -> Millis {
        let open: Millis = self
            .open_task_tags
            .iter()
            .filter(|((_, tag_id), _)| *tag_id == tag.id)
            .map(|(_, start)| (now - start).max(0))
            .sum();
        tag.total_ms + open
    }

    /// Creates a zero-state task with the next id.
    ///
    /// Unknown or deleted tag ids are dropped so the task never references a
    /// tag that is not visible. The counter does not advance on rejection.
    pub fn create_task(
        &mut self,
        name: &str,
        link: Option<String>,
        tag_ids: &BTreeSet<TagId>,
        tags: &[Tag],
    ) -> Result<Task, ValidationError> {
        validate_name(name, "task name")?;
        let retained: BTreeSet<TagId> = tag_ids
            .iter()
            .copied()
            .filter(|id| tags.iter().any(|t| t.id == *id && t.is_visible()))
            .collect();
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        let link = link.filter(|l| !l.trim().is_empty());
        tracing::debug!(task_id = id.value(), name, "task created");
        Ok(Task::new(id, name.trim().to_string(), link, retained))
    }

    /// Creates a zero-state tag with the next id.
    pub fn create_tag(&mut self, name: &str) -> Result<Tag, ValidationError> {
        validate_name(name, "tag name")?;
        let id = TagId::new(self.next_tag_id);
        self.next_tag_id += 1;
        tracing::debug!(tag_id = id.value(), name, "tag created");
        Ok(Tag::new(id, name.trim().to_string()))
    }

    /// Flips a task between `Paused` and `Running`.
    ///
    /// Unknown or deleted task ids are a no-op; the inputs come back
    /// unchanged. A stop in the same millisecond as the start accumulates
    /// nothing and logs no session.
    #[must_use]
    pub fn toggle_task(
        &mut self,
        mut tasks: Vec<Task>,
        mut tags: Vec<Tag>,
        task_id: TaskId,
        now: Millis,
    ) -> (Vec<Task>, Vec<Tag>) {
        let Some(idx) = tasks.iter().position(|t| t.id == task_id && t.is_visible()) else {
            tracing::debug!(task_id = task_id.value(), "toggle ignored, task not found");
            return (tasks, tags);
        };
        if tasks[idx].is_running {
            self.stop_task(&mut tasks[idx], &mut tags, now);
        } else {
            self.start_task(&mut tasks[idx], &mut tags, now);
        }
        (tasks, tags)
    }

    /// Replaces a task's tag set.
    ///
    /// On a paused task this is a pure relabeling. On a running task each
    /// removed tag closes its (task, tag) interval exactly as a stop would,
    /// and each added tag opens one at `now`. The task's own session spans
    /// play-to-stop regardless of which tags were attached along the way.
    #[must_use]
    pub fn reassign_task_tags(
        &mut self,
        mut tasks: Vec<Task>,
        mut tags: Vec<Tag>,
        task_id: TaskId,
        new_tag_ids: BTreeSet<TagId>,
        now: Millis,
    ) -> (Vec<Task>, Vec<Tag>) {
        let Some(idx) = tasks.iter().position(|t| t.id == task_id && t.is_visible()) else {
            return (tasks, tags);
        };
        let new_ids: BTreeSet<TagId> = new_tag_ids
            .into_iter()
            .filter(|id| tags.iter().any(|t| t.id == *id && t.is_visible()))
            .collect();
        let task = &mut tasks[idx];
        if task.is_running {
            let fallback = self
                .open_tasks
                .get(&task.id)
                .copied()
                .or(task.last_started_at_ms);
            let removed: Vec<TagId> = task.tag_ids.difference(&new_ids).copied().collect();
            let added: Vec<TagId> = new_ids.difference(&task.tag_ids).copied().collect();
            for tag_id in removed {
                if let Some(tag) = visible_tag_mut(&mut tags, tag_id) {
                    self.close_tag_interval(task.id, &task.name, tag, now, fallback);
                } else {
                    self.open_task_tags.remove(&(task.id, tag_id));
                }
            }
            for tag_id in added {
                if let Some(tag) = visible_tag_mut(&mut tags, tag_id) {
                    self.open_tag_interval(task.id, tag, now);
                }
            }
        }
        task.tag_ids = new_ids;
        (tasks, tags)
    }

    /// Soft-deletes a task, stopping it first if it is running.
    ///
    /// Bookkeeping entries for the task are cleared so the open-interval
    /// maps never leak entries for invisible entities.
    #[must_use]
    pub fn delete_task(
        &mut self,
        mut tasks: Vec<Task>,
        mut tags: Vec<Tag>,
        task_id: TaskId,
        now: Millis,
    ) -> (Vec<Task>, Vec<Tag>) {
        let Some(idx) = tasks.iter().position(|t| t.id == task_id && t.is_visible()) else {
            return (tasks, tags);
        };
        if tasks[idx].is_running {
            self.stop_task(&mut tasks[idx], &mut tags, now);
        }
        let task = &mut tasks[idx];
        task.deleted = true;
        task.deleted_at_ms = Some(now);
        self.open_tasks.remove(&task_id);
        self.open_task_tags.retain(|(tid, _), _| *tid != task_id);
        tracing::debug!(task_id = task_id.value(), "task deleted");
        (tasks, tags)
    }

    /// Soft-deletes a tag.
    ///
    /// Every task holding the tag drops it through the reassignment path, so
    /// open tag intervals close at the deletion timestamp and no task is left
    /// referencing a missing tag. The holders are remembered in
    /// `restore_task_ids` for a later undelete.
    #[must_use]
    pub fn delete_tag(
        &mut self,
        mut tasks: Vec<Task>,
        mut tags: Vec<Tag>,
        tag_id: TagId,
        now: Millis,
    ) -> (Vec<Task>, Vec<Tag>) {
        let Some(tag_idx) = tags.iter().position(|t| t.id == tag_id && t.is_visible()) else {
            return (tasks, tags);
        };
        let mut holders = BTreeSet::new();
        for task in tasks
            .iter_mut()
            .filter(|t| t.is_visible() && t.tag_ids.contains(&tag_id))
        {
            holders.insert(task.id);
            if task.is_running {
                let fallback = self
                    .open_tasks
                    .get(&task.id)
                    .copied()
                    .or(task.last_started_at_ms);
                self.close_tag_interval(task.id, &task.name, &mut tags[tag_idx], now, fallback);
            }
            task.tag_ids.remove(&tag_id);
        }
        let tag = &mut tags[tag_idx];
        tag.restore_task_ids = holders;
        tag.deleted = true;
        tag.deleted_at_ms = Some(now);
        tag.last_started_at_ms = None;
        tracing::debug!(tag_id = tag_id.value(), "tag deleted");
        (tasks, tags)
    }

    /// Restores a soft-deleted tag and its remembered associations.
    ///
    /// Re-adding the tag to a task that is running goes through the same
    /// path as a reassignment add: a (task, tag) interval opens at `now`, so
    /// `active_children` stays consistent. Past intervals are never
    /// resurrected.
    #[must_use]
    pub fn restore_tag(
        &mut self,
        mut tasks: Vec<Task>,
        mut tags: Vec<Tag>,
        tag_id: TagId,
        now: Millis,
    ) -> (Vec<Task>, Vec<Tag>) {
        let Some(tag_idx) = tags.iter().position(|t| t.id == tag_id && t.deleted) else {
            return (tasks, tags);
        };
        tags[tag_idx].deleted = false;
        tags[tag_idx].deleted_at_ms = None;
        let holders = std::mem::take(&mut tags[tag_idx].restore_task_ids);
        for task_id in holders {
            let Some(task) = tasks.iter_mut().find(|t| t.id == task_id && t.is_visible())
            else {
                continue;
            };
            task.tag_ids.insert(tag_id);
            if task.is_running {
                self.open_tag_interval(task.id, &mut tags[tag_idx], now);
            }
        }
        (tasks, tags)
    }

    fn start_task(&mut self, task: &mut Task, tags: &mut [Tag], now: Millis) {
        self.open_tasks.insert(task.id, now);
        task.is_running = true;
        task.last_started_at_ms = Some(now);
        for tag_id in task.tag_ids.iter().copied().collect::<Vec<_>>() {
            if let Some(tag) = visible_tag_mut(tags, tag_id) {
                self.open_tag_interval(task.id, tag, now);
            }
        }
        tracing::debug!(task_id = task.id.value(), now, "task started");
    }

    fn stop_task(&mut self, task: &mut Task, tags: &mut [Tag], now: Millis) {
        // The map entry can be lost across a partial restore; the entity's
        // own timestamp is the fallback. Losing a few seconds of accounting
        // beats failing a running timer.
        let open_start = self
            .open_tasks
            .remove(&task.id)
            .or(task.last_started_at_ms);
        if let Some(start) = open_start {
            let delta = (now - start).max(0);
            task.total_ms += delta;
            if start < now {
                self.task_sessions.push(TaskSession {
                    task_id: task.id,
                    task_name: task.name.clone(),
                    start_ms: start,
                    end_ms: now,
                });
            }
            for tag_id in task.tag_ids.iter().copied().collect::<Vec<_>>() {
                if let Some(tag) = visible_tag_mut(tags, tag_id) {
                    self.close_tag_interval(task.id, &task.name, tag, now, Some(start));
                } else {
                    self.open_task_tags.remove(&(task.id, tag_id));
                }
            }
        }
        task.is_running = false;
        task.last_started_at_ms = None;
        tracing::debug!(task_id = task.id.value(), now, "task stopped");
    }

    /// Opens the (task, tag) interval at `now`. Idempotent: an already open
    /// pairing is left untouched and the child count does not double.
    fn open_tag_interval(&mut self, task_id: TaskId, tag: &mut Tag, now: Millis) {
        if let Entry::Vacant(slot) = self.open_task_tags.entry((task_id, tag.id)) {
            slot.insert(now);
            tag.active_children += 1;
            if tag.last_started_at_ms.is_none() {
                tag.last_started_at_ms = Some(now);
            }
        }
    }

    fn close_tag_interval(
        &mut self,
        task_id: TaskId,
        task_name: &str,
        tag: &mut Tag,
        now: Millis,
        fallback_start: Option<Millis>,
    ) {
        let start = self
            .open_task_tags
            .remove(&(task_id, tag.id))
            .or(fallback_start);
        if let Some(start) = start {
            tag.total_ms += (now - start).max(0);
            if start < now {
                self.tag_sessions.push(TagSession {
                    tag_id: tag.id,
                    tag_name: tag.name.clone(),
                    task_id,
                    task_name: task_name.to_string(),
                    start_ms: start,
                    end_ms: now,
                });
            }
        }
        tag.active_children = tag.active_children.saturating_sub(1);
        if tag.active_children == 0 {
            tag.last_started_at_ms = None;
        }
    }
}

fn visible_tag_mut(tags: &mut [Tag], tag_id: TagId) -> Option<&mut Tag> {
    tags.iter_mut().find(|t| t.id == tag_id && t.is_visible())
}
