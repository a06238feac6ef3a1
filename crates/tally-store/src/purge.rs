//! Hard purge of entities and their sessions.
//!
//! Soft deletion lives in the engine; purging is a store-level operation
//! that permanently removes an entity and every session referencing it from
//! a snapshot document. There is no undo.

use tally_core::{Snapshot, TagId, TaskId};

/// Removes a task, its sessions, and its open-interval entries.
pub fn purge_task(snapshot: &mut Snapshot, task_id: TaskId) {
    snapshot.tasks.retain(|t| t.id != task_id);
    snapshot.task_sessions.retain(|s| s.task_id != task_id);
    snapshot.tag_sessions.retain(|s| s.task_id != task_id);
    snapshot.active_task_start.retain(|e| e.task_id != task_id);
    snapshot.active_tag_start.retain(|e| e.task_id != task_id);
    for tag in &mut snapshot.tags {
        tag.restore_task_ids.remove(&task_id);
    }
    tracing::debug!(task_id = task_id.value(), "task purged");
}

/// Removes a tag, its sessions, and every reference to it.
pub fn purge_tag(snapshot: &mut Snapshot, tag_id: TagId) {
    snapshot.tags.retain(|t| t.id != tag_id);
    snapshot.tag_sessions.retain(|s| s.tag_id != tag_id);
    snapshot.active_tag_start.retain(|e| e.tag_id != tag_id);
    for task in &mut snapshot.tasks {
        task.tag_ids.remove(&tag_id);
    }
    tracing::debug!(tag_id = tag_id.value(), "tag purged");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tally_core::Workspace;

    fn snapshot_with_history() -> Snapshot {
        let mut ws = Workspace::default();
        let tag = ws.engine.create_tag("work").unwrap();
        ws.tags = vec![tag];
        let ids: BTreeSet<TagId> = [TagId::new(1)].into();
        let t1 = ws.engine.create_task("one", None, &ids, &ws.tags).unwrap();
        let t2 = ws.engine.create_task("two", None, &ids, &ws.tags).unwrap();
        ws.tasks = vec![t1, t2];
        ws.toggle_task(TaskId::new(1), 0);
        ws.toggle_task(TaskId::new(1), 50);
        ws.toggle_task(TaskId::new(2), 60);
        ws.to_snapshot()
    }

    #[test]
    fn purge_task_drops_entity_sessions_and_bookkeeping() {
        let mut snapshot = snapshot_with_history();
        purge_task(&mut snapshot, TaskId::new(1));
        assert!(snapshot.tasks.iter().all(|t| t.id != TaskId::new(1)));
        assert!(snapshot.task_sessions.is_empty());
        assert!(snapshot.tag_sessions.is_empty());
        // Task 2 is still running and untouched.
        assert_eq!(snapshot.active_task_start.len(), 1);
        assert_eq!(snapshot.active_task_start[0].task_id, TaskId::new(2));
    }

    #[test]
    fn purge_does_not_recycle_ids() {
        let mut snapshot = snapshot_with_history();
        purge_task(&mut snapshot, TaskId::new(2));
        let mut ws = Workspace::from_snapshot(snapshot);
        let id = ws.create_task("fresh", None, &BTreeSet::new()).unwrap();
        assert_eq!(id, TaskId::new(3));
    }

    #[test]
    fn purge_tag_drops_references_from_tasks() {
        let mut snapshot = snapshot_with_history();
        purge_tag(&mut snapshot, TagId::new(1));
        assert!(snapshot.tags.is_empty());
        assert!(snapshot.tag_sessions.is_empty());
        assert!(snapshot.active_tag_start.is_empty());
        assert!(snapshot.tasks.iter().all(|t| t.tag_ids.is_empty()));
        // Task-level history is not the tag's to take.
        assert_eq!(snapshot.task_sessions.len(), 1);
    }
}
