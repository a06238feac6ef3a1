//! Task subcommands.

use std::collections::BTreeSet;
use std::io::Write;

use anyhow::{Result, bail};

use tally_core::{Millis, TagId, TaskId, Workspace, display_ms};

use super::format_duration;

/// Creates a task. Tag ids must name existing, visible tags.
pub fn add(
    workspace: &mut Workspace,
    name: &str,
    link: Option<String>,
    tag_ids: &[u64],
) -> Result<TaskId> {
    let set = resolve_tag_ids(workspace, tag_ids)?;
    Ok(workspace.create_task(name, link, &set)?)
}

/// Starts a paused task or stops a running one.
///
/// Returns `true` when the task is running afterwards.
pub fn toggle(workspace: &mut Workspace, id: u64, now: Millis) -> Result<bool> {
    let task_id = find_visible(workspace, id)?;
    let was_running = workspace
        .tasks
        .iter()
        .find(|t| t.id == task_id)
        .is_some_and(|t| t.is_running);
    workspace.toggle_task(task_id, now);
    Ok(!was_running)
}

/// Replaces the task's tag set.
pub fn set_tags(workspace: &mut Workspace, id: u64, tag_ids: &[u64], now: Millis) -> Result<()> {
    let task_id = find_visible(workspace, id)?;
    let set = resolve_tag_ids(workspace, tag_ids)?;
    workspace.reassign_task_tags(task_id, set, now);
    Ok(())
}

/// Soft-deletes a task, stopping it first if it is running.
pub fn rm(workspace: &mut Workspace, id: u64, now: Millis) -> Result<()> {
    let task_id = find_visible(workspace, id)?;
    workspace.delete_task(task_id, now);
    Ok(())
}

/// Undeletes a task.
pub fn restore(workspace: &mut Workspace, id: u64) -> Result<()> {
    let task_id = TaskId::new(id);
    if !workspace
        .tasks
        .iter()
        .any(|t| t.id == task_id && t.deleted)
    {
        bail!("no deleted task with id {id}");
    }
    workspace.restore_task(task_id);
    Ok(())
}

/// Permanently removes a task and every session referencing it.
pub fn purge(workspace: &mut Workspace, id: u64) -> Result<()> {
    let task_id = TaskId::new(id);
    if !workspace.tasks.iter().any(|t| t.id == task_id) {
        bail!("no such task: {id}");
    }
    let mut snapshot = workspace.to_snapshot();
    tally_store::purge_task(&mut snapshot, task_id);
    *workspace = Workspace::from_snapshot(snapshot);
    Ok(())
}

/// Lists tasks with live elapsed time.
pub fn list<W: Write>(
    writer: &mut W,
    workspace: &Workspace,
    include_deleted: bool,
    now: Millis,
) -> Result<()> {
    let mut shown = 0;
    for task in &workspace.tasks {
        if task.deleted && !include_deleted {
            continue;
        }
        shown += 1;
        let elapsed = display_ms(task.total_ms, task.last_started_at_ms, now);
        let tag_names: Vec<&str> = task
            .tag_ids
            .iter()
            .filter_map(|id| workspace.tags.iter().find(|t| t.id == *id))
            .map(|t| t.name.as_str())
            .collect();
        let mut line = format!("[{}] {}  {}", task.id, task.name, format_duration(elapsed));
        if !tag_names.is_empty() {
            line.push_str(&format!("  tags: {}", tag_names.join(", ")));
        }
        if task.is_running {
            line.push_str("  (running)");
        }
        if task.deleted {
            line.push_str("  (deleted)");
        }
        writeln!(writer, "{line}")?;
    }
    if shown == 0 {
        writeln!(writer, "No tasks.")?;
    }
    Ok(())
}

fn find_visible(workspace: &Workspace, id: u64) -> Result<TaskId> {
    let task_id = TaskId::new(id);
    if !workspace
        .tasks
        .iter()
        .any(|t| t.id == task_id && t.is_visible())
    {
        bail!("no such task: {id}");
    }
    Ok(task_id)
}

fn resolve_tag_ids(workspace: &Workspace, ids: &[u64]) -> Result<BTreeSet<TagId>> {
    let mut set = BTreeSet::new();
    for id in ids {
        let tag_id = TagId::new(*id);
        if !workspace
            .tags
            .iter()
            .any(|t| t.id == tag_id && t.is_visible())
        {
            bail!("no such tag: {id}");
        }
        set.insert(tag_id);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_with_tag() -> Workspace {
        let mut ws = Workspace::default();
        ws.create_tag("work").unwrap();
        ws
    }

    #[test]
    fn add_rejects_unknown_tags() {
        let mut ws = workspace_with_tag();
        let err = add(&mut ws, "write", None, &[7]).unwrap_err();
        assert!(err.to_string().contains("no such tag: 7"));
        assert!(ws.tasks.is_empty());
    }

    #[test]
    fn toggle_reports_direction() {
        let mut ws = workspace_with_tag();
        add(&mut ws, "write", None, &[1]).unwrap();
        assert!(toggle(&mut ws, 1, 100).unwrap());
        assert!(!toggle(&mut ws, 1, 200).unwrap());
        assert_eq!(ws.tasks[0].total_ms, 100);
    }

    #[test]
    fn toggle_unknown_task_errors_without_state_change() {
        let mut ws = workspace_with_tag();
        assert!(toggle(&mut ws, 9, 100).is_err());
        assert!(ws.engine.task_sessions().is_empty());
    }

    #[test]
    fn rm_then_restore_round_trips_visibility() {
        let mut ws = workspace_with_tag();
        add(&mut ws, "write", None, &[]).unwrap();
        rm(&mut ws, 1, 50).unwrap();
        assert!(!ws.tasks[0].is_visible());
        restore(&mut ws, 1).unwrap();
        assert!(ws.tasks[0].is_visible());
    }

    #[test]
    fn restore_requires_a_deleted_task() {
        let mut ws = workspace_with_tag();
        add(&mut ws, "write", None, &[]).unwrap();
        assert!(restore(&mut ws, 1).is_err());
    }

    #[test]
    fn purge_removes_history() {
        let mut ws = workspace_with_tag();
        add(&mut ws, "write", None, &[1]).unwrap();
        toggle(&mut ws, 1, 0).unwrap();
        toggle(&mut ws, 1, 100).unwrap();
        purge(&mut ws, 1).unwrap();
        assert!(ws.tasks.is_empty());
        assert!(ws.engine.task_sessions().is_empty());
        assert!(ws.engine.tag_sessions().is_empty());
    }

    #[test]
    fn list_hides_deleted_by_default() {
        let mut ws = workspace_with_tag();
        add(&mut ws, "keep", None, &[1]).unwrap();
        add(&mut ws, "drop", None, &[]).unwrap();
        rm(&mut ws, 2, 10).unwrap();

        let mut out = Vec::new();
        list(&mut out, &ws, false, 20).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("keep"));
        assert!(!out.contains("drop"));

        let mut all = Vec::new();
        list(&mut all, &ws, true, 20).unwrap();
        let all = String::from_utf8(all).unwrap();
        assert!(all.contains("drop"));
        assert!(all.contains("(deleted)"));
    }
}
