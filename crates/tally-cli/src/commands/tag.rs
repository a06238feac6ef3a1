//! Tag subcommands.

use std::io::Write;

use anyhow::{Result, bail};

use tally_core::{Millis, TagId, Workspace};

use super::format_duration;

/// Creates a tag.
pub fn add(workspace: &mut Workspace, name: &str) -> Result<TagId> {
    Ok(workspace.create_tag(name)?)
}

/// Soft-deletes a tag, detaching it from every task first.
pub fn rm(workspace: &mut Workspace, id: u64, now: Millis) -> Result<()> {
    let tag_id = TagId::new(id);
    if !workspace
        .tags
        .iter()
        .any(|t| t.id == tag_id && t.is_visible())
    {
        bail!("no such tag: {id}");
    }
    workspace.delete_tag(tag_id, now);
    Ok(())
}

/// Undeletes a tag, restoring its remembered associations.
pub fn restore(workspace: &mut Workspace, id: u64, now: Millis) -> Result<()> {
    let tag_id = TagId::new(id);
    if !workspace.tags.iter().any(|t| t.id == tag_id && t.deleted) {
        bail!("no deleted tag with id {id}");
    }
    workspace.restore_tag(tag_id, now);
    Ok(())
}

/// Permanently removes a tag and every session referencing it.
pub fn purge(workspace: &mut Workspace, id: u64) -> Result<()> {
    let tag_id = TagId::new(id);
    if !workspace.tags.iter().any(|t| t.id == tag_id) {
        bail!("no such tag: {id}");
    }
    let mut snapshot = workspace.to_snapshot();
    tally_store::purge_tag(&mut snapshot, tag_id);
    *workspace = Workspace::from_snapshot(snapshot);
    Ok(())
}

/// Lists tags with live elapsed time.
pub fn list<W: Write>(
    writer: &mut W,
    workspace: &Workspace,
    include_deleted: bool,
    now: Millis,
) -> Result<()> {
    let mut shown = 0;
    for tag in &workspace.tags {
        if tag.deleted && !include_deleted {
            continue;
        }
        shown += 1;
        let elapsed = workspace.engine.live_tag_ms(tag, now);
        let mut line = format!("[{}] {}  {}", tag.id, tag.name, format_duration(elapsed));
        if tag.active_children > 0 {
            line.push_str(&format!("  ({} active)", tag.active_children));
        }
        if tag.deleted {
            line.push_str("  (deleted)");
        }
        writeln!(writer, "{line}")?;
    }
    if shown == 0 {
        writeln!(writer, "No tags.")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::task;

    #[test]
    fn rm_detaches_from_running_task_and_restore_reattaches() {
        let mut ws = Workspace::default();
        add(&mut ws, "work").unwrap();
        task::add(&mut ws, "write", None, &[1]).unwrap();
        task::toggle(&mut ws, 1, 0).unwrap();

        rm(&mut ws, 1, 60).unwrap();
        assert!(ws.tasks[0].tag_ids.is_empty());
        assert!(ws.tasks[0].is_running);
        assert_eq!(ws.tags[0].total_ms, 60);

        restore(&mut ws, 1, 90).unwrap();
        assert!(ws.tasks[0].tag_ids.contains(&TagId::new(1)));
        assert_eq!(ws.tags[0].active_children, 1);
    }

    #[test]
    fn list_shows_live_time_for_active_tags() {
        let mut ws = Workspace::default();
        add(&mut ws, "work").unwrap();
        task::add(&mut ws, "write", None, &[1]).unwrap();
        task::toggle(&mut ws, 1, 0).unwrap();

        let mut out = Vec::new();
        list(&mut out, &ws, false, 30_000).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "[1] work  30s  (1 active)\n");
    }

    #[test]
    fn purge_requires_an_existing_tag() {
        let mut ws = Workspace::default();
        assert!(purge(&mut ws, 4).is_err());
    }
}
