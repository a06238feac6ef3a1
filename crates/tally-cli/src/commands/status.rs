//! Status command: all visible tasks and tags with live elapsed time.

use std::io::Write;

use anyhow::Result;

use tally_core::{Millis, Workspace, display_ms};

use super::format_duration;

pub fn run<W: Write>(writer: &mut W, workspace: &Workspace, now: Millis) -> Result<()> {
    writeln!(writer, "Tasks:")?;
    let tasks: Vec<_> = workspace.tasks.iter().filter(|t| t.is_visible()).collect();
    if tasks.is_empty() {
        writeln!(writer, "  (none)")?;
    }
    for task in tasks {
        let elapsed = display_ms(task.total_ms, task.last_started_at_ms, now);
        let marker = if task.is_running { "  (running)" } else { "" };
        writeln!(
            writer,
            "  [{}] {}  {}{marker}",
            task.id,
            task.name,
            format_duration(elapsed)
        )?;
    }

    writeln!(writer, "Tags:")?;
    let tags: Vec<_> = workspace.tags.iter().filter(|t| t.is_visible()).collect();
    if tags.is_empty() {
        writeln!(writer, "  (none)")?;
    }
    for tag in tags {
        let elapsed = workspace.engine.live_tag_ms(tag, now);
        let marker = if tag.active_children > 0 {
            format!("  ({} active)", tag.active_children)
        } else {
            String::new()
        };
        writeln!(
            writer,
            "  [{}] {}  {}{marker}",
            tag.id,
            tag.name,
            format_duration(elapsed)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{tag, task};

    use insta::assert_snapshot;

    #[test]
    fn status_shows_live_elapsed_time() {
        let mut ws = Workspace::default();
        tag::add(&mut ws, "work").unwrap();
        tag::add(&mut ws, "deep").unwrap();
        task::add(&mut ws, "write spec", None, &[1, 2]).unwrap();
        task::add(&mut ws, "review", None, &[1]).unwrap();

        // "review" ran 0..45s; "write spec" has been running since t=60s.
        task::toggle(&mut ws, 2, 0).unwrap();
        task::toggle(&mut ws, 2, 45_000).unwrap();
        task::toggle(&mut ws, 1, 60_000).unwrap();

        let mut output = Vec::new();
        run(&mut output, &ws, 160_000).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Tasks:
          [1] write spec  1m 40s  (running)
          [2] review  45s
        Tags:
          [1] work  2m 25s  (1 active)
          [2] deep  1m 40s  (1 active)
        ");
    }

    #[test]
    fn status_with_empty_workspace() {
        let ws = Workspace::default();
        let mut output = Vec::new();
        run(&mut output, &ws, 0).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Tasks:
          (none)
        Tags:
          (none)
        ");
    }
}
