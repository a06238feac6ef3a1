//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Task and tag time tracker.
///
/// Tracks elapsed time per task, accounts it transitively to the task's
/// tags, and keeps running timers alive across process restarts.
#[derive(Debug, Parser)]
#[command(name = "tally", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage tasks.
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Manage tags.
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },

    /// Show all tasks and tags with live elapsed time.
    Status,

    /// Write the backup file set to a folder.
    Export {
        /// Target folder; created if missing.
        #[arg(long)]
        dir: PathBuf,
    },

    /// Rebuild state from a backup file set.
    Import {
        /// Well-known backup folder.
        #[arg(long, conflicts_with = "files")]
        dir: Option<PathBuf>,

        /// Individual backup files, matched by filename.
        files: Vec<PathBuf>,
    },
}

/// Task operations.
#[derive(Debug, Subcommand)]
pub enum TaskAction {
    /// Create a task.
    Add {
        name: String,

        /// Free-text URI to attach.
        #[arg(long)]
        link: Option<String>,

        /// Tag ids to attach (repeatable).
        #[arg(long = "tag")]
        tags: Vec<u64>,
    },

    /// Start the task if paused, stop it if running.
    Toggle { id: u64 },

    /// Replace the task's tag set.
    Tags {
        id: u64,

        /// The new tag ids (repeatable; empty clears all tags).
        #[arg(long = "set")]
        set: Vec<u64>,
    },

    /// Soft-delete a task (stops it first).
    Rm { id: u64 },

    /// Undelete a task.
    Restore { id: u64 },

    /// Permanently remove a task and all of its sessions.
    Purge { id: u64 },

    /// List tasks.
    List {
        /// Include soft-deleted tasks.
        #[arg(long)]
        all: bool,
    },
}

/// Tag operations.
#[derive(Debug, Subcommand)]
pub enum TagAction {
    /// Create a tag.
    Add { name: String },

    /// Soft-delete a tag, detaching it from every task.
    Rm { id: u64 },

    /// Undelete a tag and restore its associations.
    Restore { id: u64 },

    /// Permanently remove a tag and all of its sessions.
    Purge { id: u64 },

    /// List tags.
    List {
        /// Include soft-deleted tags.
        #[arg(long)]
        all: bool,
    },
}
