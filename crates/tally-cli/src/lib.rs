//! tally CLI library.
//!
//! This crate provides the CLI interface for the task/tag time tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, TagAction, TaskAction};
pub use config::Config;
