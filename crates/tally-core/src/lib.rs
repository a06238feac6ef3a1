//! Core domain logic for tally.
//!
//! This crate contains the fundamental types and logic for:
//! - Interval accounting: opening/closing timed intervals for tasks and tags
//! - Reconciliation: rebuilding a consistent snapshot from external sources
//! - Snapshot state: the serializable picture that survives process death

pub mod engine;
pub mod model;
pub mod reconcile;
pub mod snapshot;

pub use engine::{Engine, display_ms, restore_task};
pub use model::{
    Millis, Tag, TagId, TagSession, Task, TaskId, TaskSession, ValidationError,
};
pub use reconcile::{DictTag, DictTask, EntityDict, ReconcileError};
pub use snapshot::{ActiveTagStart, ActiveTaskStart, Snapshot, Workspace};
