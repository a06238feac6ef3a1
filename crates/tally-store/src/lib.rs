//! Storage layer for tally.
//!
//! Persists the workspace snapshot as a durable JSON document, writes and
//! reads the flat backup file set (CSV session ledgers, derived totals,
//! entity dictionary, manifest), and debounces durable writes behind rapid
//! mutations.

pub mod csv;
pub mod export;
pub mod import;
pub mod persist;
pub mod purge;
pub mod snapshot_file;

pub use export::{ExportError, Manifest, ManifestFile, write_backup};
pub use import::{ImportError, import_dir, import_documents, import_files};
pub use persist::Persister;
pub use purge::{purge_tag, purge_task};
pub use snapshot_file::{SnapshotFileError, load_snapshot, save_snapshot};
