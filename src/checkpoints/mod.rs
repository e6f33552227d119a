//! Checkpoint/Restore subsystem.
//!
//! Snapshots pipeline state (progress, stage outputs, config) into isolated
//! per-id directories and rolls them back on demand, with a retention policy
//! that never touches milestone checkpoints.

pub mod store;
pub mod types;

pub use store::{CheckpointStore, RestoreMode};
pub use types::{CheckpointKind, CheckpointMeta, IncludeSet};
