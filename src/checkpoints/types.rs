//! Checkpoint metadata types.
//!
//! A checkpoint is one directory under `.work/checkpoints/<id>/` holding
//! copied artifact trees plus a `metadata.json` written last, so the
//! presence of metadata implies a complete checkpoint. Checkpoints are
//! immutable once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a checkpoint exists. Milestone checkpoints (stage completion,
/// pre-destructive operations) are exempt from automatic cleanup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointKind {
    Manual,
    Milestone,
}

impl std::fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointKind::Manual => write!(f, "manual"),
            CheckpointKind::Milestone => write!(f, "milestone"),
        }
    }
}

/// Which artifact sets a checkpoint captures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncludeSet {
    pub stage_outputs: bool,
    pub state: bool,
    pub config: bool,
}

impl Default for IncludeSet {
    fn default() -> Self {
        Self {
            stage_outputs: true,
            state: true,
            config: true,
        }
    }
}

/// Checkpoint metadata, stored as `metadata.json` inside the checkpoint
/// directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub id: String,
    pub stage_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: CheckpointKind,
    #[serde(default)]
    pub include: IncludeSet,
    /// Checkpoint-relative paths of every captured file.
    pub manifest: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl CheckpointMeta {
    pub fn is_milestone(&self) -> bool {
        self.kind == CheckpointKind::Milestone
    }
}
