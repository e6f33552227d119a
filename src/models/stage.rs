use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Immutable identity of a pipeline stage.
///
/// Ordinals are assigned from the stage's position in the plan and are
/// contiguous and unique; the total ordering is fixed at plan load time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    pub ordinal: usize,
    pub id: String,
    pub name: String,
}

impl Stage {
    pub fn new(ordinal: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ordinal,
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Status of a stage in the pipeline lifecycle.
///
/// State machine transitions:
/// - `Pending` -> `InProgress` (when the stage starts)
/// - `InProgress` -> `Completed` | `Skipped` | `Blocked`
/// - `Blocked` -> `InProgress` | `Pending` (manual override or corrective loop-back)
/// - `Completed` and `Skipped` are terminal for forward flow; only a
///   corrective loop-back (goto / epic cycle reset) revisits them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not been started yet.
    Pending,

    /// Stage is actively being worked on.
    InProgress,

    /// Stage work is done and its gate was satisfied.
    Completed,

    /// Stage was explicitly skipped.
    Skipped,

    /// Stage failed a blocking quality check and cannot advance.
    /// Terminal until manually overridden.
    Blocked,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "pending"),
            StageStatus::InProgress => write!(f, "in_progress"),
            StageStatus::Completed => write!(f, "completed"),
            StageStatus::Skipped => write!(f, "skipped"),
            StageStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl StageStatus {
    /// Check if transitioning from the current status to the new status is valid.
    ///
    /// Corrective loop-backs (goto, epic cycle resets) deliberately bypass
    /// this check; everything on the forward path goes through it.
    pub fn can_transition_to(&self, new_status: &StageStatus) -> bool {
        // Same status is always valid (no-op)
        if self == new_status {
            return true;
        }

        match self {
            StageStatus::Pending => {
                matches!(new_status, StageStatus::InProgress | StageStatus::Skipped)
            }
            StageStatus::InProgress => matches!(
                new_status,
                StageStatus::Completed | StageStatus::Skipped | StageStatus::Blocked
            ),
            StageStatus::Blocked => {
                matches!(new_status, StageStatus::InProgress | StageStatus::Pending)
            }
            // Terminal states
            StageStatus::Completed => false,
            StageStatus::Skipped => false,
        }
    }

    /// Attempt to transition to a new status, returning an error if invalid.
    pub fn try_transition(&self, new_status: StageStatus) -> Result<StageStatus> {
        if self.can_transition_to(&new_status) {
            Ok(new_status)
        } else {
            bail!("Invalid stage status transition: {self} -> {new_status}")
        }
    }

    /// Returns the list of valid statuses this status can transition to.
    pub fn valid_transitions(&self) -> Vec<StageStatus> {
        match self {
            StageStatus::Pending => vec![StageStatus::InProgress, StageStatus::Skipped],
            StageStatus::InProgress => vec![
                StageStatus::Completed,
                StageStatus::Skipped,
                StageStatus::Blocked,
            ],
            StageStatus::Blocked => vec![StageStatus::InProgress, StageStatus::Pending],
            StageStatus::Completed => vec![],
            StageStatus::Skipped => vec![],
        }
    }

    /// Whether this status ends the stage's forward lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Skipped)
    }
}
