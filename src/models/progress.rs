//! Persisted pipeline progress state.
//!
//! One `Progress` document exists per project, stored as JSON at
//! `.work/progress.json`. It is mutated exclusively through the engine's
//! progress store (whole-file read-modify-write, atomic replace). The schema
//! is additive-only across versions: readers tolerate unknown fields, so
//! `deny_unknown_fields` must never be added here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::stage::StageStatus;

/// Per-stage slice of the progress document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageState {
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageState {
    pub fn pending() -> Self {
        Self {
            status: StageStatus::Pending,
            completed_at: None,
        }
    }
}

/// Sub-iteration (sprint) counters for the current stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IterationState {
    pub current_sprint: u32,
    pub total_sprints: u32,
}

impl IterationState {
    pub fn reset(total_sprints: u32) -> Self {
        Self {
            current_sprint: 1,
            total_sprints: total_sprints.max(1),
        }
    }
}

/// Stage range an epic cycle loops over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpicScope {
    pub start_stage: String,
    pub end_stage: String,
}

/// Epic-cycle counters. `current_cycle` is 1-based: it names the pass the
/// pipeline is currently on, so `cycles_remaining` includes the current pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpicCycleState {
    pub enabled: bool,
    #[serde(default = "default_cycle")]
    pub current_cycle: u32,
    #[serde(default)]
    pub total_cycles: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<EpicScope>,
}

fn default_cycle() -> u32 {
    1
}

impl EpicCycleState {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            current_cycle: 1,
            total_cycles: 0,
            scope: None,
        }
    }

    pub fn new(total_cycles: u32, start_stage: String, end_stage: String) -> Self {
        Self {
            enabled: true,
            current_cycle: 1,
            total_cycles,
            scope: Some(EpicScope {
                start_stage,
                end_stage,
            }),
        }
    }

    /// Cycles not yet completed, counting the one in progress.
    pub fn cycles_remaining(&self) -> u32 {
        if !self.enabled {
            return 0;
        }
        self.total_cycles
            .saturating_sub(self.current_cycle)
            .saturating_add(1)
    }

    /// Whether another loop-back is due once the end stage finishes.
    pub fn has_next_cycle(&self) -> bool {
        self.enabled && self.current_cycle < self.total_cycles
    }
}

/// The persisted progress document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub current_stage: String,
    pub stages: BTreeMap<String, StageState>,
    pub current_iteration: IterationState,
    pub epic_cycle: EpicCycleState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Progress {
    /// Build the initial progress document for an ordered stage list.
    ///
    /// The first stage is the current stage and starts pending.
    pub fn for_stages(
        stage_ids: &[String],
        first_total_sprints: u32,
        epic_cycle: EpicCycleState,
    ) -> Self {
        let now = Utc::now();
        let stages = stage_ids
            .iter()
            .map(|id| (id.clone(), StageState::pending()))
            .collect();

        Self {
            current_stage: stage_ids.first().cloned().unwrap_or_default(),
            stages,
            current_iteration: IterationState::reset(first_total_sprints),
            epic_cycle,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage_status(&self, stage_id: &str) -> Option<StageStatus> {
        self.stages.get(stage_id).map(|s| s.status)
    }

    /// Forward-path status change, validated against the state machine.
    pub fn transition_stage(&mut self, stage_id: &str, new_status: StageStatus) -> anyhow::Result<()> {
        let state = self
            .stages
            .get_mut(stage_id)
            .ok_or_else(|| anyhow::anyhow!("Unknown stage in progress state: {stage_id}"))?;
        state.status = state.status.try_transition(new_status)?;
        if new_status == StageStatus::Completed {
            state.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Corrective status reset, bypassing the forward state machine.
    /// Used only by loop-backs (goto, epic cycle) and forced overrides.
    pub fn reset_stage(&mut self, stage_id: &str, status: StageStatus) {
        if let Some(state) = self.stages.get_mut(stage_id) {
            state.status = status;
            state.completed_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_initial_progress() {
        let progress = Progress::for_stages(
            &ids(&["01-planning", "02-design"]),
            1,
            EpicCycleState::disabled(),
        );
        assert_eq!(progress.current_stage, "01-planning");
        assert_eq!(
            progress.stage_status("01-planning"),
            Some(StageStatus::Pending)
        );
        assert_eq!(progress.current_iteration.current_sprint, 1);
        assert!(!progress.epic_cycle.enabled);
    }

    #[test]
    fn test_transition_validates() {
        let mut progress =
            Progress::for_stages(&ids(&["01-planning"]), 1, EpicCycleState::disabled());
        // pending -> completed is not a legal forward transition
        assert!(progress
            .transition_stage("01-planning", StageStatus::Completed)
            .is_err());
        progress
            .transition_stage("01-planning", StageStatus::InProgress)
            .unwrap();
        progress
            .transition_stage("01-planning", StageStatus::Completed)
            .unwrap();
        assert!(progress.stages["01-planning"].completed_at.is_some());
    }

    #[test]
    fn test_reset_clears_completion() {
        let mut progress =
            Progress::for_stages(&ids(&["01-planning"]), 1, EpicCycleState::disabled());
        progress
            .transition_stage("01-planning", StageStatus::InProgress)
            .unwrap();
        progress
            .transition_stage("01-planning", StageStatus::Completed)
            .unwrap();
        progress.reset_stage("01-planning", StageStatus::Pending);
        assert_eq!(
            progress.stage_status("01-planning"),
            Some(StageStatus::Pending)
        );
        assert!(progress.stages["01-planning"].completed_at.is_none());
    }

    #[test]
    fn test_cycles_remaining() {
        let mut epic = EpicCycleState::new(2, "a".into(), "c".into());
        assert_eq!(epic.cycles_remaining(), 2);
        assert!(epic.has_next_cycle());
        epic.current_cycle = 2;
        assert_eq!(epic.cycles_remaining(), 1);
        assert!(!epic.has_next_cycle());
    }

    #[test]
    fn test_readers_tolerate_unknown_fields() {
        // Additive-only schema: a document written by a newer version must
        // still load.
        let json = r#"{
            "current_stage": "01-planning",
            "stages": {"01-planning": {"status": "pending", "future_field": 7}},
            "current_iteration": {"current_sprint": 1, "total_sprints": 1},
            "epic_cycle": {"enabled": false},
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
            "new_top_level": {"nested": true}
        }"#;
        let progress: Progress = serde_json::from_str(json).unwrap();
        assert_eq!(progress.current_stage, "01-planning");
        assert_eq!(progress.epic_cycle.current_cycle, 1);
    }
}
