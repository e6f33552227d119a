//! Pipeline plan schema.
//!
//! The plan is a read-only YAML document describing the ordered stage list,
//! per-stage quality checks, the producer preference order, and an optional
//! epic cycle over a stage range.

use serde::{Deserialize, Serialize};

use crate::gate::config::QualityCheck;
use crate::models::stage::Stage;
use crate::producer::types::ProducerSpec;

fn default_sprints() -> u32 {
    1
}

/// A single stage definition in the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    pub id: String,
    pub name: String,

    /// Instructions handed to the producer for this stage. Opaque to the
    /// core; only the gate's structural checks interpret the results.
    #[serde(default)]
    pub instructions: String,

    /// Number of sub-iterations (sprints) this stage runs before advancing.
    #[serde(default = "default_sprints")]
    pub sprints: u32,

    /// Handoff artifact the stage must produce before the pipeline advances.
    /// Also fed to the next stage's producer as prior context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<String>,

    /// Project-relative files whose contents are included as reference text
    /// in the producer prompt.
    #[serde(default)]
    pub reference: Vec<String>,

    #[serde(default)]
    pub checks: Vec<QualityCheck>,
}

/// Epic cycle configuration: repeat the `[start_stage ..= end_stage]` range
/// `total_cycles` times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpicCycleSpec {
    pub total_cycles: u32,
    pub start_stage: String,
    pub end_stage: String,
}

/// The full pipeline plan document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,

    /// Producers in strict preference order.
    #[serde(default)]
    pub producers: Vec<ProducerSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_cycle: Option<EpicCycleSpec>,

    pub stages: Vec<StageSpec>,
}

impl Plan {
    pub fn stage(&self, stage_id: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Position of a stage in the fixed ordering.
    pub fn ordinal_of(&self, stage_id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id == stage_id)
    }

    pub fn stage_at(&self, ordinal: usize) -> Option<&StageSpec> {
        self.stages.get(ordinal)
    }

    pub fn stage_ids(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.id.clone()).collect()
    }

    /// Stage identity (ordinal, id, name) for a stage spec.
    pub fn identity(&self, stage_id: &str) -> Option<Stage> {
        let ordinal = self.ordinal_of(stage_id)?;
        let spec = &self.stages[ordinal];
        Some(Stage::new(ordinal, spec.id.clone(), spec.name.clone()))
    }

    /// Stage identities in pipeline order.
    pub fn stage_identities(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .enumerate()
            .map(|(ordinal, spec)| Stage::new(ordinal, spec.id.clone(), spec.name.clone()))
            .collect()
    }

    /// The stage after `stage_id` in the fixed ordering, if any.
    pub fn next_stage(&self, stage_id: &str) -> Option<&StageSpec> {
        let ordinal = self.ordinal_of(stage_id)?;
        self.stage_at(ordinal + 1)
    }

    /// The stage before `stage_id` in the fixed ordering, if any.
    pub fn prev_stage(&self, stage_id: &str) -> Option<&StageSpec> {
        let ordinal = self.ordinal_of(stage_id)?;
        ordinal.checked_sub(1).and_then(|o| self.stage_at(o))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN_YAML: &str = r#"
name: demo
producers:
  - id: primary
    bin: primary-cli
    args: ["-p"]
epic_cycle:
  total_cycles: 2
  start_stage: 01-planning
  end_stage: 02-design
stages:
  - id: 01-planning
    name: Planning
    instructions: plan it
    handoff: handoff.md
    checks:
      - name: architecture-doc
        severity: blocking
        type: file_exists
        files: [architecture.md]
  - id: 02-design
    name: Design
    sprints: 3
"#;

    #[test]
    fn test_parse_plan() {
        let plan: Plan = serde_yaml::from_str(PLAN_YAML).unwrap();
        assert_eq!(plan.stages.len(), 2);
        assert_eq!(plan.producers[0].id, "primary");
        assert_eq!(plan.stages[0].sprints, 1);
        assert_eq!(plan.stages[1].sprints, 3);
        assert_eq!(plan.epic_cycle.as_ref().unwrap().total_cycles, 2);
    }

    #[test]
    fn test_ordering_helpers() {
        let plan: Plan = serde_yaml::from_str(PLAN_YAML).unwrap();
        assert_eq!(plan.ordinal_of("01-planning"), Some(0));
        assert_eq!(plan.next_stage("01-planning").unwrap().id, "02-design");
        assert!(plan.next_stage("02-design").is_none());
        assert_eq!(plan.prev_stage("02-design").unwrap().id, "01-planning");
        assert!(plan.prev_stage("01-planning").is_none());

        let identity = plan.identity("02-design").unwrap();
        assert_eq!(identity.ordinal, 1);
        assert_eq!(identity.name, "Design");
    }
}
