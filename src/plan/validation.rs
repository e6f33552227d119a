//! Structural validation of a loaded plan.
//!
//! Runs once at load time so the rest of the core can assume a well-formed
//! ordering: contiguous unique ordinals, resolvable epic scope, sane
//! counters.

use anyhow::{bail, Result};
use std::collections::HashSet;

use super::schema::Plan;
use crate::validation::validate_id;

pub fn validate_plan(plan: &Plan) -> Result<()> {
    if plan.stages.is_empty() {
        bail!("Plan '{}' defines no stages", plan.name);
    }

    let mut seen = HashSet::new();
    for stage in &plan.stages {
        validate_id(&stage.id)?;
        if !seen.insert(stage.id.as_str()) {
            bail!("Duplicate stage id in plan: {}", stage.id);
        }
        if stage.sprints == 0 {
            bail!("Stage '{}' has sprints = 0 (minimum is 1)", stage.id);
        }
        for check in &stage.checks {
            if check.name.trim().is_empty() {
                bail!("Stage '{}' has a quality check without a name", stage.id);
            }
        }
    }

    let mut producer_ids = HashSet::new();
    for producer in &plan.producers {
        validate_id(&producer.id)?;
        if !producer_ids.insert(producer.id.as_str()) {
            bail!("Duplicate producer id in plan: {}", producer.id);
        }
        if producer.bin.trim().is_empty() {
            bail!("Producer '{}' has an empty binary name", producer.id);
        }
    }

    if let Some(epic) = &plan.epic_cycle {
        if epic.total_cycles == 0 {
            bail!("Epic cycle has total_cycles = 0 (minimum is 1)");
        }
        let start = plan
            .ordinal_of(&epic.start_stage)
            .ok_or_else(|| anyhow::anyhow!("Epic cycle start stage not in plan: {}", epic.start_stage))?;
        let end = plan
            .ordinal_of(&epic.end_stage)
            .ok_or_else(|| anyhow::anyhow!("Epic cycle end stage not in plan: {}", epic.end_stage))?;
        if start > end {
            bail!(
                "Epic cycle scope is inverted: '{}' comes after '{}'",
                epic.start_stage,
                epic.end_stage
            );
        }
    }

    Ok(())
}
