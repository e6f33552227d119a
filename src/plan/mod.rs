pub mod schema;
pub mod validation;

pub use schema::{EpicCycleSpec, Plan, StageSpec};
pub use validation::validate_plan;

use anyhow::{Context, Result};
use std::path::Path;

/// Load and validate a plan document from disk.
pub fn load_plan(path: &Path) -> Result<Plan> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan file: {}", path.display()))?;
    let plan: Plan = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse plan file: {}", path.display()))?;
    validate_plan(&plan)?;
    Ok(plan)
}
