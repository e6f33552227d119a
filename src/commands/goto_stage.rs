//! Corrective loop-back to an arbitrary stage.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::engine::PipelineEngine;

pub fn execute(project_root: &Path, stage_id: &str, reason: &str) -> Result<()> {
    let engine = PipelineEngine::open(project_root)?;
    let from = engine.progress()?.current_stage;
    engine.goto_stage(stage_id, reason)?;
    println!(
        "{} Looped back: {} -> {} ({})",
        "→".yellow().bold(),
        from,
        stage_id,
        reason
    );
    Ok(())
}
