//! Advance the pipeline to the next stage.

use anyhow::{bail, Result};
use colored::Colorize;
use std::path::Path;

use crate::engine::PipelineEngine;
use crate::models::PipelineError;

pub fn execute(
    project_root: &Path,
    force: bool,
    skip_gate_check: bool,
    reason: Option<String>,
) -> Result<()> {
    let engine = PipelineEngine::open(project_root)?;

    // Iterative stages consume their sprints before the pipeline moves on;
    // force skips straight to the advance.
    if !force {
        let tick = engine.tick_sprint()?;
        if tick.same_stage {
            let progress = engine.progress()?;
            println!(
                "{} Sprint {}/{} - staying on stage '{}'",
                "→".yellow().bold(),
                tick.sprint_number,
                tick.total_sprints,
                progress.current_stage
            );
            return Ok(());
        }
    }

    let outcome = engine.advance(force, skip_gate_check, reason.as_deref())?;

    if !outcome.allowed {
        eprintln!("{} Cannot advance:", "✗".red().bold());
        for blocker in &outcome.blockers {
            eprintln!("   - {blocker}");
        }
        if outcome.gate_blocked {
            eprintln!("   resolve the blocking checks above, or advance with --force");
            let stage = engine.progress()?.current_stage;
            return Err(PipelineError::BlockingGateFailure {
                stage,
                failures: outcome.blockers,
            }
            .into());
        }
        eprintln!("   run 'stagehand run' to produce and validate, or advance with --force");
        bail!("advance rejected by the quality gate");
    }

    if outcome.epic_cycled {
        println!(
            "{} Epic cycle {}: looped back to stage '{}'",
            "→".yellow().bold(),
            outcome.epic_cycle.unwrap_or_default(),
            outcome.next_stage.as_deref().unwrap_or("?")
        );
    } else if outcome.pipeline_complete {
        println!(
            "{} Stage '{}' completed - pipeline complete",
            "✓".green().bold(),
            outcome.completed_stage.as_deref().unwrap_or("?")
        );
    } else {
        println!(
            "{} Stage '{}' completed - now on '{}'",
            "✓".green().bold(),
            outcome.completed_stage.as_deref().unwrap_or("?"),
            outcome.next_stage.as_deref().unwrap_or("?")
        );
    }
    Ok(())
}
