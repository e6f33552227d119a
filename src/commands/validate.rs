//! Evaluate a stage's quality gate and report per-check outcomes.

use anyhow::{bail, Result};
use colored::Colorize;
use std::path::Path;

use crate::engine::PipelineEngine;
use crate::gate::GateStatus;
use crate::models::PipelineError;
use crate::utils::truncate;

pub fn execute(project_root: &Path, stage: Option<String>) -> Result<()> {
    let engine = PipelineEngine::open(project_root)?;
    let result = engine.validate_stage(stage.as_deref())?;

    println!("Quality gate for stage '{}':", result.stage_id);
    if result.outcomes.is_empty() {
        println!("  (no checks configured - nothing to validate)");
    }
    for outcome in &result.outcomes {
        let glyph = if outcome.passed {
            "✓".green().bold()
        } else {
            "✗".red().bold()
        };
        println!(
            "  {} {} [{}/{}] {}",
            glyph,
            outcome.name,
            outcome.kind,
            outcome.severity,
            truncate(&outcome.message, 120)
        );
    }

    match result.status {
        GateStatus::Passed => {
            println!("{} Gate passed (score {:.2})", "✓".green().bold(), result.score);
            Ok(())
        }
        GateStatus::PassedWithWarnings => {
            println!(
                "{} Gate passed with warnings (score {:.2})",
                "!".yellow().bold(),
                result.score
            );
            Ok(())
        }
        GateStatus::RetryableFailure => {
            eprintln!(
                "{} Critical checks failed; retry with 'stagehand run'",
                "✗".red().bold()
            );
            bail!("validation failed for stage '{}'", result.stage_id);
        }
        GateStatus::Blocked => {
            eprintln!("{} Stage is blocked by its quality gate", "✗".red().bold());
            Err(PipelineError::BlockingGateFailure {
                stage: result.stage_id.clone(),
                failures: result.failure_messages(),
            }
            .into())
        }
    }
}
