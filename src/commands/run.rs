//! Produce and validate the current stage through the retry controller.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::engine::PipelineEngine;
use crate::models::PipelineError;

pub fn execute(project_root: &Path, max_attempts: Option<u32>) -> Result<()> {
    let engine = PipelineEngine::open(project_root)?;
    let stage_id = engine.progress()?.current_stage;
    println!("{} Running stage '{stage_id}'", "→".yellow().bold());

    let outcome = engine.run_current_stage(max_attempts)?;

    for attempt in &outcome.attempts {
        println!(
            "  attempt {} [{}]: {} (score {:.2})",
            attempt.attempt, attempt.strategy, attempt.status, attempt.score
        );
        for failure in &attempt.failures {
            println!("    - {failure}");
        }
    }

    if outcome.success {
        println!(
            "{} Stage '{stage_id}' validated - advance with 'stagehand advance'",
            "✓".green().bold()
        );
        return Ok(());
    }

    if outcome.blocked() {
        eprintln!(
            "{} Stage '{stage_id}' hit a blocking gate failure and is now blocked",
            "✗".red().bold()
        );
        let failures = outcome
            .final_result
            .as_ref()
            .map(|r| r.failure_messages())
            .unwrap_or_default();
        return Err(PipelineError::BlockingGateFailure {
            stage: stage_id,
            failures,
        }
        .into());
    }

    // Retry budget exhausted: pause for manual intervention, with the full
    // attempt history already printed above.
    eprintln!(
        "{} Stage '{stage_id}' failed validation after {} attempts; pipeline paused",
        "✗".red().bold(),
        outcome.attempts.len()
    );
    let failures = outcome
        .final_result
        .as_ref()
        .map(|r| r.failure_messages())
        .unwrap_or_default();
    Err(PipelineError::RetryExhausted {
        stage: stage_id,
        attempts: outcome.attempts.len() as u32,
        failures,
    }
    .into())
}
