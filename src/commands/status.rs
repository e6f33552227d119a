//! Pipeline status dashboard.

use anyhow::Result;
use colored::{ColoredString, Colorize};
use std::path::Path;

use crate::engine::PipelineEngine;
use crate::fs::{latest_validation, read_transitions};
use crate::models::StageStatus;

fn glyph(status: StageStatus) -> ColoredString {
    match status {
        StageStatus::Completed => "✓".green().bold(),
        StageStatus::InProgress => "→".yellow().bold(),
        StageStatus::Blocked => "✗".red().bold(),
        StageStatus::Skipped => "⊘".dimmed(),
        StageStatus::Pending => "○".dimmed(),
    }
}

pub fn execute(project_root: &Path) -> Result<()> {
    let engine = PipelineEngine::open(project_root)?;
    let progress = engine.progress()?;

    println!("{}", engine.plan().name.bold());

    for stage in engine.plan().stage_identities() {
        let status = progress
            .stage_status(&stage.id)
            .unwrap_or(StageStatus::Pending);
        let marker = if stage.id == progress.current_stage {
            "  <- current"
        } else {
            ""
        };
        let gate = match latest_validation(engine.work_dir(), &stage.id)? {
            Some(result) => format!("  [gate: {}]", result.status),
            None => String::new(),
        };
        println!(
            "  {} {}. {} - {}{}{}",
            glyph(status),
            stage.ordinal + 1,
            stage.id,
            stage.name,
            gate,
            marker
        );
    }

    let iteration = &progress.current_iteration;
    if iteration.total_sprints > 1 {
        println!(
            "\n  sprint {}/{} on '{}'",
            iteration.current_sprint, iteration.total_sprints, progress.current_stage
        );
    }

    let epic = &progress.epic_cycle;
    if epic.enabled {
        if let Some(scope) = &epic.scope {
            println!(
                "  epic cycle {}/{} over {} .. {} ({} remaining)",
                epic.current_cycle,
                epic.total_cycles,
                scope.start_stage,
                scope.end_stage,
                epic.cycles_remaining()
            );
        }
    }

    let transitions = read_transitions(engine.work_dir())?;
    if !transitions.is_empty() {
        println!("\n  recent transitions:");
        for record in transitions.iter().rev().take(5) {
            println!(
                "    {} -> {} ({}, {})",
                record.from,
                record.to,
                record.reason,
                record.at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}
