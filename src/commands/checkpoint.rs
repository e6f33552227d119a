//! Checkpoint command implementations.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::checkpoints::{CheckpointKind, CheckpointStore, IncludeSet, RestoreMode};
use crate::engine::PipelineEngine;

pub fn create(project_root: &Path, description: Option<String>, milestone: bool) -> Result<()> {
    let engine = PipelineEngine::open(project_root)?;
    let stage_id = engine.progress()?.current_stage;
    let kind = if milestone {
        CheckpointKind::Milestone
    } else {
        CheckpointKind::Manual
    };

    let meta = CheckpointStore::new(project_root).create(
        &stage_id,
        description,
        kind,
        IncludeSet::default(),
    )?;
    println!(
        "{} Checkpoint created: {} ({} files, {})",
        "✓".green().bold(),
        meta.id,
        meta.manifest.len(),
        meta.kind
    );
    Ok(())
}

pub fn list(project_root: &Path) -> Result<()> {
    let checkpoints = CheckpointStore::new(project_root).list()?;
    if checkpoints.is_empty() {
        println!("No checkpoints yet. Create one with 'stagehand checkpoint create'.");
        return Ok(());
    }

    for meta in checkpoints {
        let kind = if meta.is_milestone() {
            "milestone".yellow().bold()
        } else {
            "manual".normal()
        };
        println!(
            "  {}  [{}]  stage {}  {}  {}",
            meta.id,
            kind,
            meta.stage_id,
            meta.created_at.format("%Y-%m-%d %H:%M:%S"),
            meta.description.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub fn restore(project_root: &Path, id: &str, partial: Vec<String>) -> Result<()> {
    let mode = if partial.is_empty() {
        RestoreMode::Full
    } else {
        RestoreMode::Partial(partial)
    };
    CheckpointStore::new(project_root).restore(id, &mode)?;

    match mode {
        RestoreMode::Full => println!("{} Restored checkpoint {id}", "✓".green().bold()),
        RestoreMode::Partial(files) => println!(
            "{} Restored {} file(s) from checkpoint {id}",
            "✓".green().bold(),
            files.len()
        ),
    }
    Ok(())
}

pub fn cleanup(project_root: &Path, retain: Option<usize>) -> Result<()> {
    let engine = PipelineEngine::open(project_root)?;
    let retain = retain.unwrap_or(engine.config().checkpoints.retain);

    let deleted = CheckpointStore::new(project_root).cleanup(retain, true)?;
    if deleted.is_empty() {
        println!("Nothing to clean up (retention: {retain}).");
    } else {
        println!(
            "{} Deleted {} checkpoint(s) beyond retention {retain}:",
            "✓".green().bold(),
            deleted.len()
        );
        for id in deleted {
            println!("  - {id}");
        }
    }
    Ok(())
}

pub fn delete(project_root: &Path, id: &str, force: bool) -> Result<()> {
    CheckpointStore::new(project_root).delete(id, force)?;
    println!("{} Deleted checkpoint {id}", "✓".green().bold());
    Ok(())
}
