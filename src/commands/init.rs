//! Initialize the `.work` directory from a plan document.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::engine;
use crate::fs::{save_config, Config, ProgressStore, WorkDir};
use crate::plan::load_plan;
use crate::utils::display_path;

pub fn execute(project_root: &Path, plan_path: &Path, clean: bool) -> Result<()> {
    println!("{}\n", crate::LOGO.cyan());
    let plan = load_plan(plan_path)?;

    let work = WorkDir::new(project_root);
    if clean && work.exists() {
        std::fs::remove_dir_all(work.root())
            .with_context(|| format!("Failed to remove: {}", work.root().display()))?;
        println!("{} Removed existing .work directory", "→".yellow().bold());
    }
    work.initialize()?;
    work.ensure_stage_output_dirs(&plan.stage_ids())?;

    let plan_path_abs = plan_path
        .canonicalize()
        .unwrap_or_else(|_| plan_path.to_path_buf());
    save_config(&work, &Config::new(plan_path_abs.clone()))?;

    let mut progress = engine::initial_progress(&plan);
    ProgressStore::new(&work).save(&mut progress)?;

    println!(
        "{} Initialized pipeline '{}' with {} stages",
        "✓".green().bold(),
        plan.name,
        plan.stages.len()
    );
    println!("  plan: {}", display_path(&plan_path_abs, project_root));
    if let Some(first) = plan.stages.first() {
        println!("  current stage: {} ({})", first.id, first.name);
    }
    if let Some(epic) = &plan.epic_cycle {
        println!(
            "  epic cycle: {} .. {} x{}",
            epic.start_stage, epic.end_stage, epic.total_cycles
        );
    }
    if !plan.producers.is_empty() {
        let ids: Vec<&str> = plan.producers.iter().map(|p| p.id.as_str()).collect();
        println!("  producers: {}", ids.join(" > "));
    }
    Ok(())
}
