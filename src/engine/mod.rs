//! Stage Pipeline Engine.
//!
//! Owns the persisted progress state and the stage ordering, and
//! coordinates the gate, retry controller, fallback gate, and checkpoint
//! store to advance, loop back, or pause. Global flow is linear along the
//! stage ordinals with two bounded escape hatches: the sprint loop
//! (self-transition) and the epic cycle (range reset). All state mutations
//! go through the progress store's atomic write discipline.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::checkpoints::{CheckpointKind, CheckpointStore, IncludeSet};
use crate::fs::{
    append_transition, latest_validation, load_config_required, Config, ProgressStore,
    TransitionRecord, WorkDir,
};
use crate::gate::{GateEngine, GateStatus, QualityResult, Severity};
use crate::models::{
    EpicCycleState, FallbackSignal, IterationState, PipelineError, Progress, StageStatus,
};
use crate::plan::{load_plan, Plan, StageSpec};
use crate::producer::{FallbackGate, TaskSpec};
use crate::retry::{self, AttemptStrategy, RetryOutcome};

/// Result of an `advance` request.
#[derive(Debug)]
pub struct AdvanceOutcome {
    pub allowed: bool,
    /// Failing check names/messages and missing prerequisites.
    pub blockers: Vec<String>,
    /// The latest gate result carries a blocking failure.
    pub gate_blocked: bool,
    pub completed_stage: Option<String>,
    pub next_stage: Option<String>,
    /// The advance was satisfied by an epic loop-back instead of a forward
    /// step.
    pub epic_cycled: bool,
    pub epic_cycle: Option<u32>,
    pub pipeline_complete: bool,
}

/// Result of a sprint tick.
#[derive(Debug, PartialEq, Eq)]
pub struct SprintTick {
    /// True while sprints remain: control returns to the same stage.
    pub same_stage: bool,
    pub sprint_number: u32,
    pub total_sprints: u32,
}

/// Result of an epic cycle tick.
#[derive(Debug, PartialEq, Eq)]
pub struct EpicTick {
    pub cycle_complete: bool,
    pub next_cycle: u32,
}

/// Build the initial progress document for a plan.
pub fn initial_progress(plan: &Plan) -> Progress {
    let epic = match &plan.epic_cycle {
        Some(spec) => EpicCycleState::new(
            spec.total_cycles,
            spec.start_stage.clone(),
            spec.end_stage.clone(),
        ),
        None => EpicCycleState::disabled(),
    };
    let first_sprints = plan.stages.first().map(|s| s.sprints).unwrap_or(1);
    Progress::for_stages(&plan.stage_ids(), first_sprints, epic)
}

pub struct PipelineEngine {
    project_root: PathBuf,
    work: WorkDir,
    plan: Plan,
    config: Config,
    store: ProgressStore,
}

impl PipelineEngine {
    /// Open an initialized project.
    pub fn open(project_root: &Path) -> Result<Self> {
        let work = WorkDir::new(project_root);
        work.load()?;
        let config = load_config_required(&work)?;
        let plan = load_plan(&config.pipeline.plan_path)?;
        let store = ProgressStore::new(&work);
        Ok(Self {
            project_root: project_root.to_path_buf(),
            work,
            plan,
            config,
            store,
        })
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn work_dir(&self) -> &WorkDir {
        &self.work
    }

    pub fn progress(&self) -> Result<Progress> {
        self.store.load()
    }

    pub fn gate_engine(&self) -> GateEngine {
        GateEngine::new(&self.project_root, self.config.command_timeout())
    }

    fn current_spec(&self, progress: &Progress) -> Result<&StageSpec> {
        self.plan.stage(&progress.current_stage).ok_or_else(|| {
            anyhow::Error::new(PipelineError::StateCorruption {
                detail: format!(
                    "progress references a stage not in the plan: '{}'",
                    progress.current_stage
                ),
            })
        })
    }

    /// Evaluate the current (or a named) stage's quality gate.
    pub fn validate_stage(&self, stage_id: Option<&str>) -> Result<QualityResult> {
        let progress = self.store.load()?;
        let id = stage_id.unwrap_or(&progress.current_stage);
        let spec = self
            .plan
            .stage(id)
            .ok_or_else(|| anyhow::anyhow!("Unknown stage: {id}"))?;
        self.gate_engine().evaluate(&spec.id, &spec.checks)
    }

    /// Prerequisites that currently prevent an un-forced advance:
    /// the latest gate result must be non-blocking, critical failures must
    /// be resolved, and the configured handoff artifact must exist.
    fn gate_blockers(&self, stage: &StageSpec) -> Result<(Vec<String>, bool)> {
        let mut blockers = Vec::new();
        let mut gate_blocked = false;

        if !stage.checks.is_empty() {
            match latest_validation(&self.work, &stage.id)? {
                None => blockers.push(format!(
                    "stage '{}' has quality checks but no validation record; run 'stagehand validate'",
                    stage.id
                )),
                Some(result) => match result.status {
                    GateStatus::Blocked => {
                        gate_blocked = true;
                        for outcome in result
                            .outcomes
                            .iter()
                            .filter(|o| !o.passed && o.severity == Severity::Blocking)
                        {
                            blockers.push(format!("{}: {}", outcome.name, outcome.message));
                        }
                    }
                    GateStatus::RetryableFailure => {
                        for message in result.failure_messages() {
                            blockers.push(format!("unresolved critical check - {message}"));
                        }
                    }
                    GateStatus::Passed | GateStatus::PassedWithWarnings => {}
                },
            }
        }

        if let Some(handoff) = &stage.handoff {
            if !self.work.outputs_dir(&stage.id).join(handoff).is_file() {
                blockers.push(format!(
                    "handoff artifact '{handoff}' is missing from the stage outputs"
                ));
            }
        }

        Ok((blockers, gate_blocked))
    }

    /// Advance to the next stage (or loop back when an epic cycle is due).
    ///
    /// Without `force`, requires the current stage's latest gate result to
    /// be non-blocking with no unresolved critical checks, and the handoff
    /// artifact present if one is configured. On success the current stage
    /// is marked completed, the next stage in_progress, and the transition
    /// is appended to the history.
    pub fn advance(
        &self,
        force: bool,
        skip_gate_check: bool,
        reason: Option<&str>,
    ) -> Result<AdvanceOutcome> {
        let mut progress = self.store.load()?;
        let stage = self.current_spec(&progress)?.clone();

        let (blockers, gate_blocked) = if force || skip_gate_check {
            (Vec::new(), false)
        } else {
            self.gate_blockers(&stage)?
        };

        if !blockers.is_empty() {
            return Ok(AdvanceOutcome {
                allowed: false,
                blockers,
                gate_blocked,
                completed_stage: None,
                next_stage: None,
                epic_cycled: false,
                epic_cycle: None,
                pipeline_complete: false,
            });
        }

        // An epic loop-back takes precedence over the forward step while
        // cycles remain.
        let epic_due = progress.epic_cycle.has_next_cycle()
            && progress
                .epic_cycle
                .scope
                .as_ref()
                .map(|s| s.end_stage == stage.id)
                .unwrap_or(false);
        if epic_due {
            let start_id = progress
                .epic_cycle
                .scope
                .as_ref()
                .map(|s| s.start_stage.clone())
                .unwrap_or_default();
            drop(progress);
            let tick = self.tick_epic_cycle()?;
            return Ok(AdvanceOutcome {
                allowed: true,
                blockers: Vec::new(),
                gate_blocked: false,
                completed_stage: Some(stage.id.clone()),
                next_stage: Some(start_id),
                epic_cycled: true,
                epic_cycle: Some(tick.next_cycle),
                pipeline_complete: false,
            });
        }

        self.complete_stage(&mut progress, &stage.id)?;

        match self.plan.next_stage(&stage.id).cloned() {
            Some(next) => {
                let status = progress
                    .stage_status(&next.id)
                    .unwrap_or(StageStatus::Pending);
                if status.can_transition_to(&StageStatus::InProgress) {
                    progress.transition_stage(&next.id, StageStatus::InProgress)?;
                } else {
                    // Revisiting a terminal stage is corrective
                    progress.reset_stage(&next.id, StageStatus::InProgress);
                }
                progress.current_stage = next.id.clone();
                progress.current_iteration = IterationState::reset(next.sprints);
                self.store.save(&mut progress)?;
                append_transition(
                    &self.work,
                    &TransitionRecord::new(&stage.id, &next.id, reason.unwrap_or("advance")),
                )?;
                info!(from = %stage.id, to = %next.id, "advanced");
                self.maybe_milestone_checkpoint(&stage.id);

                Ok(AdvanceOutcome {
                    allowed: true,
                    blockers: Vec::new(),
                    gate_blocked: false,
                    completed_stage: Some(stage.id.clone()),
                    next_stage: Some(next.id),
                    epic_cycled: false,
                    epic_cycle: None,
                    pipeline_complete: false,
                })
            }
            None => {
                // Last stage completed and no epic cycles remain: terminal.
                self.store.save(&mut progress)?;
                append_transition(
                    &self.work,
                    &TransitionRecord::new(
                        &stage.id,
                        "(complete)",
                        reason.unwrap_or("pipeline complete"),
                    ),
                )?;
                info!(stage = %stage.id, "pipeline complete");
                self.maybe_milestone_checkpoint(&stage.id);

                Ok(AdvanceOutcome {
                    allowed: true,
                    blockers: Vec::new(),
                    gate_blocked: false,
                    completed_stage: Some(stage.id.clone()),
                    next_stage: None,
                    epic_cycled: false,
                    epic_cycle: None,
                    pipeline_complete: true,
                })
            }
        }
    }

    fn complete_stage(&self, progress: &mut Progress, stage_id: &str) -> Result<()> {
        let status = progress
            .stage_status(stage_id)
            .unwrap_or(StageStatus::Pending);
        match status {
            StageStatus::Pending => {
                progress.transition_stage(stage_id, StageStatus::InProgress)?;
                progress.transition_stage(stage_id, StageStatus::Completed)?;
            }
            StageStatus::InProgress => {
                progress.transition_stage(stage_id, StageStatus::Completed)?;
            }
            StageStatus::Blocked => {
                // Only reachable under force; an override is corrective
                progress.reset_stage(stage_id, StageStatus::InProgress);
                progress.transition_stage(stage_id, StageStatus::Completed)?;
            }
            StageStatus::Completed | StageStatus::Skipped => {}
        }
        Ok(())
    }

    /// Arbitrary corrective loop-back. No gate requirement; the transition
    /// is logged to the append-only history.
    pub fn goto_stage(&self, target: &str, reason: &str) -> Result<()> {
        let mut progress = self.store.load()?;
        let target_spec = self
            .plan
            .stage(target)
            .ok_or_else(|| anyhow::anyhow!("Unknown stage: {target}"))?
            .clone();

        let from = progress.current_stage.clone();
        progress.reset_stage(target, StageStatus::InProgress);
        progress.current_stage = target_spec.id.clone();
        progress.current_iteration = IterationState::reset(target_spec.sprints);
        self.store.save(&mut progress)?;
        append_transition(&self.work, &TransitionRecord::new(&from, target, reason))?;
        info!(from = %from, to = target, reason = reason, "loop-back");
        Ok(())
    }

    /// Sprint tick for iterative stages.
    ///
    /// While sprints remain the counter increments and control returns to
    /// the same stage; once the final sprint is reached, `same_stage` is
    /// false and the caller falls through to a normal `advance`.
    pub fn tick_sprint(&self) -> Result<SprintTick> {
        let mut progress = self.store.load()?;
        let current = progress.current_iteration.current_sprint;
        let total = progress.current_iteration.total_sprints;

        if current < total {
            progress.current_iteration.current_sprint = current + 1;
            self.store.save(&mut progress)?;
            info!(
                stage = %progress.current_stage,
                sprint = current + 1,
                total = total,
                "sprint tick"
            );
            Ok(SprintTick {
                same_stage: true,
                sprint_number: current + 1,
                total_sprints: total,
            })
        } else {
            Ok(SprintTick {
                same_stage: false,
                sprint_number: current,
                total_sprints: total,
            })
        }
    }

    /// Epic cycle tick at the configured end stage.
    ///
    /// While cycles remain: resets the in-range stage statuses to pending,
    /// moves the pointer back to the range's start stage, and increments
    /// the cycle counter. Terminal once cycles are exhausted.
    pub fn tick_epic_cycle(&self) -> Result<EpicTick> {
        let mut progress = self.store.load()?;
        let epic = progress.epic_cycle.clone();

        let scope = match &epic.scope {
            Some(scope) if epic.enabled => scope.clone(),
            _ => {
                return Ok(EpicTick {
                    cycle_complete: true,
                    next_cycle: epic.current_cycle,
                })
            }
        };

        if progress.current_stage != scope.end_stage || !epic.has_next_cycle() {
            return Ok(EpicTick {
                cycle_complete: !epic.has_next_cycle(),
                next_cycle: epic.current_cycle,
            });
        }

        let start_ord = self
            .plan
            .ordinal_of(&scope.start_stage)
            .ok_or_else(|| anyhow::anyhow!("Epic start stage not in plan: {}", scope.start_stage))?;
        let end_ord = self
            .plan
            .ordinal_of(&scope.end_stage)
            .ok_or_else(|| anyhow::anyhow!("Epic end stage not in plan: {}", scope.end_stage))?;

        for spec in &self.plan.stages[start_ord..=end_ord] {
            progress.reset_stage(&spec.id, StageStatus::Pending);
        }

        let start_spec = self.plan.stages[start_ord].clone();
        progress.reset_stage(&start_spec.id, StageStatus::InProgress);
        progress.current_stage = start_spec.id.clone();
        progress.current_iteration = IterationState::reset(start_spec.sprints);
        progress.epic_cycle.current_cycle += 1;
        let next_cycle = progress.epic_cycle.current_cycle;
        self.store.save(&mut progress)?;

        append_transition(
            &self.work,
            &TransitionRecord::new(
                &scope.end_stage,
                &scope.start_stage,
                format!("epic cycle {next_cycle} of {}", epic.total_cycles),
            ),
        )?;
        info!(
            start = %scope.start_stage,
            cycle = next_cycle,
            total = epic.total_cycles,
            "epic loop-back"
        );

        Ok(EpicTick {
            cycle_complete: false,
            next_cycle,
        })
    }

    /// Produce and validate the current stage: fallback gate produces,
    /// quality gate validates, the retry controller regenerates with
    /// feedback up to the attempt budget.
    ///
    /// A blocking gate result marks the stage blocked. Retry exhaustion
    /// leaves the stage in progress (paused) for manual intervention.
    pub fn run_current_stage(&self, max_attempts: Option<u32>) -> Result<RetryOutcome> {
        let mut progress = self.store.load()?;
        let stage = self.current_spec(&progress)?.clone();

        match progress.stage_status(&stage.id) {
            Some(StageStatus::Blocked) => {
                bail!(
                    "stage '{}' is blocked; resolve the gate failure and loop back with 'stagehand goto', or advance with --force",
                    stage.id
                );
            }
            Some(StageStatus::Pending) => {
                progress.transition_stage(&stage.id, StageStatus::InProgress)?;
                self.store.save(&mut progress)?;
            }
            _ => {}
        }

        if self.plan.producers.is_empty() {
            bail!("no producers configured in plan '{}'", self.plan.name);
        }

        let max_attempts = max_attempts.unwrap_or(self.config.pipeline.max_attempts);
        let task = self.build_task(&stage)?;
        let gate = self.gate_engine();
        let fallback = FallbackGate::new(self.config.producer_timeout());
        let producers = &self.plan.producers;
        let stage_id = stage.id.clone();
        let checks = stage.checks.clone();
        let base_instructions = stage.instructions.clone();

        let outcome = retry::run_with_retry(
            &stage_id,
            max_attempts,
            |strategy, state| {
                let instructions = match strategy {
                    AttemptStrategy::Initial => base_instructions.clone(),
                    AttemptStrategy::Feedback => format!(
                        "{base_instructions}\n\n{}",
                        retry::build_feedback(&state.errors)
                    ),
                    AttemptStrategy::Simplified => {
                        retry::simplified_instructions(&base_instructions, &checks)
                    }
                };
                let prompt = task.render_prompt(&instructions);
                let result = fallback.invoke(&task, &prompt, producers)?;
                if !result.success {
                    return Err(anyhow::Error::new(PipelineError::ProducerFailure {
                        stage: stage_id.clone(),
                        signal: result.signal.unwrap_or(FallbackSignal::OutputInvalid),
                        reason: result.failure_reason(),
                    }));
                }
                Ok(())
            },
            || gate.evaluate(&stage_id, &checks),
        )?;

        if outcome.blocked() {
            let mut progress = self.store.load()?;
            progress.transition_stage(&stage.id, StageStatus::Blocked)?;
            self.store.save(&mut progress)?;
        }

        Ok(outcome)
    }

    fn build_task(&self, stage: &StageSpec) -> Result<TaskSpec> {
        let output_dir = self.work.outputs_dir(&stage.id);
        std::fs::create_dir_all(&output_dir)?;

        let prior_handoff = self.plan.prev_stage(&stage.id).and_then(|prev| {
            let handoff = prev.handoff.as_ref()?;
            std::fs::read_to_string(self.work.outputs_dir(&prev.id).join(handoff)).ok()
        });

        let mut reference_text = Vec::new();
        for rel in &stage.reference {
            match std::fs::read_to_string(self.project_root.join(rel)) {
                Ok(text) => reference_text.push(text),
                Err(e) => warn!(file = %rel, "skipping unreadable reference file: {e}"),
            }
        }

        Ok(TaskSpec {
            stage_id: stage.id.clone(),
            instructions: stage.instructions.clone(),
            prior_handoff,
            reference_text,
            output_dir,
        })
    }

    /// Milestone checkpoint on stage completion. A checkpoint failure is a
    /// warning, never a failed advance; the progress commit has already
    /// happened and checkpointing must not corrupt it.
    fn maybe_milestone_checkpoint(&self, stage_id: &str) {
        if !self.config.checkpoints.on_complete {
            return;
        }
        let store = CheckpointStore::new(&self.project_root);
        if let Err(e) = store.create(
            stage_id,
            Some(format!("stage '{stage_id}' completed")),
            CheckpointKind::Milestone,
            IncludeSet::default(),
        ) {
            warn!(stage = stage_id, "milestone checkpoint failed: {e:#}");
        }
    }
}
