//! PDCA retry controller.
//!
//! Wraps "produce then evaluate" in a bounded attempt loop with an
//! escalating strategy: attempt 1 runs unmodified, attempt 2 injects the
//! prior failing-check messages as feedback, attempt 3 simplifies the
//! request to the minimum required artifacts enumerated file-by-file.
//! A blocking gate failure stops immediately; it is never retried.
//!
//! The controller is agnostic to how `produce` works; it only orchestrates
//! the gate-evaluate-feedback loop, so it can wrap any producer. Retry
//! state is an ephemeral value passed through the call chain, never
//! persisted, which keeps the attempt-bounding invariant locally
//! verifiable.

use anyhow::Result;
use tracing::{debug, info};

use crate::gate::{GateStatus, QualityCheck, QualityResult, Severity};

/// How a given attempt modifies the produce request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStrategy {
    /// First attempt: the request as written.
    Initial,
    /// Re-run with the prior failing-check messages injected as feedback.
    Feedback,
    /// Final fallback: ask only for the minimum required artifacts.
    Simplified,
}

impl AttemptStrategy {
    pub fn for_attempt(attempt: u32) -> Self {
        match attempt {
            1 => AttemptStrategy::Initial,
            2 => AttemptStrategy::Feedback,
            _ => AttemptStrategy::Simplified,
        }
    }
}

impl std::fmt::Display for AttemptStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptStrategy::Initial => write!(f, "initial"),
            AttemptStrategy::Feedback => write!(f, "feedback"),
            AttemptStrategy::Simplified => write!(f, "simplified"),
        }
    }
}

/// Ephemeral retry state for one stage attempt cycle.
///
/// Created at the first failure, discarded on success or exhaustion;
/// reconstructable from the latest quality result, so never persisted.
#[derive(Debug, Clone)]
pub struct RetryState {
    pub stage_id: String,
    pub attempt: u32,
    pub max_attempts: u32,
    /// Failing-check messages from the most recent evaluation.
    pub errors: Vec<String>,
    pub last_score: Option<f64>,
}

impl RetryState {
    fn new(stage_id: &str, max_attempts: u32) -> Self {
        Self {
            stage_id: stage_id.to_string(),
            attempt: 0,
            max_attempts,
            errors: Vec::new(),
            last_score: None,
        }
    }

    fn absorb(&mut self, result: &QualityResult) {
        self.errors = result.failure_messages();
        self.last_score = Some(result.score);
    }
}

/// Record of one completed attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub strategy: AttemptStrategy,
    pub status: GateStatus,
    pub score: f64,
    pub failures: Vec<String>,
}

/// Final outcome of the retry loop.
#[derive(Debug)]
pub struct RetryOutcome {
    pub success: bool,
    pub final_result: Option<QualityResult>,
    pub attempts: Vec<AttemptRecord>,
}

impl RetryOutcome {
    /// The loop ended on a blocking failure (stopped without retrying).
    pub fn blocked(&self) -> bool {
        self.final_result
            .as_ref()
            .map(|r| r.status == GateStatus::Blocked)
            .unwrap_or(false)
    }
}

/// Run `produce` + `evaluate` with bounded retries.
///
/// Never exceeds `max_attempts`; on the Nth consecutive retry-eligible
/// failure the outcome carries exactly N attempt records and
/// `success = false`, and the caller must pause rather than advance.
pub fn run_with_retry<P, E>(
    stage_id: &str,
    max_attempts: u32,
    mut produce: P,
    mut evaluate: E,
) -> Result<RetryOutcome>
where
    P: FnMut(AttemptStrategy, &RetryState) -> Result<()>,
    E: FnMut() -> Result<QualityResult>,
{
    let max_attempts = max_attempts.max(1);
    let mut state = RetryState::new(stage_id, max_attempts);
    let mut attempts = Vec::new();

    loop {
        state.attempt += 1;
        let strategy = AttemptStrategy::for_attempt(state.attempt);
        debug!(
            stage = stage_id,
            attempt = state.attempt,
            strategy = %strategy,
            "producing stage output"
        );

        produce(strategy, &state)?;
        let result = evaluate()?;

        attempts.push(AttemptRecord {
            attempt: state.attempt,
            strategy,
            status: result.status,
            score: result.score,
            failures: result.failure_messages(),
        });

        match result.status {
            GateStatus::Passed | GateStatus::PassedWithWarnings => {
                info!(stage = stage_id, attempt = state.attempt, "gate satisfied");
                return Ok(RetryOutcome {
                    success: true,
                    final_result: Some(result),
                    attempts,
                });
            }
            GateStatus::Blocked => {
                // Blocking failures are never retried
                info!(stage = stage_id, "blocking gate failure; stopping");
                return Ok(RetryOutcome {
                    success: false,
                    final_result: Some(result),
                    attempts,
                });
            }
            GateStatus::RetryableFailure => {
                state.absorb(&result);
                if state.attempt >= max_attempts {
                    return Ok(RetryOutcome {
                        success: false,
                        final_result: Some(result),
                        attempts,
                    });
                }
            }
        }
    }
}

/// Feedback block injected into the second attempt's request.
pub fn build_feedback(errors: &[String]) -> String {
    let mut feedback = format!(
        "The previous attempt failed validation. Fix these {} issues:\n",
        errors.len()
    );
    for error in errors {
        feedback.push_str(&format!("- {error}\n"));
    }
    feedback
}

/// Simplified request for the final attempt: only the minimum required
/// artifacts, enumerated file-by-file from the stage's blocking and
/// critical checks.
pub fn simplified_instructions(instructions: &str, checks: &[QualityCheck]) -> String {
    let mut files: Vec<&str> = checks
        .iter()
        .filter(|c| matches!(c.severity, Severity::Blocking | Severity::Critical))
        .flat_map(|c| c.rule.required_files())
        .collect();
    files.sort_unstable();
    files.dedup();

    let mut request = format!(
        "{instructions}\n\nProduce ONLY the minimum required artifacts, one file at a time:\n"
    );
    if files.is_empty() {
        request.push_str("- (no specific files are mandated; satisfy the stage checks)\n");
    }
    for file in files {
        request.push_str(&format!("- {file}\n"));
    }
    request
}
