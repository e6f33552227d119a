//! Typed error taxonomy for the pipeline core.
//!
//! Producer failures are normally handled inside the fallback gate and
//! retry-eligible gate failures inside the retry controller; the variants
//! here are the ones that surface to the top level and the user. Exit code
//! mapping: `0` success, `1` generic failure, `2` blocked-by-gate.

use thiserror::Error;

use super::failure::FallbackSignal;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A blocking-severity quality check failed. Never retried.
    #[error("stage '{stage}' is blocked by its quality gate: {}", .failures.join("; "))]
    BlockingGateFailure { stage: String, failures: Vec<String> },

    /// Critical checks kept failing until the retry budget ran out.
    #[error("stage '{stage}' still failing after {attempts} attempts")]
    RetryExhausted {
        stage: String,
        attempts: u32,
        failures: Vec<String>,
    },

    /// Every configured producer was tried and none succeeded.
    #[error("no producer succeeded for stage '{stage}' (last signal: {signal}): {reason}")]
    ProducerFailure {
        stage: String,
        signal: FallbackSignal,
        reason: String,
    },

    /// Progress or checkpoint state is unreadable or schema-invalid.
    /// Always fatal; recovery requires an explicit re-init, never a silent reset.
    #[error("pipeline state is corrupt or missing: {detail}")]
    StateCorruption { detail: String },

    /// Refused to delete a milestone checkpoint.
    #[error("checkpoint '{id}' is a milestone and is protected from deletion (use --force to override)")]
    RetentionViolation { id: String },
}

impl PipelineError {
    /// CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::BlockingGateFailure { .. } => 2,
            _ => 1,
        }
    }
}
