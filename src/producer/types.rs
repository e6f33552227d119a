//! Producer definitions and the per-stage task payload.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An external work-producing backend, invoked as a CLI.
///
/// The prompt is appended as the final argument after `args`. Producers are
/// tried strictly in the order they appear in the plan; the order is
/// config-driven and never randomized, so behavior is reproducible given the
/// same config and environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProducerSpec {
    pub id: String,
    pub bin: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// What a producer is asked to do for one stage attempt.
///
/// The core never interprets the resulting text; it only checks that the
/// produced artifacts satisfy the stage's structural gate.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub stage_id: String,
    pub instructions: String,
    pub prior_handoff: Option<String>,
    pub reference_text: Vec<String>,
    /// Directory the producer runs in and writes artifacts to.
    pub output_dir: PathBuf,
}

impl TaskSpec {
    /// Render the producer prompt from the task context plus the (possibly
    /// retry-amended) instructions for this attempt.
    pub fn render_prompt(&self, instructions: &str) -> String {
        let mut prompt = format!(
            "Stage: {}\n\nWrite all artifact files into the current working directory.\n\n{}",
            self.stage_id, instructions
        );
        if let Some(handoff) = &self.prior_handoff {
            prompt.push_str("\n\n## Handoff from the previous stage\n\n");
            prompt.push_str(handoff);
        }
        for reference in &self.reference_text {
            prompt.push_str("\n\n## Reference\n\n");
            prompt.push_str(reference);
        }
        prompt
    }
}

/// Centralized error-pattern table for classifying producer output.
///
/// Matched case-insensitively against combined stdout/stderr. Kept in one
/// place so call sites never grow ad hoc regexes.
pub const ERROR_PATTERNS: &[&str] = &[
    "rate limit",
    "rate-limited",
    "quota exceeded",
    "usage limit",
    "overloaded",
    "authentication failed",
    "unauthorized",
    "invalid api key",
    "credit balance",
    "billing",
];

/// Returns the first matching error pattern, if any.
pub fn matches_error_pattern(output: &str) -> Option<&'static str> {
    let lower = output.to_lowercase();
    ERROR_PATTERNS.iter().find(|p| lower.contains(*p)).copied()
}
