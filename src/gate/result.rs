//! Quality gate result types and severity aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::Severity;

/// Outcome of a single quality check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub kind: String,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
}

/// Aggregated gate status, derived by fixed precedence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// All checks passed.
    Passed,
    /// Only non-critical (advisory) checks failed.
    PassedWithWarnings,
    /// At least one critical check failed; eligible for retry.
    RetryableFailure,
    /// At least one blocking check failed; the stage cannot advance.
    Blocked,
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateStatus::Passed => write!(f, "passed"),
            GateStatus::PassedWithWarnings => write!(f, "passed_with_warnings"),
            GateStatus::RetryableFailure => write!(f, "retryable_failure"),
            GateStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// Result of evaluating a stage's quality gate.
///
/// Persisted as an immutable timestamped audit record; callers act on the
/// returned value, the gate never mutates progress itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityResult {
    pub stage_id: String,
    pub status: GateStatus,
    pub outcomes: Vec<CheckOutcome>,
    /// Fraction of checks that passed (1.0 for an empty gate).
    pub score: f64,
    pub evaluated_at: DateTime<Utc>,
}

impl QualityResult {
    /// Aggregate per-check outcomes into an overall status.
    ///
    /// Precedence is fixed and independent of check declaration order:
    /// any blocking failure wins, then any critical failure, then advisory
    /// warnings, then pass. Config order is for display only.
    pub fn aggregate(stage_id: impl Into<String>, outcomes: Vec<CheckOutcome>) -> Self {
        let any_failed_at = |severity: Severity| {
            outcomes
                .iter()
                .any(|o| !o.passed && o.severity == severity)
        };

        let status = if any_failed_at(Severity::Blocking) {
            GateStatus::Blocked
        } else if any_failed_at(Severity::Critical) {
            GateStatus::RetryableFailure
        } else if any_failed_at(Severity::NonCritical) {
            GateStatus::PassedWithWarnings
        } else {
            GateStatus::Passed
        };

        let score = if outcomes.is_empty() {
            1.0
        } else {
            outcomes.iter().filter(|o| o.passed).count() as f64 / outcomes.len() as f64
        };

        Self {
            stage_id: stage_id.into(),
            status,
            outcomes,
            score,
            evaluated_at: Utc::now(),
        }
    }

    /// Gate is satisfied for advancing (warnings are advisory).
    pub fn passed(&self) -> bool {
        matches!(
            self.status,
            GateStatus::Passed | GateStatus::PassedWithWarnings
        )
    }

    pub fn is_blocking(&self) -> bool {
        self.status == GateStatus::Blocked
    }

    pub fn failed_outcomes(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    /// Messages of failing checks, for retry feedback and user display.
    pub fn failure_messages(&self) -> Vec<String> {
        self.failed_outcomes()
            .map(|o| format!("{}: {}", o.name, o.message))
            .collect()
    }

    /// Names of failing blocking checks.
    pub fn blocking_failures(&self) -> Vec<String> {
        self.failed_outcomes()
            .filter(|o| o.severity == Severity::Blocking)
            .map(|o| o.name.clone())
            .collect()
    }
}
