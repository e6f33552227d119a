//! Declarative quality check configuration.
//!
//! Checks are loaded from the plan document and treated as read-only input.
//! Dispatch is a pure match over the typed rule variant; adding a stage or a
//! check never requires new control flow anywhere else.

use serde::{Deserialize, Serialize};

/// Tiered failure severity.
///
/// `Blocking` failures stop the stage outright, `Critical` failures are
/// retry-eligible, `NonCritical` failures are always advisory
/// (pass-with-warnings) and never block or trigger retries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocking,
    Critical,
    NonCritical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Blocking => write!(f, "blocking"),
            Severity::Critical => write!(f, "critical"),
            Severity::NonCritical => write!(f, "non_critical"),
        }
    }
}

fn default_severity() -> Severity {
    Severity::Critical
}

/// A single declarative quality check for a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityCheck {
    pub name: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(flatten)]
    pub rule: CheckRule,
}

/// Type-specific check parameters.
///
/// Count rules compare against a minimum only; over-delivery is never
/// penalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckRule {
    /// Every listed file must exist (stage output directory first, project
    /// root as fallback).
    FileExists { files: Vec<String> },

    /// Directory must exist and contain at least one entry.
    DirectoryNotEmpty { path: String },

    /// Each section must appear as a level 1-3 markdown heading in the file.
    SectionPresent { file: String, sections: Vec<String> },

    /// Count markdown headings (or a custom pattern) in a file.
    SectionCount {
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        min: usize,
    },

    /// Count files matching a glob pattern.
    FileCount { pattern: String, min: usize },

    /// Count regex matches in a file.
    ComponentCount {
        file: String,
        pattern: String,
        min: usize,
    },

    /// Run a shell command. Pass/fail comes from `min_pass_rate` applied to
    /// `N pass` / `N fail` counts in the output when set, otherwise from the
    /// exit code.
    Command {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_pass_rate: Option<f64>,
    },
}

impl CheckRule {
    /// Short label for display and audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckRule::FileExists { .. } => "file_exists",
            CheckRule::DirectoryNotEmpty { .. } => "directory_not_empty",
            CheckRule::SectionPresent { .. } => "section_present",
            CheckRule::SectionCount { .. } => "section_count",
            CheckRule::FileCount { .. } => "file_count",
            CheckRule::ComponentCount { .. } => "component_count",
            CheckRule::Command { .. } => "command",
        }
    }

    /// Files this rule requires to exist, used to enumerate the minimum
    /// required artifacts for a simplified retry attempt.
    pub fn required_files(&self) -> Vec<&str> {
        match self {
            CheckRule::FileExists { files } => files.iter().map(String::as_str).collect(),
            CheckRule::SectionPresent { file, .. }
            | CheckRule::SectionCount { file, .. }
            | CheckRule::ComponentCount { file, .. } => vec![file.as_str()],
            _ => Vec::new(),
        }
    }
}
