//! Quality gate evaluation.
//!
//! Evaluates a stage's declarative check list with the artifact probes and
//! the process executor, aggregates by severity precedence, and persists
//! every result as an immutable audit record. The gate never mutates
//! progress; callers act on the returned result.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::config::{CheckRule, QualityCheck};
use super::probe;
use super::result::{CheckOutcome, QualityResult};
use crate::fs::{store_validation, WorkDir};
use crate::process;

pub struct GateEngine {
    project_root: PathBuf,
    work_dir: WorkDir,
    command_timeout: Duration,
}

impl GateEngine {
    pub fn new(project_root: &Path, command_timeout: Duration) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            work_dir: WorkDir::new(project_root),
            command_timeout,
        }
    }

    /// Evaluate all checks for a stage and persist the result.
    ///
    /// A check whose execution itself errors (unreadable file, bad pattern,
    /// unspawnable command) is recorded as failed with its configured
    /// severity, never silently skipped. An empty check list passes.
    pub fn evaluate(&self, stage_id: &str, checks: &[QualityCheck]) -> Result<QualityResult> {
        if checks.is_empty() {
            info!(stage = stage_id, "no quality checks configured; passing");
        }

        let stage_output_dir = self.work_dir.outputs_dir(stage_id);
        let outcomes: Vec<CheckOutcome> = checks
            .iter()
            .map(|check| self.run_check(&stage_output_dir, check))
            .collect();

        for outcome in &outcomes {
            debug!(
                stage = stage_id,
                check = %outcome.name,
                passed = outcome.passed,
                "{}",
                outcome.message
            );
        }

        let result = QualityResult::aggregate(stage_id, outcomes);
        store_validation(&self.work_dir, &result)?;
        Ok(result)
    }

    fn run_check(&self, stage_output_dir: &Path, check: &QualityCheck) -> CheckOutcome {
        let (passed, message) = match self.apply_rule(stage_output_dir, &check.rule) {
            Ok(outcome) => outcome,
            Err(e) => (false, format!("check execution failed: {e:#}")),
        };
        CheckOutcome {
            name: check.name.clone(),
            kind: check.rule.kind().to_string(),
            severity: check.severity,
            passed,
            message,
        }
    }

    fn apply_rule(&self, stage_output_dir: &Path, rule: &CheckRule) -> Result<(bool, String)> {
        match rule {
            CheckRule::FileExists { files } => {
                let missing: Vec<&str> = files
                    .iter()
                    .map(String::as_str)
                    .filter(|f| {
                        !probe::file_exists(&probe::resolve_target(
                            stage_output_dir,
                            &self.project_root,
                            f,
                        ))
                    })
                    .collect();
                if missing.is_empty() {
                    Ok((true, format!("all {} files present", files.len())))
                } else {
                    Ok((false, format!("missing files: {}", missing.join(", "))))
                }
            }

            CheckRule::DirectoryNotEmpty { path } => {
                let target = probe::resolve_target(stage_output_dir, &self.project_root, path);
                let populated = probe::directory_not_empty(&target)?;
                if populated {
                    Ok((true, format!("{path} is non-empty")))
                } else {
                    Ok((false, format!("{path} is missing or empty")))
                }
            }

            CheckRule::SectionPresent { file, sections } => {
                let target = probe::resolve_target(stage_output_dir, &self.project_root, file);
                if !probe::file_exists(&target) {
                    return Ok((false, format!("{file} not found")));
                }
                let content = std::fs::read_to_string(&target)
                    .with_context(|| format!("Failed to read: {}", target.display()))?;
                let mut missing = Vec::new();
                for section in sections {
                    if !probe::section_present(&content, section)? {
                        missing.push(section.as_str());
                    }
                }
                if missing.is_empty() {
                    Ok((true, format!("all {} sections present", sections.len())))
                } else {
                    Ok((
                        false,
                        format!("{file} is missing sections: {}", missing.join(", ")),
                    ))
                }
            }

            CheckRule::SectionCount { file, pattern, min } => {
                let target = probe::resolve_target(stage_output_dir, &self.project_root, file);
                if !probe::file_exists(&target) {
                    return Ok((false, format!("{file} not found")));
                }
                let content = std::fs::read_to_string(&target)
                    .with_context(|| format!("Failed to read: {}", target.display()))?;
                let pattern = pattern.as_deref().unwrap_or(probe::HEADING_PATTERN);
                let count = probe::count_matches(&content, pattern)?;
                Ok((
                    count >= *min,
                    format!("{file} has {count} sections (minimum {min})"),
                ))
            }

            CheckRule::FileCount { pattern, min } => {
                // Count in the stage output directory; fall back to the
                // project root when the stage produced nothing matching.
                let mut count = probe::count_files(stage_output_dir, pattern)?;
                if count == 0 {
                    count = probe::count_files(&self.project_root, pattern)?;
                }
                Ok((
                    count >= *min,
                    format!("{count} files match '{pattern}' (minimum {min})"),
                ))
            }

            CheckRule::ComponentCount { file, pattern, min } => {
                let target = probe::resolve_target(stage_output_dir, &self.project_root, file);
                if !probe::file_exists(&target) {
                    return Ok((false, format!("{file} not found")));
                }
                let content = std::fs::read_to_string(&target)
                    .with_context(|| format!("Failed to read: {}", target.display()))?;
                let count = probe::count_matches(&content, pattern)?;
                Ok((
                    count >= *min,
                    format!("{file} has {count} matches of '{pattern}' (minimum {min})"),
                ))
            }

            CheckRule::Command {
                command,
                timeout_secs,
                min_pass_rate,
            } => {
                let timeout = timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(self.command_timeout);
                let result = process::run_shell(command, Some(&self.project_root), timeout)?;

                if result.timed_out {
                    return Ok((
                        false,
                        format!("'{command}' timed out after {}s", timeout.as_secs()),
                    ));
                }

                if let Some(threshold) = min_pass_rate {
                    if let Some((pass, fail)) = parse_pass_counts(&result.combined_output()) {
                        let rate = pass as f64 / (pass + fail) as f64;
                        return Ok((
                            rate >= *threshold,
                            format!(
                                "'{command}' pass rate {rate:.2} ({pass} pass / {fail} fail, minimum {threshold:.2})"
                            ),
                        ));
                    }
                    // No counts in the output; fall through to the exit code.
                }

                if result.success() {
                    Ok((true, format!("'{command}' exited 0")))
                } else {
                    Ok((
                        false,
                        format!("'{command}' failed with exit code {:?}", result.exit_code),
                    ))
                }
            }
        }
    }
}

/// Extract `N pass` / `N fail` counts from command output.
///
/// Takes the last occurrence of each so summary lines win over incremental
/// progress output. Returns None unless at least one count is present.
fn parse_pass_counts(output: &str) -> Option<(u64, u64)> {
    let pass_re = Regex::new(r"(?i)(\d+)\s+pass(?:ed|ing)?\b").ok()?;
    let fail_re = Regex::new(r"(?i)(\d+)\s+fail(?:ed|ing)?\b").ok()?;

    let last_count = |re: &Regex| {
        re.captures_iter(output)
            .filter_map(|c| c.get(1)?.as_str().parse::<u64>().ok())
            .last()
    };

    let pass = last_count(&pass_re);
    let fail = last_count(&fail_re);
    match (pass, fail) {
        (None, None) => None,
        (pass, fail) => {
            let pass = pass.unwrap_or(0);
            let fail = fail.unwrap_or(0);
            if pass + fail == 0 {
                None
            } else {
                Some((pass, fail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pass_counts() {
        assert_eq!(parse_pass_counts("7 passed, 1 failed"), Some((7, 1)));
        assert_eq!(parse_pass_counts("12 pass / 0 fail"), Some((12, 0)));
        assert_eq!(parse_pass_counts("3 failing"), Some((0, 3)));
        assert_eq!(parse_pass_counts("no counts here"), None);
        assert_eq!(parse_pass_counts("0 passed, 0 failed"), None);
    }

    #[test]
    fn test_parse_pass_counts_takes_summary_line() {
        let output = "1 passed\n2 passed\nfinal: 9 passed, 1 failed\n";
        assert_eq!(parse_pass_counts(output), Some((9, 1)));
    }
}
