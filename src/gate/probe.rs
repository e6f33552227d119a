//! Stateless artifact probes.
//!
//! Pure filesystem and text checks with no knowledge of stages, severity, or
//! aggregation. Target paths resolve against the stage output directory
//! first, falling back to the project root.

use anyhow::{Context, Result};
use regex::RegexBuilder;
use std::path::{Path, PathBuf};

/// Resolve a check target: stage output directory first, project root as
/// fallback. When the target exists in neither, the stage-relative path is
/// returned so failure messages point at the expected location.
pub fn resolve_target(stage_output_dir: &Path, project_root: &Path, relative: &str) -> PathBuf {
    let in_stage = stage_output_dir.join(relative);
    if in_stage.exists() {
        return in_stage;
    }
    let in_root = project_root.join(relative);
    if in_root.exists() {
        in_root
    } else {
        in_stage
    }
}

pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Directory exists and has at least one entry.
pub fn directory_not_empty(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    let mut entries = std::fs::read_dir(path)
        .with_context(|| format!("Failed to read directory: {}", path.display()))?;
    Ok(entries.next().is_some())
}

/// Case-insensitive level 1-3 markdown heading match for a section name.
pub fn section_present(content: &str, section: &str) -> Result<bool> {
    let pattern = format!(r"^#{{1,3}}.*{}", regex::escape(section));
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .with_context(|| format!("Invalid section pattern for: {section}"))?;
    Ok(re.is_match(content))
}

/// Count regex matches in text (case-insensitive, multi-line).
pub fn count_matches(content: &str, pattern: &str) -> Result<usize> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .with_context(|| format!("Invalid count pattern: {pattern}"))?;
    Ok(re.find_iter(content).count())
}

/// Default heading pattern for section counting.
pub const HEADING_PATTERN: &str = r"^#{1,3}\s";

/// Count files under `base` matching a glob pattern.
pub fn count_files(base: &Path, pattern: &str) -> Result<usize> {
    let full_pattern = base.join(pattern);
    let full_pattern = full_pattern
        .to_str()
        .with_context(|| format!("Glob base path is not valid UTF-8: {}", base.display()))?;
    let entries =
        glob::glob(full_pattern).with_context(|| format!("Invalid glob pattern: {pattern}"))?;
    let mut count = 0;
    for entry in entries {
        let path = entry.with_context(|| format!("Failed to read glob entry for: {pattern}"))?;
        if path.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
