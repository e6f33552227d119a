//! Append-only audit trails: stage transitions and quality gate records.
//!
//! Transition history is a JSONL file; each gate evaluation is stored as its
//! own timestamped JSON document under `validations/<stage-id>/`. Records
//! are appended, never overwritten.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use super::work_dir::WorkDir;
use crate::gate::result::QualityResult;

/// One entry in the stage transition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: String,
    pub to: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

impl TransitionRecord {
    pub fn new(from: impl Into<String>, to: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
            at: Utc::now(),
        }
    }
}

fn transitions_path(work_dir: &WorkDir) -> PathBuf {
    work_dir.history_dir().join("transitions.jsonl")
}

/// Append a transition to the history log.
pub fn append_transition(work_dir: &WorkDir, record: &TransitionRecord) -> Result<()> {
    let path = transitions_path(work_dir);
    let line = serde_json::to_string(record).context("Failed to serialize transition record")?;
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .with_context(|| format!("Failed to open transition history: {}", path.display()))?;
    writeln!(file, "{line}")
        .with_context(|| format!("Failed to append transition: {}", path.display()))?;
    Ok(())
}

/// Read the full transition history, oldest first. Unparseable lines are
/// skipped with a warning rather than failing the whole read.
pub fn read_transitions(work_dir: &WorkDir) -> Result<Vec<TransitionRecord>> {
    let path = transitions_path(work_dir);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read transition history: {}", path.display()))?;

    let mut records = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<TransitionRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => eprintln!("Warning: skipping malformed transition record: {e}"),
        }
    }
    Ok(records)
}

fn stage_validations_dir(work_dir: &WorkDir, stage_id: &str) -> PathBuf {
    work_dir.validations_dir().join(stage_id)
}

/// Persist a quality result as an immutable timestamped record.
pub fn store_validation(work_dir: &WorkDir, result: &QualityResult) -> Result<PathBuf> {
    let dir = stage_validations_dir(work_dir, &result.stage_id);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create validations directory: {}", dir.display()))?;

    // Millisecond timestamp plus a disambiguating suffix keeps records
    // append-only even for back-to-back evaluations.
    let stamp = result.evaluated_at.format("%Y%m%dT%H%M%S%3f");
    let mut path = dir.join(format!("{stamp}.json"));
    if path.exists() {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        path = dir.join(format!("{stamp}-{}.json", &suffix[..6]));
    }

    let content =
        serde_json::to_string_pretty(result).context("Failed to serialize quality result")?;
    super::atomic::write_atomic(&path, &content)?;
    Ok(path)
}

/// All stored quality results for a stage, oldest first.
pub fn list_validations(work_dir: &WorkDir, stage_id: &str) -> Result<Vec<QualityResult>> {
    let dir = stage_validations_dir(work_dir, stage_id);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let paths: Vec<PathBuf> = fs::read_dir(&dir)
        .with_context(|| format!("Failed to read validations directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();

    let mut results = Vec::new();
    for path in paths {
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<QualityResult>(&content) {
                Ok(result) => results.push(result),
                Err(e) => {
                    eprintln!(
                        "Warning: skipping malformed validation record {}: {e}",
                        path.display()
                    );
                }
            },
            Err(e) => {
                eprintln!(
                    "Warning: failed to read validation record {}: {e}",
                    path.display()
                );
            }
        }
    }
    // Filename timestamps are millisecond-truncated; the embedded timestamp
    // keeps full precision, so order by it.
    results.sort_by_key(|r| r.evaluated_at);
    Ok(results)
}

/// The most recent quality result for a stage, if any.
pub fn latest_validation(work_dir: &WorkDir, stage_id: &str) -> Result<Option<QualityResult>> {
    Ok(list_validations(work_dir, stage_id)?.into_iter().last())
}
