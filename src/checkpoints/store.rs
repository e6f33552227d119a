//! Checkpoint creation, restore, listing, retention.
//!
//! All copying happens into a fresh isolated directory before the metadata
//! commit, so a failed create never corrupts live state and never shows up
//! in `list()`. Restore is the inverse copy, full or file-by-file.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::types::{CheckpointKind, CheckpointMeta, IncludeSet};
use crate::fs::{write_atomic, WorkDir};
use crate::models::PipelineError;

const METADATA_FILE: &str = "metadata.json";

/// How much of a checkpoint to restore.
#[derive(Debug, Clone)]
pub enum RestoreMode {
    /// Overwrite the live trees for every captured include set.
    Full,
    /// Overwrite only the named manifest paths.
    Partial(Vec<String>),
}

pub struct CheckpointStore {
    work_dir: WorkDir,
}

impl CheckpointStore {
    pub fn new(project_root: &Path) -> Self {
        Self {
            work_dir: WorkDir::new(project_root),
        }
    }

    fn checkpoint_dir(&self, id: &str) -> PathBuf {
        self.work_dir.checkpoints_dir().join(id)
    }

    /// Create a checkpoint of the selected artifact sets.
    ///
    /// Metadata is written last: a directory without `metadata.json` is an
    /// incomplete checkpoint and is invisible to `list()`. On any failure
    /// the partial directory is removed.
    pub fn create(
        &self,
        stage_id: &str,
        description: Option<String>,
        kind: CheckpointKind,
        include: IncludeSet,
    ) -> Result<CheckpointMeta> {
        let id = generate_id(stage_id);
        let cp_dir = self.checkpoint_dir(&id);

        let commit = (|| -> Result<CheckpointMeta> {
            fs::create_dir_all(&cp_dir).with_context(|| {
                format!("Failed to create checkpoint directory: {}", cp_dir.display())
            })?;

            let manifest = self.capture(&cp_dir, &include)?;

            let meta = CheckpointMeta {
                id: id.clone(),
                stage_id: stage_id.to_string(),
                description,
                kind,
                include,
                manifest,
                created_at: Utc::now(),
            };
            let content = serde_json::to_string_pretty(&meta)
                .context("Failed to serialize checkpoint metadata")?;
            write_atomic(&cp_dir.join(METADATA_FILE), &content)?;
            Ok(meta)
        })();

        match commit {
            Ok(meta) => {
                debug!(id = %meta.id, stage = stage_id, "checkpoint created");
                Ok(meta)
            }
            Err(e) => {
                // Leave no partial checkpoint behind
                let _ = fs::remove_dir_all(&cp_dir);
                Err(e)
            }
        }
    }

    fn capture(&self, cp_dir: &Path, include: &IncludeSet) -> Result<Vec<String>> {
        let mut manifest = Vec::new();
        let root = self.work_dir.root();

        if include.state {
            copy_file_if_exists(
                &self.work_dir.progress_path(),
                &cp_dir.join("state/progress.json"),
                "state/progress.json",
                &mut manifest,
            )?;
            copy_tree(
                &self.work_dir.history_dir(),
                &cp_dir.join("state/history"),
                "state/history",
                &mut manifest,
            )?;
            copy_tree(
                &self.work_dir.validations_dir(),
                &cp_dir.join("state/validations"),
                "state/validations",
                &mut manifest,
            )?;
        }

        if include.stage_outputs {
            copy_tree(
                &self.work_dir.outputs_root(),
                &cp_dir.join("outputs"),
                "outputs",
                &mut manifest,
            )?;
        }

        if include.config {
            copy_file_if_exists(
                &self.work_dir.config_path(),
                &cp_dir.join("config/config.toml"),
                "config/config.toml",
                &mut manifest,
            )?;
        }

        debug!(
            checkpoint = %cp_dir.display(),
            files = manifest.len(),
            root = %root.display(),
            "captured artifact sets"
        );
        Ok(manifest)
    }

    fn load_meta(&self, id: &str) -> Result<CheckpointMeta> {
        let path = self.checkpoint_dir(id).join(METADATA_FILE);
        if !path.exists() {
            bail!("Checkpoint '{id}' does not exist");
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read checkpoint metadata: {}", path.display()))?;
        serde_json::from_str(&content).map_err(|e| {
            PipelineError::StateCorruption {
                detail: format!("checkpoint '{id}' has invalid metadata: {e}"),
            }
            .into()
        })
    }

    /// Restore a checkpoint into the live trees.
    ///
    /// Full restore replaces every captured tree wholesale so the result is
    /// byte-identical to the capture. Partial restore overwrites only the
    /// named manifest paths, leaving everything else untouched.
    pub fn restore(&self, id: &str, mode: &RestoreMode) -> Result<()> {
        let meta = self.load_meta(id)?;
        let cp_dir = self.checkpoint_dir(id);

        match mode {
            RestoreMode::Full => {
                if meta.include.state {
                    restore_tree(&cp_dir.join("state/history"), &self.work_dir.history_dir())?;
                    restore_tree(
                        &cp_dir.join("state/validations"),
                        &self.work_dir.validations_dir(),
                    )?;
                    restore_file(
                        &cp_dir.join("state/progress.json"),
                        &self.work_dir.progress_path(),
                    )?;
                }
                if meta.include.stage_outputs {
                    restore_tree(&cp_dir.join("outputs"), &self.work_dir.outputs_root())?;
                }
                if meta.include.config {
                    restore_file(
                        &cp_dir.join("config/config.toml"),
                        &self.work_dir.config_path(),
                    )?;
                }
            }
            RestoreMode::Partial(files) => {
                for file in files {
                    if !meta.manifest.iter().any(|m| m == file) {
                        bail!(
                            "'{file}' is not in checkpoint '{id}' (see its manifest with 'stagehand checkpoint list')"
                        );
                    }
                    let src = cp_dir.join(file);
                    let dst = self.live_target(file).ok_or_else(|| {
                        anyhow::anyhow!("'{file}' has no live location (unknown prefix)")
                    })?;
                    restore_file(&src, &dst)?;
                }
            }
        }

        debug!(id = id, "checkpoint restored");
        Ok(())
    }

    /// Map a manifest path to its live location under `.work/`.
    fn live_target(&self, manifest_path: &str) -> Option<PathBuf> {
        let root = self.work_dir.root();
        if let Some(rest) = manifest_path.strip_prefix("state/") {
            Some(root.join(rest))
        } else if manifest_path.starts_with("outputs/") {
            Some(root.join(manifest_path))
        } else if let Some(rest) = manifest_path.strip_prefix("config/") {
            Some(root.join(rest))
        } else {
            None
        }
    }

    /// All complete checkpoints, newest first.
    pub fn list(&self) -> Result<Vec<CheckpointMeta>> {
        let dir = self.work_dir.checkpoints_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Failed to read checkpoints directory: {}", dir.display()))?
        {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let meta_path = entry.path().join(METADATA_FILE);
            if !meta_path.exists() {
                // Incomplete or in-flight checkpoint; not visible
                continue;
            }
            match fs::read_to_string(&meta_path)
                .map_err(anyhow::Error::from)
                .and_then(|c| serde_json::from_str::<CheckpointMeta>(&c).map_err(Into::into))
            {
                Ok(meta) => checkpoints.push(meta),
                Err(e) => {
                    warn!(path = %meta_path.display(), "skipping unreadable checkpoint: {e}");
                }
            }
        }

        checkpoints.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(checkpoints)
    }

    /// Delete a checkpoint. Milestones are protected unless forced.
    pub fn delete(&self, id: &str, force: bool) -> Result<()> {
        let meta = self.load_meta(id)?;
        if meta.is_milestone() && !force {
            return Err(PipelineError::RetentionViolation { id: id.to_string() }.into());
        }
        fs::remove_dir_all(self.checkpoint_dir(id))
            .with_context(|| format!("Failed to delete checkpoint: {id}"))?;
        Ok(())
    }

    /// Apply the retention policy: keep at most `max_retain` checkpoints,
    /// deleting the oldest first. Milestone checkpoints are never
    /// auto-deleted and count against the retention budget.
    ///
    /// Returns the ids that were deleted. Idempotent: running it twice with
    /// no new checkpoints deletes nothing the second time.
    pub fn cleanup(&self, max_retain: usize, preserve_milestones: bool) -> Result<Vec<String>> {
        let all = self.list()?;

        let (protected, expendable): (Vec<_>, Vec<_>) = all
            .into_iter()
            .partition(|c| preserve_milestones && c.is_milestone());

        let slots = max_retain.saturating_sub(protected.len());

        // `expendable` is newest-first; everything past the remaining slots goes
        let mut deleted = Vec::new();
        for meta in expendable.into_iter().skip(slots) {
            fs::remove_dir_all(self.checkpoint_dir(&meta.id))
                .with_context(|| format!("Failed to delete checkpoint: {}", meta.id))?;
            deleted.push(meta.id);
        }
        Ok(deleted)
    }
}

fn generate_id(stage_id: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{timestamp}-{stage_id}-{}", &suffix[..6])
}

fn copy_file_if_exists(
    src: &Path,
    dst: &Path,
    manifest_path: &str,
    manifest: &mut Vec<String>,
) -> Result<()> {
    if !src.is_file() {
        return Ok(());
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    manifest.push(manifest_path.to_string());
    Ok(())
}

/// Recursively copy a directory tree, recording every file in the manifest.
fn copy_tree(src: &Path, dst: &Path, prefix: &str, manifest: &mut Vec<String>) -> Result<()> {
    if !src.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create directory: {}", dst.display()))?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read: {}", src.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let child_prefix = format!("{prefix}/{name_str}");
        let src_child = entry.path();
        let dst_child = dst.join(&name);

        if src_child.is_dir() {
            copy_tree(&src_child, &dst_child, &child_prefix, manifest)?;
        } else {
            fs::copy(&src_child, &dst_child).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    src_child.display(),
                    dst_child.display()
                )
            })?;
            manifest.push(child_prefix);
        }
    }
    Ok(())
}

/// Replace a live tree with its captured copy.
fn restore_tree(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        return Ok(());
    }
    if dst.exists() {
        fs::remove_dir_all(dst)
            .with_context(|| format!("Failed to clear directory for restore: {}", dst.display()))?;
    }
    let mut manifest = Vec::new();
    copy_tree(src, dst, "", &mut manifest)
}

fn restore_file(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_file() {
        return Ok(());
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("Failed to restore {} to {}", src.display(), dst.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(temp: &TempDir) -> CheckpointStore {
        let work = WorkDir::new(temp.path());
        work.initialize().unwrap();
        fs::write(work.progress_path(), "{\"fake\": true}").unwrap();
        let stage_dir = work.outputs_dir("01-planning");
        fs::create_dir_all(&stage_dir).unwrap();
        fs::write(stage_dir.join("architecture.md"), "# Architecture\n").unwrap();
        CheckpointStore::new(temp.path())
    }

    #[test]
    fn test_create_lists_and_restores() {
        let temp = TempDir::new().unwrap();
        let store = setup(&temp);

        let meta = store
            .create("01-planning", None, CheckpointKind::Manual, IncludeSet::default())
            .unwrap();
        assert!(meta.manifest.contains(&"state/progress.json".to_string()));
        assert!(meta
            .manifest
            .contains(&"outputs/01-planning/architecture.md".to_string()));

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, meta.id);
    }

    #[test]
    fn test_restore_missing_id_fails_loudly() {
        let temp = TempDir::new().unwrap();
        let store = setup(&temp);
        let err = store.restore("no-such-id", &RestoreMode::Full).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_incomplete_checkpoint_invisible() {
        let temp = TempDir::new().unwrap();
        let store = setup(&temp);

        // A directory without metadata.json is an in-flight or failed create
        fs::create_dir_all(store.checkpoint_dir("partial-123")).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_delete_milestone_rejected() {
        let temp = TempDir::new().unwrap();
        let store = setup(&temp);

        let meta = store
            .create(
                "01-planning",
                None,
                CheckpointKind::Milestone,
                IncludeSet::default(),
            )
            .unwrap();

        let err = store.delete(&meta.id, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::RetentionViolation { .. })
        ));

        store.delete(&meta.id, true).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_partial_restore_rejects_unknown_file() {
        let temp = TempDir::new().unwrap();
        let store = setup(&temp);
        let meta = store
            .create("01-planning", None, CheckpointKind::Manual, IncludeSet::default())
            .unwrap();

        let err = store
            .restore(
                &meta.id,
                &RestoreMode::Partial(vec!["outputs/01-planning/nope.md".to_string()]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("not in checkpoint"));
    }
}
