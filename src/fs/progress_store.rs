//! The single gateway for progress persistence.
//!
//! All reads and writes of `.work/progress.json` go through `ProgressStore`;
//! components never mutate a loaded `Progress` and expect it to stick
//! without calling `save`. Writes are whole-file read-modify-write with
//! atomic replace, serialized against other cooperating processes by an
//! advisory lock on a sidecar file. A corrupt or missing progress file is
//! `StateCorruption`: always fatal, never silently reset.

use anyhow::{Context, Result};
use chrono::Utc;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use super::atomic::write_atomic;
use super::work_dir::WorkDir;
use crate::models::{PipelineError, Progress};

pub struct ProgressStore {
    progress_path: PathBuf,
    lock_path: PathBuf,
}

impl ProgressStore {
    pub fn new(work_dir: &WorkDir) -> Self {
        Self {
            progress_path: work_dir.progress_path(),
            lock_path: work_dir.root().join("progress.lock"),
        }
    }

    pub fn exists(&self) -> bool {
        self.progress_path.exists()
    }

    fn acquire_lock(&self) -> Result<File> {
        let lock = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .with_context(|| format!("Failed to open lock file: {}", self.lock_path.display()))?;
        lock.lock_exclusive()
            .with_context(|| format!("Failed to acquire lock: {}", self.lock_path.display()))?;
        Ok(lock)
    }

    /// Load the progress document.
    pub fn load(&self) -> Result<Progress> {
        if !self.progress_path.exists() {
            return Err(PipelineError::StateCorruption {
                detail: format!(
                    "{} not found; run 'stagehand init <plan>' to re-initialize",
                    self.progress_path.display()
                ),
            }
            .into());
        }

        let lock = self.acquire_lock()?;
        let content = std::fs::read_to_string(&self.progress_path)
            .with_context(|| format!("Failed to read: {}", self.progress_path.display()));
        let _ = FileExt::unlock(&lock);

        let progress: Progress =
            serde_json::from_str(&content?).map_err(|e| PipelineError::StateCorruption {
                detail: format!(
                    "{} is not valid progress state ({e}); run 'stagehand init <plan> --clean' to re-initialize",
                    self.progress_path.display()
                ),
            })?;
        Ok(progress)
    }

    /// Persist the progress document, stamping `updated_at`.
    pub fn save(&self, progress: &mut Progress) -> Result<()> {
        progress.updated_at = Utc::now();
        let content =
            serde_json::to_string_pretty(progress).context("Failed to serialize progress")?;

        let lock = self.acquire_lock()?;
        let result = write_atomic(&self.progress_path, &content);
        let _ = FileExt::unlock(&lock);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EpicCycleState, PipelineError, StageStatus};
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> ProgressStore {
        let work = WorkDir::new(temp.path());
        work.initialize().unwrap();
        ProgressStore::new(&work)
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let ids = vec!["01-planning".to_string(), "02-design".to_string()];
        let mut progress = Progress::for_stages(&ids, 1, EpicCycleState::disabled());
        progress
            .transition_stage("01-planning", StageStatus::InProgress)
            .unwrap();
        store.save(&mut progress).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.current_stage, "01-planning");
        assert_eq!(
            loaded.stage_status("01-planning"),
            Some(StageStatus::InProgress)
        );
    }

    #[test]
    fn test_missing_progress_is_state_corruption() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let err = store.load().unwrap_err();
        let pipeline_err = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(
            pipeline_err,
            PipelineError::StateCorruption { .. }
        ));
    }

    #[test]
    fn test_corrupt_progress_is_state_corruption() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        std::fs::write(temp.path().join(".work/progress.json"), "{not json").unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::StateCorruption { .. })
        ));
    }

    #[test]
    fn test_save_stamps_updated_at() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let ids = vec!["01-planning".to_string()];
        let mut progress = Progress::for_stages(&ids, 1, EpicCycleState::disabled());
        let created = progress.updated_at;
        store.save(&mut progress).unwrap();
        assert!(progress.updated_at >= created);
    }
}
