//! Project work directory layout and runtime configuration.
//!
//! All pipeline state lives under `.work/` in the project root:
//!
//! - `progress.json` - persisted pipeline position (see models::progress)
//! - `config.toml` - runtime settings, written at init
//! - `outputs/<stage-id>/` - stage artifact directories
//! - `validations/<stage-id>/` - immutable quality gate audit records
//! - `history/` - append-only transition log
//! - `checkpoints/<id>/` - snapshot directories

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SUBDIRS: [&str; 4] = ["outputs", "validations", "history", "checkpoints"];

pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new<P: AsRef<Path>>(project_root: P) -> Self {
        Self {
            root: project_root.as_ref().join(".work"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }

    /// Create the work directory skeleton. Fails if it already exists.
    pub fn initialize(&self) -> Result<()> {
        if self.root.exists() {
            bail!(".work directory already exists (use --clean to re-initialize)");
        }

        fs::create_dir_all(&self.root).context("Failed to create .work directory")?;
        for subdir in &SUBDIRS {
            fs::create_dir(self.root.join(subdir))
                .with_context(|| format!("Failed to create {subdir} directory"))?;
        }
        Ok(())
    }

    /// Open an existing work directory, repairing missing subdirectories.
    pub fn load(&self) -> Result<()> {
        if !self.root.exists() {
            bail!(".work directory does not exist. Run 'stagehand init <plan>' first.");
        }
        for subdir in &SUBDIRS {
            let path = self.root.join(subdir);
            if !path.exists() {
                fs::create_dir(&path)
                    .with_context(|| format!("Failed to create missing directory: {subdir}"))?;
            }
        }
        Ok(())
    }

    pub fn progress_path(&self) -> PathBuf {
        self.root.join("progress.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn outputs_root(&self) -> PathBuf {
        self.root.join("outputs")
    }

    pub fn outputs_dir(&self, stage_id: &str) -> PathBuf {
        self.outputs_root().join(stage_id)
    }

    pub fn validations_dir(&self) -> PathBuf {
        self.root.join("validations")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.root.join("history")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    /// Create the per-stage output directories for a stage id list.
    pub fn ensure_stage_output_dirs(&self, stage_ids: &[String]) -> Result<()> {
        for id in stage_ids {
            let dir = self.outputs_dir(id);
            if !dir.exists() {
                fs::create_dir_all(&dir).with_context(|| {
                    format!("Failed to create stage output directory: {}", dir.display())
                })?;
            }
        }
        Ok(())
    }
}

fn default_command_timeout() -> u64 {
    300
}

fn default_producer_timeout() -> u64 {
    600
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retain() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// Pipeline runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Path of the plan document this project was initialized from.
    pub plan_path: PathBuf,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_producer_timeout")]
    pub producer_timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Checkpoint retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSettings {
    #[serde(default = "default_retain")]
    pub retain: usize,

    /// Create a milestone checkpoint automatically when a stage completes.
    #[serde(default = "default_true")]
    pub on_complete: bool,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            retain: default_retain(),
            on_complete: default_true(),
        }
    }
}

/// Runtime configuration, stored at `.work/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub checkpoints: CheckpointSettings,
}

impl Config {
    pub fn new(plan_path: PathBuf) -> Self {
        Self {
            pipeline: PipelineSettings {
                plan_path,
                command_timeout_secs: default_command_timeout(),
                producer_timeout_secs: default_producer_timeout(),
                max_attempts: default_max_attempts(),
            },
            checkpoints: CheckpointSettings::default(),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.command_timeout_secs)
    }

    pub fn producer_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.producer_timeout_secs)
    }
}

/// Load config.toml if present.
pub fn load_config(work_dir: &WorkDir) -> Result<Option<Config>> {
    let path = work_dir.config_path();
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(Some(config))
}

/// Load config.toml, failing if absent.
pub fn load_config_required(work_dir: &WorkDir) -> Result<Config> {
    load_config(work_dir)?.ok_or_else(|| {
        anyhow::anyhow!(
            "Missing config: {}. Run 'stagehand init <plan>' first.",
            work_dir.config_path().display()
        )
    })
}

pub fn save_config(work_dir: &WorkDir, config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    super::atomic::write_atomic(&work_dir.config_path(), &content)
}
