//! Shared command helpers.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Locate the project root by walking up from the current directory until a
/// `.work` directory is found.
pub fn find_project_root() -> Result<PathBuf> {
    let mut dir = std::env::current_dir().context("Failed to get current directory")?;
    loop {
        if dir.join(".work").is_dir() {
            return Ok(dir);
        }
        if !dir.pop() {
            bail!(
                ".work directory not found in this directory or any parent. Run 'stagehand init <plan>' first."
            );
        }
    }
}
