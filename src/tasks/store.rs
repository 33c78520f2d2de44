//! Persistence for the task list.
//!
//! The store owns one path (`.taskmaster/tasks.json` by default) and
//! reads/writes the whole document. Writes are atomic: serialize to a
//! sibling temp file, then rename over the target.

use crate::tasks::model::TaskFile;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Reads and writes the `tasks.json` document.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the task file, or an empty one if it doesn't exist yet.
    pub fn load_or_default(&self) -> Result<TaskFile> {
        if !self.path.exists() {
            return Ok(TaskFile::default());
        }
        self.load()
    }

    pub fn load(&self) -> Result<TaskFile> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read task file: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse task file: {}", self.path.display()))
    }

    pub fn save(&self, file: &TaskFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create task directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string_pretty(file).context("Failed to serialize task file")?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write task file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace task file: {}", self.path.display()))?;
        Ok(())
    }
}
