//! File system locations used by the state-sync tooling.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths rooted at one base directory.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.state-sync)
    base_dir: PathBuf,
}

impl Paths {
    /// Paths rooted at `~/.state-sync`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".state-sync"),
        })
    }

    /// Paths rooted at a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Config file (`<base>/config.json`).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Default durable state database (`<base>/state.sqlite`).
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("state.sqlite")
    }

    /// Logs directory (`<base>/logs`).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// JSONL log file (`<base>/logs/state-sync.jsonl`).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("state-sync.jsonl")
    }

    /// Create the base and logs directories if missing.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
