//! File system paths for the client core.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Durable credential database filename under the base directory.
const CREDENTIALS_DB_NAME: &str = "credentials.sqlite";

/// Manages file system paths for the client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for client state (~/.cropwatch)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.cropwatch`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".cropwatch"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.cropwatch).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.cropwatch/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the durable credential store path (~/.cropwatch/credentials.sqlite).
    pub fn credentials_db(&self) -> PathBuf {
        self.base_dir.join(CREDENTIALS_DB_NAME)
    }

    /// Get the logs directory (~/.cropwatch/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.cropwatch/logs/client.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("client.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
