//! Persistence layer.
//!
//! Checkpoints are an append-only audit log stored as a JSON array file.
//! User progress is a separate read-only JSON document maintained by the
//! outer application. SQLite can be added later for full session history,
//! but JSON files cover the checkpoint requirement.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{Checkpoint, StrideError, UserProgress};

/// Abstraction over the checkpoint log and progress store so orchestrators
/// never touch the filesystem directly.
pub trait CheckpointStore: Send + Sync {
    /// Append one checkpoint to the audit log.
    fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Most recently appended checkpoint, if any.
    fn load_latest_checkpoint(&self) -> Result<Option<Checkpoint>>;

    /// User progress markers; empty progress when none recorded yet.
    fn load_user_progress(&self) -> Result<UserProgress>;
}

/// File-backed store: checkpoints as a pretty-printed JSON array,
/// progress as a standalone JSON document.
pub struct JsonCheckpointStore {
    checkpoint_path: PathBuf,
    progress_path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(checkpoint_path: &str, progress_path: &str) -> Self {
        Self {
            checkpoint_path: PathBuf::from(checkpoint_path),
            progress_path: PathBuf::from(progress_path),
        }
    }

    fn read_all(&self) -> Result<Vec<Checkpoint>> {
        if !self.checkpoint_path.exists() {
            return Ok(Vec::new());
        }
        let json = std::fs::read_to_string(&self.checkpoint_path).map_err(|e| {
            StrideError::Storage(format!(
                "failed to read checkpoints from {}: {e}",
                self.checkpoint_path.display()
            ))
        })?;
        let checkpoints: Vec<Checkpoint> = serde_json::from_str(&json).map_err(|e| {
            StrideError::Storage(format!(
                "failed to parse checkpoints from {}: {e}",
                self.checkpoint_path.display()
            ))
        })?;
        Ok(checkpoints)
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn append_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut checkpoints = self.read_all()?;
        checkpoints.push(checkpoint.clone());

        if let Some(parent) = self.checkpoint_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StrideError::Storage(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&checkpoints)
            .map_err(|e| StrideError::Storage(format!("failed to serialise checkpoint log: {e}")))?;
        std::fs::write(&self.checkpoint_path, &json).map_err(|e| {
            StrideError::Storage(format!(
                "failed to write checkpoints to {}: {e}",
                self.checkpoint_path.display()
            ))
        })?;

        debug!(step = %checkpoint.step, state = %checkpoint.state, "Checkpoint saved");
        Ok(())
    }

    fn load_latest_checkpoint(&self) -> Result<Option<Checkpoint>> {
        let checkpoints = self.read_all()?;
        Ok(checkpoints.into_iter().last())
    }

    fn load_user_progress(&self) -> Result<UserProgress> {
        if !Path::new(&self.progress_path).exists() {
            info!(path = %self.progress_path.display(), "No progress file found, starting fresh");
            return Ok(UserProgress::default());
        }
        let json = std::fs::read_to_string(&self.progress_path).map_err(|e| {
            StrideError::Storage(format!(
                "failed to read progress from {}: {e}",
                self.progress_path.display()
            ))
        })?;
        let progress: UserProgress = serde_json::from_str(&json).map_err(|e| {
            StrideError::Storage(format!(
                "failed to parse progress from {}: {e}",
                self.progress_path.display()
            ))
        })?;
        Ok(progress)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
