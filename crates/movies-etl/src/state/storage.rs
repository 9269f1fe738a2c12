//! JSON-on-disk persistence for [`PipelineState`]
//!
//! Plain read-then-overwrite semantics, no locking: the pipeline is designed
//! to run as exactly one process per state file. A missing, empty, or
//! unparseable file means "all cursors at zero", never a startup failure.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::PipelineState;
use crate::error::Result;

/// Handle on the persisted state file
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the pipeline state, falling back to empty cursors
    pub fn load(&self) -> PipelineState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!(
                    "State file {} not readable ({}), starting with empty cursors",
                    self.path.display(),
                    e
                );
                return PipelineState::default();
            },
        };

        if content.trim().is_empty() {
            return PipelineState::default();
        }

        match serde_json::from_str::<PipelineState>(&content) {
            Ok(state) if state.is_consistent() => state,
            Ok(_) => {
                warn!(
                    "State file {} holds an inconsistent cursor, resetting to empty",
                    self.path.display()
                );
                PipelineState::default()
            },
            Err(e) => {
                warn!(
                    "State file {} is not valid JSON ({}), resetting to empty",
                    self.path.display(),
                    e
                );
                PipelineState::default()
            },
        }
    }

    /// Persist the pipeline state, synchronously overwriting the file
    pub fn save(&self, state: &PipelineState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, json)?;
        debug!("Persisted pipeline state to {}", self.path.display());
        Ok(())
    }
}
