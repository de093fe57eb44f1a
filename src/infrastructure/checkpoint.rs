//! Durable checkpoint documents for cross-run resume.
//!
//! All run state lives under a project-local state directory (default
//! `.lectern/`): the ledger document and a small checkpoint document naming
//! the last completed book, cumulative spend, and the ledger's location.
//! Writes are atomic (temp file + rename) so a crash mid-write leaves the
//! previous checkpoint intact.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::{PipelineError, PipelineResult};

/// Persisted checkpoint document. Unknown fields are ignored on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointDocument {
    /// Index of the last fully completed book in the configured reading
    /// list, or `None` when the run stopped before completing any book.
    /// Resume continues at `book_index + 1` (or at 0).
    pub book_index: Option<usize>,
    /// Identity of that book, so resume can detect a reading list that no
    /// longer matches the indexes in this document.
    #[serde(default)]
    pub book: Option<String>,
    pub spent: f64,
    pub iteration_budget_used: u32,
    pub timestamp: DateTime<Utc>,
    /// Location of the ledger snapshot taken with this checkpoint.
    pub ledger_path: PathBuf,
}

/// File-backed store for the ledger and checkpoint documents.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    state_dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.state_dir.join("ledger.json")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.state_dir.join("checkpoint.json")
    }

    /// Persist a checkpoint document atomically.
    pub fn save(&self, doc: &CheckpointDocument) -> PipelineResult<()> {
        fs::create_dir_all(&self.state_dir)?;
        let path = self.checkpoint_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(doc)?)?;
        fs::rename(&tmp, &path)?;
        debug!(
            book_index = ?doc.book_index,
            spent = doc.spent,
            path = %path.display(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// Load the latest checkpoint, or `None` when no run has checkpointed
    /// yet. A malformed document is fatal.
    pub fn load(&self) -> PipelineResult<Option<CheckpointDocument>> {
        let path = self.checkpoint_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let doc =
            serde_json::from_str(&raw).map_err(|e| PipelineError::CheckpointCorrupted {
                path,
                reason: e.to_string(),
            })?;
        Ok(Some(doc))
    }
}
