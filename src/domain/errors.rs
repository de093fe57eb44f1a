//! Domain errors for the Lectern pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::ports::AnalystError;

/// Pipeline-level errors.
///
/// Failures local to one book (analyst timeouts, malformed responses) are
/// handled inside the convergence controller and surface as a
/// [`BookOutcome::Errored`](crate::domain::models::BookOutcome) entry in the
/// run report, not as one of these variants. Everything here touches shared
/// state and aborts the run after a checkpoint attempt.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("budget exhausted while processing '{book}': spent {spent:.2} of ceiling {ceiling:.2}")]
    BudgetExhausted { book: String, spent: f64, ceiling: f64 },

    #[error("ledger document at {path} is corrupt: {reason}")]
    LedgerCorrupted { path: PathBuf, reason: String },

    #[error("no checkpoint found in {0}, nothing to resume")]
    NoCheckpoint(PathBuf),

    #[error("checkpoint document at {path} is corrupt: {reason}")]
    CheckpointCorrupted { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("analysis request failed: {0}")]
    Analyst(#[from] AnalystError),

    #[error(transparent)]
    Tracker(#[from] crate::domain::models::TrackerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
