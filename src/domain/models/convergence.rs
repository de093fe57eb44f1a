//! Per-book convergence state machine.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recommendation::Category;

/// Number of consecutive all-benign iterations required to declare a book
/// converged.
pub const CONVERGENCE_WINDOW: usize = 3;

/// Terminal (or in-flight) outcome of one book's analysis loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookOutcome {
    /// The loop is still running.
    Running,
    /// Three consecutive iterations produced nothing above `NiceToHave`.
    Converged,
    /// `max_iterations_per_book` elapsed without convergence. Reported, not
    /// an error.
    Exhausted,
    /// The analysis capability failed repeatedly; the book was skipped.
    Errored,
    /// A shutdown signal arrived before the book finished.
    Interrupted,
}

/// Record of one analysis iteration, post-suppression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    pub iteration: u32,
    pub new_count: u32,
    pub duplicate_count: u32,
    pub improved_count: u32,
    /// Categories observed after knowledge-snapshot suppression. An empty
    /// set means the capability had nothing left to say.
    pub categories_seen: BTreeSet<Category>,
    pub timestamp: DateTime<Utc>,
}

impl IterationResult {
    /// True when nothing above `NiceToHave` was seen. An empty category set
    /// qualifies vacuously.
    pub fn is_benign(&self) -> bool {
        !self.categories_seen.contains(&Category::Critical)
            && !self.categories_seen.contains(&Category::Important)
    }
}

/// Mutable per-book state machine feeding the convergence decision.
///
/// Terminal once `converged` is true: further `record` calls are rejected.
/// A tracker is created per book and archived when the book finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceTracker {
    pub book: String,
    pub iteration: u32,
    pub history: Vec<IterationResult>,
    pub converged: bool,
}

impl ConvergenceTracker {
    pub fn new(book: impl Into<String>) -> Self {
        Self {
            book: book.into(),
            iteration: 0,
            history: Vec::new(),
            converged: false,
        }
    }

    /// Record the outcome of one iteration and re-evaluate convergence.
    ///
    /// Returns the updated convergence flag. Rejects recording once the
    /// tracker is terminal.
    pub fn record(&mut self, result: IterationResult) -> Result<bool, TrackerError> {
        if self.converged {
            return Err(TrackerError::Terminal {
                book: self.book.clone(),
            });
        }
        self.iteration = result.iteration;
        self.history.push(result);
        self.converged = self.evaluate();
        Ok(self.converged)
    }

    /// Convergence requires a full window: the most recent
    /// [`CONVERGENCE_WINDOW`] iterations must all be benign. A book cannot
    /// converge before its third iteration, even if every one was empty.
    fn evaluate(&self) -> bool {
        if self.history.len() < CONVERGENCE_WINDOW {
            return false;
        }
        self.history
            .iter()
            .rev()
            .take(CONVERGENCE_WINDOW)
            .all(IterationResult::is_benign)
    }
}

/// Errors from tracker state transitions.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("convergence tracker for '{book}' is terminal and accepts no further iterations")]
    Terminal { book: String },
}
