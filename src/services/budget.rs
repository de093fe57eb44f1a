//! Budget governor: cross-cutting cost and iteration guard.
//!
//! Consulted before every analysis request and after every book. The hard
//! cost ceiling is enforced as a precondition: `authorize` refuses the
//! request that would cross it, rather than rolling spend back after the
//! fact. Checkpoints pair the budget state with a ledger snapshot so an
//! interrupted run resumes from the next unprocessed book.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::errors::PipelineResult;
use crate::domain::models::{BudgetConfig, EscalationConfig, SimilarityConfig};
use crate::infrastructure::checkpoint::{CheckpointDocument, CheckpointStore};
use crate::services::ledger::RecommendationLedger;

/// Process-wide budget state, persisted at every checkpoint boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetState {
    /// Cumulative actual spend (USD).
    pub spent: f64,
    /// Total analysis iterations performed across all books.
    pub iteration_budget_used: u32,
    pub hard_cost_ceiling: f64,
    pub max_iterations_per_book: u32,
    pub checkpoint_after_n_books: u32,
    /// Last completed-book index that was checkpointed, if any.
    pub last_checkpoint: Option<usize>,
}

impl BudgetState {
    pub fn from_config(config: &BudgetConfig) -> Self {
        Self {
            spent: 0.0,
            iteration_budget_used: 0,
            hard_cost_ceiling: config.hard_cost_ceiling,
            max_iterations_per_book: config.max_iterations_per_book,
            checkpoint_after_n_books: config.checkpoint_after_n_books,
            last_checkpoint: None,
        }
    }

    pub fn remaining(&self) -> f64 {
        (self.hard_cost_ceiling - self.spent).max(0.0)
    }
}

/// Why an authorization was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum DenialReason {
    /// `spent + estimated` would cross the hard ceiling. Fatal to the run.
    CostCeiling {
        spent: f64,
        estimated: f64,
        ceiling: f64,
    },
    /// The book has used up its iteration allowance. Reported as exhaustion,
    /// never fatal.
    IterationLimit { iteration: u32, max: u32 },
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq)]
pub enum Authorization {
    Allowed,
    Denied(DenialReason),
}

/// Cross-cutting guard over spend and iteration counts.
pub struct BudgetGovernor {
    state: RwLock<BudgetState>,
    store: CheckpointStore,
}

impl BudgetGovernor {
    pub fn new(config: &BudgetConfig, store: CheckpointStore) -> Self {
        Self {
            state: RwLock::new(BudgetState::from_config(config)),
            store,
        }
    }

    /// Rebuild a governor from a previously persisted state (resume path).
    pub fn with_state(state: BudgetState, store: CheckpointStore) -> Self {
        Self {
            state: RwLock::new(state),
            store,
        }
    }

    // -------------------------------------------------------------------------
    // Admission control
    // -------------------------------------------------------------------------

    /// Must be called before every analysis request.
    ///
    /// `iteration` is the 1-based iteration the caller is about to run for
    /// the current book.
    pub async fn authorize(&self, estimated_cost: f64, iteration: u32) -> Authorization {
        let state = self.state.read().await;

        if iteration > state.max_iterations_per_book {
            return Authorization::Denied(DenialReason::IterationLimit {
                iteration,
                max: state.max_iterations_per_book,
            });
        }

        if state.spent + estimated_cost > state.hard_cost_ceiling {
            warn!(
                spent = state.spent,
                estimated = estimated_cost,
                ceiling = state.hard_cost_ceiling,
                "budget authorization denied"
            );
            return Authorization::Denied(DenialReason::CostCeiling {
                spent: state.spent,
                estimated: estimated_cost,
                ceiling: state.hard_cost_ceiling,
            });
        }

        Authorization::Allowed
    }

    /// Record the actual cost of an authorized request.
    pub async fn record(&self, actual_cost: f64) {
        let mut state = self.state.write().await;
        state.spent += actual_cost;
        state.iteration_budget_used += 1;
    }

    /// Point-in-time copy of the budget state.
    pub async fn snapshot(&self) -> BudgetState {
        self.state.read().await.clone()
    }

    // -------------------------------------------------------------------------
    // Checkpointing
    // -------------------------------------------------------------------------

    /// Called after every completed book; persists a checkpoint every
    /// `checkpoint_after_n_books` books. Returns whether one was written.
    pub async fn complete_book(
        &self,
        book_index: usize,
        book: &str,
        ledger: &RecommendationLedger,
    ) -> PipelineResult<bool> {
        let cadence = {
            let state = self.state.read().await;
            state.checkpoint_after_n_books.max(1) as usize
        };
        if (book_index + 1) % cadence == 0 {
            self.checkpoint(Some((book_index, book)), ledger).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Persist the budget state plus a ledger snapshot. Also invoked on
    /// graceful shutdown and on budget exhaustion. `completed` names the last
    /// fully completed book; `None` when the run stopped before finishing
    /// any, so resume restarts at the front of the list.
    pub async fn checkpoint(
        &self,
        completed: Option<(usize, &str)>,
        ledger: &RecommendationLedger,
    ) -> PipelineResult<()> {
        ledger.save(&self.store.ledger_path())?;

        let doc = {
            let mut state = self.state.write().await;
            state.last_checkpoint = completed.map(|(index, _)| index);
            CheckpointDocument {
                book_index: completed.map(|(index, _)| index),
                book: completed.map(|(_, book)| book.to_string()),
                spent: state.spent,
                iteration_budget_used: state.iteration_budget_used,
                timestamp: chrono::Utc::now(),
                ledger_path: self.store.ledger_path(),
            }
        };
        self.store.save(&doc)?;
        info!(
            book_index = ?doc.book_index,
            spent = doc.spent,
            path = %self.store.checkpoint_path().display(),
            "checkpoint written"
        );
        Ok(())
    }

    /// Restore `(next_book_index, ledger, state)` from the last checkpoint.
    ///
    /// The interrupted book (if any) restarts from iteration 0 — idempotent
    /// ledger merges make partial re-analysis safe. Resuming mid-book is not
    /// supported. `books` is the reading list the caller is about to walk;
    /// a checkpoint written against a different list (a single-book run, a
    /// reordered config) is refused rather than mapped to the wrong book.
    pub fn resume(
        store: &CheckpointStore,
        budget: &BudgetConfig,
        books: &[String],
        similarity: SimilarityConfig,
        escalation: EscalationConfig,
    ) -> PipelineResult<(usize, RecommendationLedger, BudgetState)> {
        let doc = store.load()?.ok_or_else(|| {
            crate::domain::errors::PipelineError::NoCheckpoint(store.state_dir().to_path_buf())
        })?;

        if let (Some(index), Some(book)) = (doc.book_index, doc.book.as_ref()) {
            if books.get(index) != Some(book) {
                return Err(crate::domain::errors::PipelineError::Config(format!(
                    "checkpoint was written against a different reading list \
                     (book {index} was '{book}'); start a fresh run or restore \
                     the original configuration"
                )));
            }
        }

        let ledger = RecommendationLedger::load(&doc.ledger_path, similarity, escalation)?;

        let state = BudgetState {
            spent: doc.spent,
            iteration_budget_used: doc.iteration_budget_used,
            hard_cost_ceiling: budget.hard_cost_ceiling,
            max_iterations_per_book: budget.max_iterations_per_book,
            checkpoint_after_n_books: budget.checkpoint_after_n_books,
            last_checkpoint: doc.book_index,
        };

        let next_index = doc.book_index.map_or(0, |index| index + 1);
        info!(
            resume_from = next_index,
            spent = state.spent,
            "resuming from checkpoint"
        );
        Ok((next_index, ledger, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Candidate, Category};

    fn governor(ceiling: f64, max_iterations: u32) -> BudgetGovernor {
        let dir = tempfile::tempdir().unwrap();
        let config = BudgetConfig {
            hard_cost_ceiling: ceiling,
            max_iterations_per_book: max_iterations,
            checkpoint_after_n_books: 1,
            estimated_cost_per_request: 0.25,
        };
        // Keep the tempdir on disk so the store outlives the test body.
        let store = CheckpointStore::new(dir.into_path());
        BudgetGovernor::new(&config, store)
    }

    #[tokio::test]
    async fn test_budget_refusal_at_ceiling() {
        let gov = governor(10.0, 100);
        gov.record(9.50).await;

        assert!(matches!(
            gov.authorize(1.00, 1).await,
            Authorization::Denied(DenialReason::CostCeiling { .. })
        ));
        assert_eq!(gov.authorize(0.40, 1).await, Authorization::Allowed);
    }

    #[tokio::test]
    async fn test_iteration_limit_denied() {
        let gov = governor(100.0, 5);
        assert_eq!(gov.authorize(0.1, 5).await, Authorization::Allowed);
        assert!(matches!(
            gov.authorize(0.1, 6).await,
            Authorization::Denied(DenialReason::IterationLimit { iteration: 6, max: 5 })
        ));
    }

    #[tokio::test]
    async fn test_record_accumulates() {
        let gov = governor(10.0, 10);
        gov.record(1.5).await;
        gov.record(0.25).await;
        let state = gov.snapshot().await;
        assert!((state.spent - 1.75).abs() < 1e-9);
        assert_eq!(state.iteration_budget_used, 2);
        assert!((state.remaining() - 8.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_checkpoint_cadence() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let config = BudgetConfig {
            checkpoint_after_n_books: 2,
            ..BudgetConfig::default()
        };
        let gov = BudgetGovernor::new(&config, store.clone());
        let ledger =
            RecommendationLedger::new(SimilarityConfig::default(), EscalationConfig::default());

        assert!(!gov.complete_book(0, "Book A", &ledger).await.unwrap());
        assert!(gov.complete_book(1, "Book B", &ledger).await.unwrap());
        let doc = store.load().unwrap().unwrap();
        assert_eq!(doc.book_index, Some(1));
        assert_eq!(doc.book.as_deref(), Some("Book B"));
    }

    #[tokio::test]
    async fn test_checkpoint_and_resume() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let config = BudgetConfig::default();
        let gov = BudgetGovernor::new(&config, store.clone());

        let mut ledger =
            RecommendationLedger::new(SimilarityConfig::default(), EscalationConfig::default());
        ledger.upsert(Candidate {
            title: "Implement model versioning".to_string(),
            category: Category::Important,
            source_book: "Book A".to_string(),
            rationale: None,
        });

        gov.record(2.5).await;
        gov.checkpoint(Some((3, "Book D")), &ledger).await.unwrap();

        let books: Vec<String> = ["Book A", "Book B", "Book C", "Book D", "Book E"]
            .iter()
            .map(|b| (*b).to_string())
            .collect();
        let (next_index, restored, state) = BudgetGovernor::resume(
            &store,
            &config,
            &books,
            SimilarityConfig::default(),
            EscalationConfig::default(),
        )
        .unwrap();
        assert_eq!(next_index, 4);
        assert_eq!(restored.len(), 1);
        assert!((state.spent - 2.5).abs() < 1e-9);
        assert_eq!(state.last_checkpoint, Some(3));
    }

    #[tokio::test]
    async fn test_checkpoint_before_any_book_resumes_at_front() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let config = BudgetConfig::default();
        let gov = BudgetGovernor::new(&config, store.clone());
        let ledger =
            RecommendationLedger::new(SimilarityConfig::default(), EscalationConfig::default());

        gov.record(0.75).await;
        gov.checkpoint(None, &ledger).await.unwrap();

        let books = vec!["Book A".to_string()];
        let (next_index, _, state) = BudgetGovernor::resume(
            &store,
            &config,
            &books,
            SimilarityConfig::default(),
            EscalationConfig::default(),
        )
        .unwrap();
        assert_eq!(next_index, 0);
        assert!((state.spent - 0.75).abs() < 1e-9);
        assert_eq!(state.last_checkpoint, None);
    }

    #[tokio::test]
    async fn test_resume_rejects_mismatched_reading_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let config = BudgetConfig::default();
        let gov = BudgetGovernor::new(&config, store.clone());
        let ledger =
            RecommendationLedger::new(SimilarityConfig::default(), EscalationConfig::default());

        gov.checkpoint(Some((0, "Solo Book")), &ledger).await.unwrap();

        let books = vec!["Other A".to_string(), "Other B".to_string()];
        let err = BudgetGovernor::resume(
            &store,
            &config,
            &books,
            SimilarityConfig::default(),
            EscalationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::domain::errors::PipelineError::Config(_)
        ));
    }

    #[tokio::test]
    async fn test_resume_without_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let err = BudgetGovernor::resume(
            &store,
            &BudgetConfig::default(),
            &[],
            SimilarityConfig::default(),
            EscalationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::domain::errors::PipelineError::NoCheckpoint(_)
        ));
    }
}
