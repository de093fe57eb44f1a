//! Run orchestration: the outer sequential loop over the reading list.
//!
//! Scans the target codebases once, then hands each book to the convergence
//! controller in order. The ledger is saved after every book; checkpoints
//! follow the configured cadence, plus one on shutdown or budget exhaustion
//! so an interrupted run can resume from the next unprocessed book.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::{BookOutcome, Config};
use crate::domain::ports::Analyst;
use crate::infrastructure::analyst::RetryPolicy;
use crate::infrastructure::checkpoint::CheckpointStore;
use crate::services::budget::BudgetGovernor;
use crate::services::convergence::{BookReport, ConvergenceController};
use crate::services::knowledge_scanner::KnowledgeScanner;
use crate::services::ledger::RecommendationLedger;

/// How a full run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every book in the reading list reached a terminal outcome.
    Completed,
    /// The hard cost ceiling refused further spend mid-run.
    BudgetExhausted {
        book: String,
        spent: f64,
        ceiling: f64,
    },
    /// A shutdown signal stopped the run between iterations.
    Interrupted,
}

/// Summary of a whole run, one entry per processed book.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub books: Vec<BookReport>,
    pub outcome: RunOutcome,
    pub total_spent: f64,
    pub ledger_entries: usize,
    pub ledger_path: PathBuf,
    pub checkpoint_path: PathBuf,
}

/// Owns the sequential book loop and the shared run state.
pub struct RunOrchestrator {
    config: Config,
    analyst: Arc<dyn Analyst>,
    shutdown: Arc<AtomicBool>,
}

impl RunOrchestrator {
    pub fn new(config: Config, analyst: Arc<dyn Analyst>, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            config,
            analyst,
            shutdown,
        }
    }

    /// Worst-case spend if every book uses its full iteration allowance.
    pub fn estimate_cost(&self) -> f64 {
        self.config.books.len() as f64
            * f64::from(self.config.budget.max_iterations_per_book)
            * self.config.budget.estimated_cost_per_request
    }

    /// Execute the run. With `resume`, state is restored from the last
    /// checkpoint and the loop continues at the next unprocessed book; the
    /// interrupted book restarts from iteration 0 and relies on idempotent
    /// ledger merges.
    pub async fn run(&self, resume: bool) -> PipelineResult<RunReport> {
        let store = CheckpointStore::new(&self.config.state_dir);

        let (start_index, ledger, governor) = if resume {
            let (next_index, ledger, state) = BudgetGovernor::resume(
                &store,
                &self.config.budget,
                &self.config.books,
                self.config.similarity.clone(),
                self.config.escalation.clone(),
            )?;
            (
                next_index,
                ledger,
                BudgetGovernor::with_state(state, store.clone()),
            )
        } else {
            (
                0,
                RecommendationLedger::new(
                    self.config.similarity.clone(),
                    self.config.escalation.clone(),
                ),
                BudgetGovernor::new(&self.config.budget, store.clone()),
            )
        };

        // One scan per run; the snapshot is immutable afterwards.
        let snapshot = Arc::new(KnowledgeScanner::new().scan(&self.config.codebase_roots));
        if snapshot.is_empty() {
            warn!("knowledge snapshot is empty, nothing will be suppressed");
        }
        info!(
            modules = snapshot.modules.len(),
            features = snapshot.features.len(),
            "codebase scan complete"
        );

        let governor = Arc::new(governor);
        let ledger = Arc::new(Mutex::new(ledger));
        let controller = ConvergenceController::new(
            Arc::clone(&self.analyst),
            RetryPolicy::from_config(&self.config.analyst.retry),
            Arc::clone(&governor),
            Arc::clone(&ledger),
            Arc::clone(&snapshot),
            Arc::clone(&self.shutdown),
            self.config.similarity.threshold,
            self.config.budget.estimated_cost_per_request,
        );

        let mut books = Vec::new();
        let mut outcome = RunOutcome::Completed;

        for (index, book) in self.config.books.iter().enumerate().skip(start_index) {
            if self.shutdown.load(Ordering::SeqCst) {
                let guard = ledger.lock().await;
                governor
                    .checkpoint(self.completed_before(index), &guard)
                    .await?;
                outcome = RunOutcome::Interrupted;
                break;
            }

            info!(book, index, "starting book");
            match controller.run_book(book).await {
                Ok(report) => {
                    info!(
                        book,
                        outcome = ?report.outcome,
                        iterations = report.iterations,
                        new = report.new,
                        suppressed = report.suppressed,
                        "book finished"
                    );
                    let interrupted = report.outcome == BookOutcome::Interrupted;
                    books.push(report);

                    let guard = ledger.lock().await;
                    if interrupted {
                        governor
                            .checkpoint(self.completed_before(index), &guard)
                            .await?;
                        outcome = RunOutcome::Interrupted;
                        break;
                    }
                    guard.save(&store.ledger_path())?;
                    governor.complete_book(index, book, &guard).await?;
                }
                Err(PipelineError::BudgetExhausted {
                    book,
                    spent,
                    ceiling,
                }) => {
                    warn!(book, spent, ceiling, "run halted at cost ceiling");
                    let guard = ledger.lock().await;
                    governor
                        .checkpoint(self.completed_before(index), &guard)
                        .await?;
                    outcome = RunOutcome::BudgetExhausted {
                        book,
                        spent,
                        ceiling,
                    };
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let state = governor.snapshot().await;
        let ledger_entries = ledger.lock().await.len();
        Ok(RunReport {
            books,
            outcome,
            total_spent: state.spent,
            ledger_entries,
            ledger_path: store.ledger_path(),
            checkpoint_path: store.checkpoint_path(),
        })
    }

    /// The last completed book before `index`, for a checkpoint written when
    /// book `index` stopped mid-flight. `None` when no book has completed;
    /// resume then restarts at the front of the list and relies on
    /// idempotent ledger merges.
    fn completed_before(&self, index: usize) -> Option<(usize, &str)> {
        index
            .checked_sub(1)
            .map(|prev| (prev, self.config.books[prev].as_str()))
    }
}
