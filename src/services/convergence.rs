//! Per-book convergence loop.
//!
//! Drives one book through repeated analysis requests until the tracker
//! declares convergence, the iteration allowance runs out, the budget
//! governor refuses further spend, or a shutdown signal arrives. Every
//! response batch is classified, suppressed against the knowledge snapshot,
//! and merged into the shared ledger before the convergence check.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::{
    BookOutcome, Candidate, Category, ConvergenceTracker, IterationResult, KnowledgeSnapshot,
};
use crate::domain::ports::{AnalysisRequest, Analyst};
use crate::infrastructure::analyst::RetryPolicy;
use crate::services::budget::{Authorization, BudgetGovernor, DenialReason};
use crate::services::ledger::RecommendationLedger;

/// Feature names included in the knowledge digest of each request.
const DIGEST_FEATURES: usize = 25;

/// Summary of one book's trip through the convergence loop.
#[derive(Debug, Clone)]
pub struct BookReport {
    pub book: String,
    pub outcome: BookOutcome,
    /// Iterations actually recorded.
    pub iterations: u32,
    pub new: u32,
    pub duplicate: u32,
    pub improved: u32,
    /// Candidates dropped because the knowledge snapshot already covers them.
    pub suppressed: u32,
}

impl BookReport {
    fn new(book: impl Into<String>) -> Self {
        Self {
            book: book.into(),
            outcome: BookOutcome::Running,
            iterations: 0,
            new: 0,
            duplicate: 0,
            improved: 0,
            suppressed: 0,
        }
    }
}

/// Runs the analysis loop for one book at a time.
pub struct ConvergenceController {
    analyst: Arc<dyn Analyst>,
    retry: RetryPolicy,
    governor: Arc<BudgetGovernor>,
    ledger: Arc<Mutex<RecommendationLedger>>,
    snapshot: Arc<KnowledgeSnapshot>,
    shutdown: Arc<AtomicBool>,
    similarity_threshold: f64,
    estimated_cost_per_request: f64,
}

impl ConvergenceController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        analyst: Arc<dyn Analyst>,
        retry: RetryPolicy,
        governor: Arc<BudgetGovernor>,
        ledger: Arc<Mutex<RecommendationLedger>>,
        snapshot: Arc<KnowledgeSnapshot>,
        shutdown: Arc<AtomicBool>,
        similarity_threshold: f64,
        estimated_cost_per_request: f64,
    ) -> Self {
        Self {
            analyst,
            retry,
            governor,
            ledger,
            snapshot,
            shutdown,
            similarity_threshold,
            estimated_cost_per_request,
        }
    }

    /// Run the loop for `book` until a terminal outcome.
    ///
    /// Budget refusal at the cost ceiling is the only fatal path: the caller
    /// checkpoints and ends the run. Iteration exhaustion, repeated analyst
    /// failure, and shutdown all terminate the book but not the run.
    pub async fn run_book(&self, book: &str) -> PipelineResult<BookReport> {
        let mut tracker = ConvergenceTracker::new(book);
        let mut report = BookReport::new(book);
        let digest = self.snapshot.digest(DIGEST_FEATURES);

        while !tracker.converged {
            let iteration = tracker.iteration + 1;

            if self.shutdown.load(Ordering::SeqCst) {
                info!(book, iteration, "shutdown requested, interrupting book");
                report.outcome = BookOutcome::Interrupted;
                return Ok(report);
            }

            match self
                .governor
                .authorize(self.estimated_cost_per_request, iteration)
                .await
            {
                Authorization::Allowed => {}
                Authorization::Denied(DenialReason::IterationLimit { max, .. }) => {
                    info!(book, max, "iteration allowance exhausted");
                    report.outcome = BookOutcome::Exhausted;
                    return Ok(report);
                }
                Authorization::Denied(DenialReason::CostCeiling { spent, ceiling, .. }) => {
                    return Err(PipelineError::BudgetExhausted {
                        book: book.to_string(),
                        spent,
                        ceiling,
                    });
                }
            }

            let request = AnalysisRequest {
                book: book.to_string(),
                iteration,
                knowledge_digest: digest.clone(),
                known_titles: self.ledger.lock().await.titles(),
            };

            let response = {
                let analyst = Arc::clone(&self.analyst);
                self.retry
                    .execute(|| {
                        let analyst = Arc::clone(&analyst);
                        let request = request.clone();
                        async move { analyst.analyze(&request).await }
                    })
                    .await
            };

            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    warn!(book, iteration, error = %err, "analysis failed after retries, skipping book");
                    report.outcome = BookOutcome::Errored;
                    return Ok(report);
                }
            };

            self.governor.record(response.cost).await;

            let mut candidates = Vec::with_capacity(response.items.len());
            for item in response.items {
                let Some(category) = Category::parse_label(&item.category) else {
                    warn!(book, title = %item.title, label = %item.category, "unknown category label, skipping item");
                    continue;
                };
                if self.snapshot.covers(&item.title, self.similarity_threshold) {
                    debug!(book, title = %item.title, "already implemented, suppressing");
                    report.suppressed += 1;
                    continue;
                }
                candidates.push(Candidate {
                    title: item.title,
                    category,
                    source_book: book.to_string(),
                    rationale: item.rationale,
                });
            }

            let categories_seen = candidates.iter().map(|c| c.category).collect();
            let stats = {
                let mut ledger = self.ledger.lock().await;
                for candidate in candidates {
                    ledger.upsert(candidate);
                }
                ledger.take_batch_stats()
            };

            report.new += stats.new;
            report.duplicate += stats.duplicate;
            report.improved += stats.improved;

            let converged = tracker.record(IterationResult {
                iteration,
                new_count: stats.new,
                duplicate_count: stats.duplicate,
                improved_count: stats.improved,
                categories_seen,
                timestamp: Utc::now(),
            })?;
            report.iterations = tracker.iteration;

            debug!(
                book,
                iteration,
                new = stats.new,
                duplicate = stats.duplicate,
                improved = stats.improved,
                converged,
                "iteration recorded"
            );
        }

        info!(book, iterations = report.iterations, "book converged");
        report.outcome = BookOutcome::Converged;
        Ok(report)
    }
}
