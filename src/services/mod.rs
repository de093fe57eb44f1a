//! Service layer: scanner, ledger, convergence, budget, orchestration.

pub mod budget;
pub mod convergence;
pub mod knowledge_scanner;
pub mod ledger;
pub mod orchestrator;
pub mod similarity;

pub use budget::{Authorization, BudgetGovernor, BudgetState, DenialReason};
pub use convergence::{BookReport, ConvergenceController};
pub use knowledge_scanner::KnowledgeScanner;
pub use ledger::{BatchStats, RecommendationLedger};
pub use orchestrator::{RunOrchestrator, RunOutcome, RunReport};
