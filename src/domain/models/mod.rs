//! Domain models.

pub mod config;
pub mod convergence;
pub mod knowledge;
pub mod recommendation;

pub use config::{
    AnalystConfig, BudgetConfig, Config, EscalationConfig, LoggingConfig, RetryConfig,
    SimilarityConfig,
};
pub use convergence::{
    BookOutcome, ConvergenceTracker, IterationResult, TrackerError, CONVERGENCE_WINDOW,
};
pub use knowledge::{KnowledgeSnapshot, ModuleRef};
pub use recommendation::{Candidate, Category, Recommendation, UpsertResult};
