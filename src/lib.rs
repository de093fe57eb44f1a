//! Lectern - Recursive Convergence & Deduplication Engine
//!
//! Lectern feeds a reading list of technical books through an external
//! text-analysis capability, one iteration at a time per book, until each
//! book stops yielding severe findings. Every suggestion lands in a single
//! cross-book recommendation ledger that merges near-duplicate phrasings and
//! escalates priority when independent books agree. Suggestions that a target
//! codebase already implements are suppressed against a cached knowledge
//! snapshot, and the whole run is governed by a hard cost ceiling with
//! checkpoint-based resume.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure data models, ports, and errors
//! - **Service Layer** (`services`): Scanner, ledger, convergence, budget,
//!   and the run orchestrator
//! - **Infrastructure Layer** (`infrastructure`): Analyst adapters, config
//!   loading, checkpoint persistence
//! - **CLI Layer** (`cli`): Command-line interface

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{PipelineError, PipelineResult};
pub use domain::models::{
    BookOutcome, Category, Config, ConvergenceTracker, IterationResult, KnowledgeSnapshot,
    Recommendation, UpsertResult,
};
pub use domain::ports::{AnalysisItem, AnalysisRequest, AnalysisResponse, Analyst, AnalystError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    BudgetGovernor, ConvergenceController, KnowledgeScanner, RecommendationLedger, RunOrchestrator,
};
