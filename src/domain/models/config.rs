//! Configuration model for the Lectern pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure for Lectern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Reading list: book identities to analyze, in order.
    #[serde(default)]
    pub books: Vec<String>,

    /// Roots of the target codebases used for suppression.
    #[serde(default)]
    pub codebase_roots: Vec<PathBuf>,

    /// Directory holding the ledger and checkpoint documents.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Similarity configuration
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Multi-source escalation thresholds
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Budget ceilings and checkpoint cadence
    #[serde(default)]
    pub budget: BudgetConfig,

    /// External analysis capability
    #[serde(default)]
    pub analyst: AnalystConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".lectern")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            books: vec![],
            codebase_roots: vec![],
            state_dir: default_state_dir(),
            similarity: SimilarityConfig::default(),
            escalation: EscalationConfig::default(),
            budget: BudgetConfig::default(),
            analyst: AnalystConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Title similarity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimilarityConfig {
    /// Minimum similarity for two titles to be considered the same
    /// recommendation, in (0.0, 1.0].
    #[serde(default = "default_similarity_threshold")]
    pub threshold: f64,
}

const fn default_similarity_threshold() -> f64 {
    0.70
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: default_similarity_threshold(),
        }
    }
}

/// Thresholds at which multi-source agreement raises a recommendation's
/// category floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EscalationConfig {
    /// Source count at which the floor becomes `Important`.
    #[serde(default = "default_important_at")]
    pub important_at: usize,

    /// Source count at which the floor becomes `Critical`.
    #[serde(default = "default_critical_at")]
    pub critical_at: usize,
}

const fn default_important_at() -> usize {
    2
}

const fn default_critical_at() -> usize {
    4
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            important_at: default_important_at(),
            critical_at: default_critical_at(),
        }
    }
}

/// Budget ceilings and checkpoint cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetConfig {
    /// Hard cost ceiling for the whole run (USD).
    #[serde(default = "default_hard_cost_ceiling")]
    pub hard_cost_ceiling: f64,

    /// Iteration cap per book; exhaustion is reported, never an error.
    #[serde(default = "default_max_iterations_per_book")]
    pub max_iterations_per_book: u32,

    /// Persist a checkpoint after every N completed books.
    #[serde(default = "default_checkpoint_after_n_books")]
    pub checkpoint_after_n_books: u32,

    /// Cost estimate handed to `authorize` ahead of each request (USD).
    /// Actual spend is recorded from the response.
    #[serde(default = "default_estimated_cost_per_request")]
    pub estimated_cost_per_request: f64,
}

const fn default_hard_cost_ceiling() -> f64 {
    25.0
}

const fn default_max_iterations_per_book() -> u32 {
    10
}

const fn default_checkpoint_after_n_books() -> u32 {
    1
}

const fn default_estimated_cost_per_request() -> f64 {
    0.25
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            hard_cost_ceiling: default_hard_cost_ceiling(),
            max_iterations_per_book: default_max_iterations_per_book(),
            checkpoint_after_n_books: default_checkpoint_after_n_books(),
            estimated_cost_per_request: default_estimated_cost_per_request(),
        }
    }
}

/// External analysis capability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnalystConfig {
    /// Endpoint accepting analysis requests.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key (can also be set via LECTERN_ANALYST__API_KEY).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout; exceeding it counts as a transient failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_endpoint() -> String {
    "http://localhost:8787/analyze".to_string()
}

const fn default_timeout_secs() -> u64 {
    120
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    5_000
}

const fn default_max_backoff_ms() -> u64 {
    120_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
