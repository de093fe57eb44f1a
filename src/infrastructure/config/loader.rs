//! Hierarchical configuration loader.
//!
//! Configuration errors are fatal at startup, before any spend occurs.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("similarity threshold {0} out of range; must be in (0.0, 1.0]")]
    InvalidSimilarityThreshold(f64),

    #[error("escalation thresholds invalid: important_at {important_at} must be >= 2 and < critical_at {critical_at}")]
    InvalidEscalation {
        important_at: usize,
        critical_at: usize,
    },

    #[error("hard_cost_ceiling must be positive, got {0}")]
    InvalidCostCeiling(f64),

    #[error("max_iterations_per_book cannot be 0")]
    InvalidMaxIterations,

    #[error("checkpoint_after_n_books cannot be 0")]
    InvalidCheckpointCadence,

    #[error("estimated_cost_per_request must be positive, got {0}")]
    InvalidCostEstimate(f64),

    #[error("codebase_roots cannot be empty: suppression requires at least one target codebase")]
    NoCodebaseRoots,

    #[error("books list cannot be empty")]
    NoBooks,

    #[error("analyst endpoint cannot be empty")]
    EmptyEndpoint,

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error(
        "invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. .lectern/config.yaml (project config)
    /// 3. .lectern/local.yaml (local overrides, optional)
    /// 4. Environment variables (LECTERN_* prefix)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".lectern/config.yaml"))
            .merge(Yaml::file(".lectern/local.yaml"))
            .merge(Env::prefixed("LECTERN_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    ///
    /// An empty `codebase_roots` list is rejected here; an individual root
    /// that is missing at scan time is merely skipped with a warning.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let threshold = config.similarity.threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::InvalidSimilarityThreshold(threshold));
        }

        let (important_at, critical_at) =
            (config.escalation.important_at, config.escalation.critical_at);
        if important_at < 2 || important_at >= critical_at {
            return Err(ConfigError::InvalidEscalation {
                important_at,
                critical_at,
            });
        }

        if config.budget.hard_cost_ceiling <= 0.0 {
            return Err(ConfigError::InvalidCostCeiling(
                config.budget.hard_cost_ceiling,
            ));
        }
        if config.budget.max_iterations_per_book == 0 {
            return Err(ConfigError::InvalidMaxIterations);
        }
        if config.budget.checkpoint_after_n_books == 0 {
            return Err(ConfigError::InvalidCheckpointCadence);
        }
        if config.budget.estimated_cost_per_request <= 0.0 {
            return Err(ConfigError::InvalidCostEstimate(
                config.budget.estimated_cost_per_request,
            ));
        }

        if config.books.is_empty() {
            return Err(ConfigError::NoBooks);
        }
        if config.codebase_roots.is_empty() {
            return Err(ConfigError::NoCodebaseRoots);
        }
        if config.analyst.endpoint.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }

        let retry = &config.analyst.retry;
        if retry.initial_backoff_ms >= retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                retry.initial_backoff_ms,
                retry.max_backoff_ms,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
