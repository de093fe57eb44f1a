//! Analyst port: the external text-analysis capability.
//!
//! The capability is an opaque, potentially unreliable collaborator. It
//! receives the book identity, the iteration number, a digest of the
//! knowledge snapshot, and the titles already in the ledger (so it can avoid
//! resubmitting known items), and returns categorized recommendation items.
//! Timeouts and malformed output are expected and classified as transient.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One analysis request: exactly one per convergence iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Book identity (title or configured id).
    pub book: String,

    /// 1-based iteration number within this book's loop.
    pub iteration: u32,

    /// Summary of the knowledge snapshot, so the capability can steer away
    /// from functionality the codebase already has.
    pub knowledge_digest: String,

    /// Titles already in the ledger for dedup steering.
    pub known_titles: Vec<String>,
}

/// One recommendation item as returned by the capability, before
/// classification and suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisItem {
    pub title: String,

    /// Loosely-formatted severity label; unparseable labels are skipped with
    /// a warning rather than failing the response.
    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Structured response from the capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub items: Vec<AnalysisItem>,

    /// Actual cost of serving this request (USD), recorded against the
    /// budget after the fact.
    #[serde(default)]
    pub cost: f64,
}

/// Error types for analyst operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalystError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("server error: {0}")]
    Server(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl AnalystError {
    /// Transient errors are retried with backoff; permanent ones are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::RateLimited
                | Self::Server(_)
                | Self::Network(_)
                | Self::MalformedResponse(_)
        )
    }
}

/// Port trait for the analysis capability.
///
/// # Implementations
///
/// - **HttpAnalyst**: posts requests to a configured HTTP endpoint
/// - **MockAnalyst**: scripted responses for tests and dry runs
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` for use across tokio tasks.
#[async_trait]
pub trait Analyst: Send + Sync {
    /// Submit one analysis request. Blocking network operation with a fixed
    /// timeout; the caller treats the call as cancellable only between
    /// iterations.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalystError>;
}
