//! HTTP adapter for the analysis capability.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::models::AnalystConfig;
use crate::domain::ports::{AnalysisRequest, AnalysisResponse, Analyst, AnalystError};

/// Posts analysis requests to a configured endpoint.
///
/// The capability is treated as opaque and unreliable: request timeouts,
/// 429s, and 5xx responses are transient; 4xx responses are permanent.
pub struct HttpAnalyst {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl HttpAnalyst {
    pub fn new(config: &AnalystConfig) -> Result<Self, AnalystError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalystError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn classify_status(status: StatusCode, body: String) -> AnalystError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => AnalystError::RateLimited,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AnalystError::Auth(body),
            s if s.is_server_error() => AnalystError::Server(format!("{s}: {body}")),
            s => AnalystError::InvalidRequest(format!("{s}: {body}")),
        }
    }
}

#[async_trait]
impl Analyst for HttpAnalyst {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalystError> {
        debug!(
            book = %request.book,
            iteration = request.iteration,
            known_titles = request.known_titles.len(),
            "submitting analysis request"
        );

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AnalystError::Timeout(self.timeout_secs)
            } else {
                AnalystError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "analysis request rejected");
            return Err(Self::classify_status(status, body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AnalystError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| AnalystError::MalformedResponse(e.to_string()))
    }
}
