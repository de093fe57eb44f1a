//! Mock analyst for testing and dry runs.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::ports::{
    AnalysisItem, AnalysisRequest, AnalysisResponse, Analyst, AnalystError,
};

/// One scripted turn: either a canned response or a scripted failure.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Respond(AnalysisResponse),
    Fail(AnalystError),
}

impl ScriptedResponse {
    /// Convenience: a response built from `(title, category)` pairs at a
    /// fixed cost.
    pub fn items(cost: f64, items: &[(&str, &str)]) -> Self {
        Self::Respond(AnalysisResponse {
            items: items
                .iter()
                .map(|(title, category)| AnalysisItem {
                    title: (*title).to_string(),
                    category: (*category).to_string(),
                    rationale: None,
                })
                .collect(),
            cost,
        })
    }

    /// Convenience: an empty response (nothing left to say).
    pub fn empty(cost: f64) -> Self {
        Self::Respond(AnalysisResponse { items: vec![], cost })
    }
}

/// Scripted analyst: each book consumes its queued responses in order, then
/// falls back to empty responses. Call counts are tracked for assertions.
pub struct MockAnalyst {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    calls: Mutex<Vec<AnalysisRequest>>,
    fallback_cost: f64,
}

impl MockAnalyst {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fallback_cost: 0.0,
        }
    }

    /// Queue scripted turns for a book.
    pub async fn script_book(&self, book: impl Into<String>, turns: Vec<ScriptedResponse>) {
        let mut scripts = self.scripts.lock().await;
        scripts.entry(book.into()).or_default().extend(turns);
    }

    /// All requests received so far, in order.
    pub async fn requests(&self) -> Vec<AnalysisRequest> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

impl Default for MockAnalyst {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyst for MockAnalyst {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalystError> {
        self.calls.lock().await.push(request.clone());

        let next = {
            let mut scripts = self.scripts.lock().await;
            scripts
                .get_mut(&request.book)
                .and_then(VecDeque::pop_front)
        };

        match next {
            Some(ScriptedResponse::Respond(response)) => Ok(response),
            Some(ScriptedResponse::Fail(err)) => Err(err),
            None => Ok(AnalysisResponse {
                items: vec![],
                cost: self.fallback_cost,
            }),
        }
    }
}
