//! Ports: trait seams to external collaborators.

pub mod analyst;

pub use analyst::{AnalysisItem, AnalysisRequest, AnalysisResponse, Analyst, AnalystError};
