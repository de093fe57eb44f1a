//! Knowledge snapshot: a cached, read-only inventory of target codebases.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::services::similarity;

/// Reference to one discovered source module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    pub name: String,
    pub path: PathBuf,
}

/// Immutable per-run inventory of the target codebases.
///
/// Built once by the scanner, then shared via `Arc` without locking — it is
/// never mutated after construction. Used by the convergence controller to
/// suppress recommendations the codebase already implements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    pub source_roots: Vec<PathBuf>,
    pub modules: Vec<ModuleRef>,
    /// Notable type/feature names heuristically extracted from source text.
    pub features: BTreeSet<String>,
}

impl KnowledgeSnapshot {
    /// True when a snapshot feature name fuzzy-matches `concept` at or above
    /// `threshold`. Feature identifiers are split on camel/snake case before
    /// scoring, so `ModelVersioning` matches "implement model versioning".
    /// Single-word identifiers are too generic to suppress on and are
    /// skipped.
    pub fn covers(&self, concept: &str, threshold: f64) -> bool {
        self.features.iter().any(|feature| {
            let spaced = split_identifier(feature);
            spaced.contains(' ') && similarity::title_similarity(&spaced, concept) >= threshold
        })
    }

    /// One-line summary embedded in analysis requests so the capability can
    /// steer away from existing functionality.
    pub fn digest(&self, max_features: usize) -> String {
        let sample: Vec<&str> = self
            .features
            .iter()
            .take(max_features)
            .map(String::as_str)
            .collect();
        format!(
            "{} modules across {} roots; known features: {}",
            self.modules.len(),
            self.source_roots.len(),
            sample.join(", ")
        )
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.features.is_empty()
    }
}

/// Split `CamelCase` / `snake_case` identifiers into a space-separated
/// lowercase phrase.
pub fn split_identifier(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    let mut prev_lower = false;
    for c in ident.chars() {
        if c == '_' || c == '-' {
            out.push(' ');
            prev_lower = false;
        } else if c.is_uppercase() {
            if prev_lower {
                out.push(' ');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}
