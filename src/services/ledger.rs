//! The cross-book recommendation ledger.
//!
//! Single store of deduplicated recommendations with similarity-based merge,
//! source attribution, and multi-source priority escalation. The primary map
//! (`id -> Recommendation`) is authoritative; `by_category` and
//! `by_source_book` are derived caches, rebuilt from the primary map on load
//! and never trusted on their own.
//!
//! The ledger is not safe for concurrent unsynchronized mutation; the
//! orchestrator holds it behind `Arc<tokio::sync::Mutex<_>>` and each
//! controller takes the lock for the duration of its upsert batch.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::models::{
    Candidate, Category, EscalationConfig, Recommendation, SimilarityConfig, UpsertResult,
};
use crate::services::similarity;

/// Format version written into every persisted ledger document.
const LEDGER_FORMAT_VERSION: u32 = 1;

/// Per-batch counters reported to the convergence controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Upserts that created a new entry.
    pub new: u32,
    /// Upserts folded into an existing entry without changing it.
    pub duplicate: u32,
    /// Upserts that added a new source or escalated a category.
    pub improved: u32,
}

/// Persisted ledger document. Unknown fields are ignored on load so future
/// writers can extend the format.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerDocument {
    version: u32,
    recommendations: BTreeMap<String, Recommendation>,
    by_category: BTreeMap<String, BTreeSet<String>>,
    by_source_book: BTreeMap<String, BTreeSet<String>>,
}

/// The single cross-book store of deduplicated recommendations.
#[derive(Debug, Clone)]
pub struct RecommendationLedger {
    entries: BTreeMap<String, Recommendation>,
    by_category: BTreeMap<Category, BTreeSet<String>>,
    by_source_book: BTreeMap<String, BTreeSet<String>>,
    similarity: SimilarityConfig,
    escalation: EscalationConfig,
    batch: BatchStats,
}

impl RecommendationLedger {
    pub fn new(similarity: SimilarityConfig, escalation: EscalationConfig) -> Self {
        Self {
            entries: BTreeMap::new(),
            by_category: BTreeMap::new(),
            by_source_book: BTreeMap::new(),
            similarity,
            escalation,
            batch: BatchStats::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Best existing match whose title similarity to `candidate_title` meets
    /// or exceeds the configured threshold.
    pub fn find_similar(&self, candidate_title: &str) -> Option<&Recommendation> {
        self.find_similar_at(candidate_title, self.similarity.threshold)
    }

    /// Like [`find_similar`](Self::find_similar) with an explicit threshold.
    pub fn find_similar_at(
        &self,
        candidate_title: &str,
        threshold: f64,
    ) -> Option<&Recommendation> {
        let mut best: Option<(&Recommendation, f64)> = None;
        for rec in self.entries.values() {
            let score = similarity::title_similarity(&rec.title, candidate_title);
            if score >= threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((rec, score));
            }
        }
        best.map(|(rec, _)| rec)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Recommendation> {
        self.entries.get(id)
    }

    /// All entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Recommendation> {
        self.entries.values()
    }

    /// All titles currently known, for the analysis request digest.
    pub fn titles(&self) -> Vec<String> {
        self.entries.values().map(|r| r.title.clone()).collect()
    }

    /// Ids in a category, from the derived index.
    pub fn ids_in_category(&self, category: Category) -> impl Iterator<Item = &str> {
        self.by_category
            .get(&category)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Ids attributed to a source book, from the derived index.
    pub fn ids_for_book(&self, book: &str) -> impl Iterator<Item = &str> {
        self.by_source_book
            .get(book)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Merge a candidate into the ledger.
    ///
    /// - No similar entry: create one. `Added`.
    /// - Similar entry already attributed to this book: no-op. `Merged`.
    /// - Similar entry, new book: append the source; if the source count
    ///   crosses an escalation threshold and the resulting floor exceeds the
    ///   current category, raise it (monotonic). `Merged` or `Escalated`.
    pub fn upsert(&mut self, candidate: Candidate) -> UpsertResult {
        let existing_id = self
            .find_similar(&candidate.title)
            .map(|rec| rec.id.clone());

        let Some(id) = existing_id else {
            let rec = Recommendation::from_candidate(candidate);
            let id = rec.id.clone();
            self.index_insert(&rec);
            self.entries.insert(id, rec);
            self.batch.new += 1;
            return UpsertResult::Added;
        };

        let (important_at, critical_at) = (self.escalation.important_at, self.escalation.critical_at);

        // Mutate the authoritative entry first; indexes catch up below.
        let (previous, current) = {
            let Some(rec) = self.entries.get_mut(&id) else {
                // find_similar only ever returns ids from the primary map.
                self.batch.duplicate += 1;
                return UpsertResult::Merged;
            };

            if !rec.add_source(candidate.source_book.clone()) {
                self.batch.duplicate += 1;
                return UpsertResult::Merged;
            }

            let floor = if rec.source_books.len() >= critical_at {
                Some(Category::Critical)
            } else if rec.source_books.len() >= important_at {
                Some(Category::Important)
            } else {
                None
            };

            let previous = rec.category;
            if let Some(floor) = floor {
                rec.escalate_to(floor);
            }
            (previous, rec.category)
        };

        self.by_source_book
            .entry(candidate.source_book)
            .or_default()
            .insert(id.clone());

        self.batch.improved += 1;
        if current > previous {
            self.reindex_category(&id, previous, current);
            UpsertResult::Escalated
        } else {
            UpsertResult::Merged
        }
    }

    /// Return the per-batch counters and reset them.
    pub fn take_batch_stats(&mut self) -> BatchStats {
        std::mem::take(&mut self.batch)
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Serialize the full ledger to a structured document.
    ///
    /// Deterministic: entries and indexes are `BTreeMap`-ordered, so
    /// `load` followed by `save` is byte-identical.
    pub fn to_document_json(&self) -> PipelineResult<String> {
        let doc = LedgerDocument {
            version: LEDGER_FORMAT_VERSION,
            recommendations: self.entries.clone(),
            by_category: self
                .by_category
                .iter()
                .map(|(cat, ids)| (cat.label().to_string(), ids.clone()))
                .collect(),
            by_source_book: self.by_source_book.clone(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Write the ledger document atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let json = self.to_document_json()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), entries = self.entries.len(), "ledger saved");
        Ok(())
    }

    /// Load a ledger document, rebuilding the derived indexes from the
    /// primary map. A malformed document is fatal: continuing with an
    /// unreadable ledger risks reintroducing duplicates.
    pub fn load(
        path: &Path,
        similarity: SimilarityConfig,
        escalation: EscalationConfig,
    ) -> PipelineResult<Self> {
        let raw = fs::read_to_string(path)?;
        let doc: LedgerDocument =
            serde_json::from_str(&raw).map_err(|e| PipelineError::LedgerCorrupted {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut ledger = Self::new(similarity, escalation);
        for (id, rec) in doc.recommendations {
            if rec.source_books.is_empty() {
                return Err(PipelineError::LedgerCorrupted {
                    path: path.to_path_buf(),
                    reason: format!("recommendation {id} has no source books"),
                });
            }
            if id != rec.id {
                return Err(PipelineError::LedgerCorrupted {
                    path: path.to_path_buf(),
                    reason: format!("key {id} does not match recommendation id {}", rec.id),
                });
            }
            ledger.index_insert(&rec);
            ledger.entries.insert(id, rec);
        }
        debug!(path = %path.display(), entries = ledger.entries.len(), "ledger loaded");
        Ok(ledger)
    }

    // -------------------------------------------------------------------------
    // Index maintenance
    // -------------------------------------------------------------------------

    fn index_insert(&mut self, rec: &Recommendation) {
        self.by_category
            .entry(rec.category)
            .or_default()
            .insert(rec.id.clone());
        for book in &rec.source_books {
            self.by_source_book
                .entry(book.clone())
                .or_default()
                .insert(rec.id.clone());
        }
    }

    fn reindex_category(&mut self, id: &str, from: Category, to: Category) {
        if let Some(ids) = self.by_category.get_mut(&from) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_category.remove(&from);
            }
        }
        self.by_category
            .entry(to)
            .or_default()
            .insert(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> RecommendationLedger {
        RecommendationLedger::new(SimilarityConfig::default(), EscalationConfig::default())
    }

    fn candidate(title: &str, category: Category, book: &str) -> Candidate {
        Candidate {
            title: title.to_string(),
            category,
            source_book: book.to_string(),
            rationale: None,
        }
    }

    #[test]
    fn test_upsert_new_is_added() {
        let mut l = ledger();
        let result = l.upsert(candidate("Implement model versioning", Category::NiceToHave, "A"));
        assert_eq!(result, UpsertResult::Added);
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn test_upsert_same_book_is_idempotent() {
        let mut l = ledger();
        l.upsert(candidate("Implement model versioning", Category::NiceToHave, "A"));
        let before: Vec<_> = l.iter().cloned().collect();

        for _ in 0..3 {
            let result =
                l.upsert(candidate("Implement Model Versioning", Category::NiceToHave, "A"));
            assert_eq!(result, UpsertResult::Merged);
        }

        let after: Vec<_> = l.iter().cloned().collect();
        assert_eq!(before, after, "repeated same-book upserts must not mutate");
    }

    #[test]
    fn test_cross_book_phrasings_merge_and_escalate() {
        // Spec scenario: three case/spacing/phrasing variants from three
        // books collapse to one entry with category at least Important.
        let mut l = ledger();
        l.upsert(candidate("Implement model versioning", Category::NiceToHave, "Book A"));
        let second = l.upsert(candidate(
            "Model version control and tracking",
            Category::NiceToHave,
            "Book B",
        ));
        assert_eq!(second, UpsertResult::Escalated); // important_at = 2
        let third = l.upsert(candidate("Implement Model Versioning", Category::NiceToHave, "Book C"));
        assert_eq!(third, UpsertResult::Merged); // floor unchanged at 3 sources

        assert_eq!(l.len(), 1);
        let rec = l.iter().next().unwrap();
        assert_eq!(rec.source_books.len(), 3);
        assert!(rec.category >= Category::Important);
    }

    #[test]
    fn test_escalation_is_monotonic() {
        let mut l = ledger();
        l.upsert(candidate("Adopt feature flags", Category::Critical, "A"));
        // More agreement from lower-severity sources must never lower it.
        l.upsert(candidate("Adopt feature flags", Category::NiceToHave, "B"));
        l.upsert(candidate("Adopt feature flags", Category::NiceToHave, "C"));
        let rec = l.iter().next().unwrap();
        assert_eq!(rec.category, Category::Critical);
    }

    #[test]
    fn test_four_sources_reach_critical() {
        let mut l = ledger();
        for book in ["A", "B", "C", "D"] {
            l.upsert(candidate("Use idempotency keys", Category::NiceToHave, book));
        }
        let rec = l.iter().next().unwrap();
        assert_eq!(rec.category, Category::Critical);
        assert_eq!(rec.source_books.len(), 4);
    }

    #[test]
    fn test_indexes_follow_primary_map() {
        let mut l = ledger();
        l.upsert(candidate("Implement model versioning", Category::NiceToHave, "A"));
        l.upsert(candidate("Model version control and tracking", Category::NiceToHave, "B"));

        let id = l.iter().next().unwrap().id.clone();
        // Escalated to Important: the old category bucket is gone.
        assert_eq!(l.ids_in_category(Category::Important).count(), 1);
        assert_eq!(l.ids_in_category(Category::NiceToHave).count(), 0);
        assert!(l.ids_for_book("A").any(|i| i == id));
        assert!(l.ids_for_book("B").any(|i| i == id));
        // Every indexed id exists in the primary map.
        for cat in [Category::Critical, Category::Important, Category::NiceToHave] {
            for id in l.ids_in_category(cat) {
                assert!(l.get(id).is_some());
            }
        }
    }

    #[test]
    fn test_batch_stats_reset() {
        let mut l = ledger();
        l.upsert(candidate("Implement model versioning", Category::NiceToHave, "A"));
        l.upsert(candidate("Implement model versioning", Category::NiceToHave, "A"));
        l.upsert(candidate("Implement model versioning", Category::NiceToHave, "B"));

        let stats = l.take_batch_stats();
        assert_eq!(stats.new, 1);
        assert_eq!(stats.duplicate, 1);
        assert_eq!(stats.improved, 1);

        assert_eq!(l.take_batch_stats(), BatchStats::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let mut l = ledger();
        l.upsert(candidate("Implement model versioning", Category::NiceToHave, "A"));
        l.upsert(candidate("Model version control and tracking", Category::Important, "B"));
        l.upsert(candidate("Add circuit breakers", Category::Critical, "A"));
        l.save(&path).unwrap();

        let loaded = RecommendationLedger::load(
            &path,
            SimilarityConfig::default(),
            EscalationConfig::default(),
        )
        .unwrap();
        assert_eq!(loaded.len(), l.len());

        // load then save is a no-op: documents are byte-identical.
        let first = std::fs::read_to_string(&path).unwrap();
        loaded.save(&path).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_rejects_malformed_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = RecommendationLedger::load(
            &path,
            SimilarityConfig::default(),
            EscalationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::LedgerCorrupted { .. }));
    }

    #[test]
    fn test_load_rejects_empty_source_books() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let doc = r#"{
            "version": 1,
            "recommendations": {
                "abc": {
                    "id": "abc",
                    "title": "t",
                    "category": "critical",
                    "source_books": [],
                    "first_seen": "2026-01-01T00:00:00Z"
                }
            },
            "by_category": {},
            "by_source_book": {}
        }"#;
        std::fs::write(&path, doc).unwrap();

        let err = RecommendationLedger::load(
            &path,
            SimilarityConfig::default(),
            EscalationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::LedgerCorrupted { .. }));
    }

    #[test]
    fn test_load_ignores_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let doc = r#"{
            "version": 2,
            "future_field": {"x": 1},
            "recommendations": {},
            "by_category": {},
            "by_source_book": {}
        }"#;
        std::fs::write(&path, doc).unwrap();

        let loaded = RecommendationLedger::load(
            &path,
            SimilarityConfig::default(),
            EscalationConfig::default(),
        )
        .unwrap();
        assert!(loaded.is_empty());
    }
}
