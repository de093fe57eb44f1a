//! Recommendation model: the atomic unit of pipeline output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity category of a recommendation.
///
/// The variant order matters: `Ord` is derived so that
/// `NiceToHave < Important < Critical`, which is what makes escalation
/// monotonic — a category may only ever move toward `Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NiceToHave,
    Important,
    Critical,
}

impl Category {
    /// Parse a category from the loosely-formatted labels the analysis
    /// capability emits ("critical", "Important", "nice-to-have", ...).
    pub fn parse_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "critical" => Some(Self::Critical),
            "important" => Some(Self::Important),
            "nicetohave" | "nice" => Some(Self::NiceToHave),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Important => "important",
            Self::NiceToHave => "nice_to_have",
        }
    }
}

/// Outcome of a ledger upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    /// No similar recommendation existed; a new entry was created.
    Added,
    /// A similar recommendation existed; the candidate was folded into it
    /// without changing its category.
    Merged,
    /// A new source book pushed the entry past an escalation threshold and
    /// its category was raised.
    Escalated,
}

/// An item proposed for the ledger, before dedup.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub title: String,
    pub category: Category,
    pub source_book: String,
    pub rationale: Option<String>,
}

/// A deduplicated, cross-book recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Opaque unique identifier within a ledger.
    pub id: String,

    pub title: String,

    pub category: Category,

    /// Books that independently suggested this, in first-seen order.
    /// Never empty; never contains duplicates.
    pub source_books: Vec<String>,

    pub first_seen: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Recommendation {
    /// Create a new recommendation from its first candidate sighting.
    pub fn from_candidate(candidate: Candidate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: candidate.title,
            category: candidate.category,
            source_books: vec![candidate.source_book],
            first_seen: Utc::now(),
            rationale: candidate.rationale,
        }
    }

    /// Whether `book` already appears in `source_books`.
    pub fn has_source(&self, book: &str) -> bool {
        self.source_books.iter().any(|b| b == book)
    }

    /// Append a source book, preserving ordered-set semantics.
    /// Returns `false` if the book was already present.
    pub fn add_source(&mut self, book: impl Into<String>) -> bool {
        let book = book.into();
        if self.has_source(&book) {
            return false;
        }
        self.source_books.push(book);
        true
    }

    /// Raise the category to `floor` if it is currently lower.
    /// Returns `true` if the category changed. Never lowers.
    pub fn escalate_to(&mut self, floor: Category) -> bool {
        if floor > self.category {
            self.category = floor;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, category: Category, book: &str) -> Candidate {
        Candidate {
            title: title.to_string(),
            category,
            source_book: book.to_string(),
            rationale: None,
        }
    }

    #[test]
    fn test_category_ordering() {
        assert!(Category::Critical > Category::Important);
        assert!(Category::Important > Category::NiceToHave);
    }

    #[test]
    fn test_category_parse_label_variants() {
        assert_eq!(Category::parse_label("Critical"), Some(Category::Critical));
        assert_eq!(Category::parse_label("IMPORTANT"), Some(Category::Important));
        assert_eq!(
            Category::parse_label("nice-to-have"),
            Some(Category::NiceToHave)
        );
        assert_eq!(
            Category::parse_label("nice_to_have"),
            Some(Category::NiceToHave)
        );
        assert_eq!(Category::parse_label("urgent"), None);
    }

    #[test]
    fn test_add_source_is_idempotent() {
        let mut rec = Recommendation::from_candidate(candidate(
            "Implement model versioning",
            Category::Important,
            "Book A",
        ));
        assert!(rec.add_source("Book B"));
        assert!(!rec.add_source("Book B"));
        assert_eq!(rec.source_books, vec!["Book A", "Book B"]);
    }

    #[test]
    fn test_escalate_never_lowers() {
        let mut rec = Recommendation::from_candidate(candidate(
            "Add request tracing",
            Category::Critical,
            "Book A",
        ));
        assert!(!rec.escalate_to(Category::Important));
        assert_eq!(rec.category, Category::Critical);

        let mut rec = Recommendation::from_candidate(candidate(
            "Add request tracing",
            Category::NiceToHave,
            "Book A",
        ));
        assert!(rec.escalate_to(Category::Important));
        assert!(rec.escalate_to(Category::Critical));
        assert!(!rec.escalate_to(Category::Important));
        assert_eq!(rec.category, Category::Critical);
    }
}
