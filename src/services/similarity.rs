//! Title normalization and similarity scoring.
//!
//! Recognizing near-duplicate recommendation text across independently
//! generated natural-language phrasings is the load-bearing piece of the
//! ledger. The pipeline is:
//!
//! 1. Normalize: case-fold, strip punctuation, collapse whitespace.
//! 2. Tokenize and drop stopwords (articles, conjunctions, and the filler
//!    verbs analysis output leads with: "implement", "add", "adopt", ...).
//! 3. Match tokens on equality or a shared prefix of at least
//!    [`PREFIX_MATCH_LEN`] characters, so "version" pairs with "versioning".
//! 4. Score with the overlap coefficient: `matched / min(|A|, |B|)`.
//!
//! The overlap coefficient is deliberately used instead of Jaccard/Dice: a
//! terse phrasing wholly contained in a more verbose one scores 1.0, which
//! is exactly the cross-book near-duplicate case the ledger must merge.
//! The 0.70 cutoff lives in configuration, not here.

use std::collections::BTreeSet;

/// Minimum shared-prefix length for two distinct tokens to count as a match.
const PREFIX_MATCH_LEN: usize = 4;

/// Words carrying no recommendation identity. Kept deliberately small; if
/// filtering would empty a token set the unfiltered tokens are used instead.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "to", "for", "in", "on", "with", "into", "via", "by",
    "your", "our", "its", // articles, conjunctions, prepositions
    "implement", "implementing", "add", "adding", "adopt", "introduce", "create", "build", "use",
    "enable", "consider", // filler verbs recommendation titles lead with
];

/// Case-fold, strip punctuation, and collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tokenize a normalized title, dropping stopwords unless that would empty
/// the set.
fn tokens(normalized: &str) -> BTreeSet<&str> {
    let all: BTreeSet<&str> = normalized.split_whitespace().collect();
    let filtered: BTreeSet<&str> = all
        .iter()
        .copied()
        .filter(|t| !STOPWORDS.contains(t))
        .collect();
    if filtered.is_empty() {
        all
    } else {
        filtered
    }
}

fn tokens_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.len() >= PREFIX_MATCH_LEN && long.starts_with(short)
}

/// Similarity of two titles in `[0.0, 1.0]`.
///
/// Symmetric; `1.0` for titles equal after normalization; `0.0` when one
/// side normalizes to nothing and the other does not.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let norm_a = normalize_title(a);
    let norm_b = normalize_title(b);

    if norm_a == norm_b {
        return if norm_a.is_empty() { 0.0 } else { 1.0 };
    }
    if norm_a.is_empty() || norm_b.is_empty() {
        return 0.0;
    }

    let set_a = tokens(&norm_a);
    let set_b = tokens(&norm_b);
    let (small, large) = if set_a.len() <= set_b.len() {
        (&set_a, &set_b)
    } else {
        (&set_b, &set_a)
    };

    let matched = small
        .iter()
        .filter(|t| large.iter().any(|u| tokens_match(t, u)))
        .count();

    matched as f64 / small.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_case_and_whitespace() {
        assert_eq!(
            normalize_title("  Implement   Model Versioning! "),
            "implement model versioning"
        );
    }

    #[test]
    fn test_identical_after_normalization() {
        assert!(
            (title_similarity("Implement Model Versioning", "implement  model versioning") - 1.0)
                .abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn test_spec_phrasing_variants_meet_threshold() {
        // The three cross-book phrasings that must merge into one entry.
        let a = "Implement model versioning";
        let b = "Model version control and tracking";
        let c = "Implement Model Versioning";
        assert!(title_similarity(a, b) >= 0.70, "{}", title_similarity(a, b));
        assert!(title_similarity(a, c) >= 0.70);
    }

    #[test]
    fn test_unrelated_titles_stay_below_threshold() {
        assert!(title_similarity("Implement model versioning", "Add circuit breakers") < 0.70);
        assert!(
            title_similarity("Use structured logging", "Cache invalidation strategy") < 0.70
        );
    }

    #[test]
    fn test_prefix_token_match() {
        assert!(tokens_match("version", "versioning"));
        assert!(tokens_match("versioning", "version"));
        assert!(!tokens_match("and", "android"));
        assert!(!tokens_match("log", "logging"));
    }

    #[test]
    fn test_empty_titles() {
        assert!(title_similarity("", "anything").abs() < f64::EPSILON);
        assert!(title_similarity("", "").abs() < f64::EPSILON);
        assert!(title_similarity("!!!", "???").abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_stopword_title_falls_back_to_raw_tokens() {
        // Both titles are pure filler; fall back keeps them comparable.
        assert!((title_similarity("Implement and add", "implement and add") - 1.0).abs() < f64::EPSILON);
    }
}
