//! Property-based tests for title similarity.

use lectern::services::similarity::{normalize_title, title_similarity};
use proptest::prelude::*;

fn title_strategy() -> impl Strategy<Value = String> {
    // Word-ish titles with occasional punctuation and uneven spacing.
    proptest::collection::vec("[a-zA-Z]{1,12}", 1..6)
        .prop_map(|words| words.join(" "))
}

proptest! {
    #[test]
    fn similarity_is_symmetric(a in title_strategy(), b in title_strategy()) {
        let forward = title_similarity(&a, &b);
        let backward = title_similarity(&b, &a);
        prop_assert!((forward - backward).abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_is_bounded(a in title_strategy(), b in title_strategy()) {
        let score = title_similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn identity_scores_one(a in title_strategy()) {
        prop_assert!((title_similarity(&a, &a) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn case_and_spacing_do_not_matter(a in title_strategy()) {
        let shouted = format!("  {}  ", a.to_uppercase());
        prop_assert!((title_similarity(&a, &shouted) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn normalization_is_idempotent(a in "[ -~]{0,40}") {
        let once = normalize_title(&a);
        let twice = normalize_title(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn punctuation_is_ignored(a in title_strategy()) {
        let decorated = format!("{}!!!", a.replace(' ', ", "));
        prop_assert!((title_similarity(&a, &decorated) - 1.0).abs() < f64::EPSILON);
    }
}
