//! Approximate phrase matching against the reference catalog.
//!
//! Similarity is a Levenshtein ratio on a 0–100 scale:
//! `100 × (1 − distance / max(len_a, len_b))`, counted in `char`s over
//! lower-cased, trimmed text.

use crate::catalog::ReferenceCatalog;

pub const DEFAULT_THRESHOLD: f64 = 70.0;

/// Longest input, in chars after trimming, that is scored at all. Catalog
/// phrases are single sentences, so anything longer cannot be one of them.
pub const MAX_INPUT_CHARS: usize = 1024;

/// The winning catalog entry for an input.
#[derive(Clone, Debug, PartialEq)]
pub struct PhraseMatch<'a> {
    pub question_id: &'a str,
    pub phrase: &'a str,
    pub score: f64,
}

/// Edit distance (insert, delete, substitute; unit cost).
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn normalize(text: &str) -> Vec<char> {
    text.trim().to_lowercase().chars().collect()
}

fn ratio(a: &[char], b: &[char]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 100.0;
    }
    100.0 * (1.0 - levenshtein(a, b) as f64 / longest as f64)
}

/// Similarity of two strings in `[0, 100]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    ratio(&normalize(a), &normalize(b))
}

/// Highest-scoring catalog entry, or `None` if its score is below
/// `threshold`. On equal scores the earlier entry wins. Inputs longer than
/// [`MAX_INPUT_CHARS`] never match.
pub fn best_match<'a>(
    input: &str,
    catalog: &'a ReferenceCatalog,
    threshold: f64,
) -> Option<PhraseMatch<'a>> {
    let input = normalize(input);
    if input.len() > MAX_INPUT_CHARS {
        return None;
    }
    let mut best: Option<PhraseMatch<'a>> = None;

    for entry in catalog.entries() {
        let score = ratio(&input, &normalize(&entry.phrase));
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(PhraseMatch {
                question_id: &entry.question_id,
                phrase: &entry.phrase,
                score,
            });
        }
    }

    best.filter(|m| m.score >= threshold)
}

/// Question id of the best match, if any clears `threshold`.
pub fn match_question<'a>(
    input: &str,
    catalog: &'a ReferenceCatalog,
    threshold: f64,
) -> Option<&'a str> {
    best_match(input, catalog, threshold).map(|m| m.question_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(levenshtein(&chars(""), &chars("abc")), 3);
        assert_eq!(levenshtein(&chars("abc"), &chars("")), 3);
        assert_eq!(levenshtein(&chars("same"), &chars("same")), 0);
    }

    #[test]
    fn levenshtein_counts_chars_not_bytes() {
        assert_eq!(levenshtein(&chars("café"), &chars("cafe")), 1);
    }

    #[test]
    fn similarity_scale() {
        assert_eq!(similarity("abcd", "abcd"), 100.0);
        assert_eq!(similarity("", ""), 100.0);
        assert_eq!(similarity("abcd", "wxyz"), 0.0);
        assert_eq!(similarity("abcd", "abce"), 75.0);
    }

    #[test]
    fn similarity_ignores_case_and_padding() {
        assert_eq!(similarity("  Hello There ", "hello there"), 100.0);
    }

    #[test]
    fn exact_catalog_phrase_matches_q1() {
        let catalog = ReferenceCatalog::builtin();
        assert_eq!(
            match_question("First, how did you find your care services today", &catalog, 70.0),
            Some("q1")
        );
    }

    #[test]
    fn near_duplicate_matches_q1() {
        let catalog = ReferenceCatalog::builtin();
        let m = best_match("first how did you find the care services today?", &catalog, 70.0).unwrap();
        assert_eq!(m.question_id, "q1");
        assert!(m.score > 70.0 && m.score < 100.0, "score {}", m.score);
    }

    #[test]
    fn unrelated_text_matches_nothing() {
        let catalog = ReferenceCatalog::builtin();
        assert_eq!(match_question("xyz123", &catalog, DEFAULT_THRESHOLD), None);
    }

    #[test]
    fn score_equal_to_threshold_matches() {
        let catalog = ReferenceCatalog::new([("abcd", "a")]);
        assert_eq!(match_question("abce", &catalog, 75.0), Some("a"));
        assert_eq!(match_question("abce", &catalog, 75.1), None);
    }

    #[test]
    fn ties_go_to_first_entry() {
        let catalog = ReferenceCatalog::new([("abcd", "first"), ("abce", "second")]);
        let m = best_match("abcx", &catalog, 0.0).unwrap();
        assert_eq!(m.question_id, "first");

        let reversed = ReferenceCatalog::new([("abce", "second"), ("abcd", "first")]);
        assert_eq!(match_question("abcx", &reversed, 0.0), Some("second"));
    }

    #[test]
    fn duplicate_phrases_resolve_to_first() {
        let catalog = ReferenceCatalog::new([("hello", "q1"), ("hello", "q2")]);
        assert_eq!(match_question("hello", &catalog, 70.0), Some("q1"));
    }

    #[test]
    fn overlong_input_is_not_scored() {
        let at_cap = "a".repeat(MAX_INPUT_CHARS);
        let over_cap = "a".repeat(MAX_INPUT_CHARS + 1);
        let catalog = ReferenceCatalog::new([(at_cap.clone(), "fits".to_string())]);
        assert_eq!(match_question(&format!("  {at_cap}  "), &catalog, 100.0), Some("fits"));

        let catalog = ReferenceCatalog::new([(over_cap.clone(), "long".to_string())]);
        assert_eq!(best_match(&over_cap, &catalog, 0.0), None);
    }

    #[test]
    fn empty_catalog_matches_nothing() {
        let catalog = ReferenceCatalog::new(Vec::<(String, String)>::new());
        assert_eq!(best_match("anything", &catalog, 0.0), None);
    }

    proptest! {
        #[test]
        fn similarity_is_bounded_and_symmetric(a in "\\PC{0,24}", b in "\\PC{0,24}") {
            let ab = similarity(&a, &b);
            prop_assert!((0.0..=100.0).contains(&ab));
            prop_assert!((ab - similarity(&b, &a)).abs() < 1e-9);
        }

        #[test]
        fn identical_text_scores_100(a in "[a-z ]{0,30}") {
            prop_assert_eq!(similarity(&a, &a), 100.0);
        }
    }
}
