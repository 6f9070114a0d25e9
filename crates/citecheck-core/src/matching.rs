//! Title similarity scoring.
//!
//! Titles coming out of PDF extraction and titles stored in the catalog
//! routinely differ in word order, subtitle presence and punctuation, so the
//! comparison works on token sets rather than raw character edit distance.

use std::collections::BTreeSet;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Split a title into lowercase alphanumeric tokens.
///
/// Steps (order matters):
/// 1. Unescape common HTML entities (catalog titles sometimes carry them)
/// 2. NFKD-decompose and drop combining marks, so `"Déjà"` → `"Deja"`
/// 3. Lowercase
/// 4. Treat every non-alphanumeric character as a separator
pub fn tokenize_title(title: &str) -> Vec<String> {
    let title = title
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    let folded: String = title.nfkd().filter(|c| !is_combining_mark(*c)).collect();

    folded
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Token-set similarity between two titles, as an integer in `0..=100`.
///
/// Both titles are tokenized with [`tokenize_title`] and deduplicated. If one
/// token set contains the other, the score is 100. Otherwise the score is the
/// best normalized Indel ratio among:
/// - the sorted leftover tokens of each side against each other,
/// - the sorted shared tokens against shared + leftover of either side.
///
/// The result is symmetric and ignores word order. An empty title (after
/// tokenization) on either side scores 0.
///
/// The percentage is floored, not rounded, so `score >= t` holds exactly when
/// the underlying ratio reaches `t / 100`.
pub fn token_set_score(a: &str, b: &str) -> u8 {
    let tokens_a: BTreeSet<String> = tokenize_title(a).into_iter().collect();
    let tokens_b: BTreeSet<String> = tokenize_title(b).into_iter().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let sect: Vec<&str> = tokens_a.intersection(&tokens_b).map(String::as_str).collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).map(String::as_str).collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).map(String::as_str).collect();

    if !sect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100;
    }

    let sect = sect.join(" ");
    let diff_ab = diff_ab.join(" ");
    let diff_ba = diff_ba.join(" ");

    let mut best = indel_ratio(&diff_ab, &diff_ba);
    if !sect.is_empty() {
        let sect_ab = format!("{} {}", sect, diff_ab);
        let sect_ba = format!("{} {}", sect, diff_ba);
        best = best
            .max(indel_ratio(&sect, &sect_ab))
            .max(indel_ratio(&sect, &sect_ba));
    }

    to_percent(best)
}

fn indel_ratio(a: &str, b: &str) -> f64 {
    rapidfuzz::fuzz::ratio(a.chars(), b.chars())
}

fn to_percent(ratio: f64) -> u8 {
    floor_score(ratio * 100.0)
}

/// Floor a `0..=100` percentage to an integer score, clamping out-of-range
/// and NaN values.
pub(crate) fn floor_score(percent: f64) -> u8 {
    if percent.is_nan() {
        return 0;
    }
    // Epsilon absorbs float noise like 0.9 * 100.0 = 89.99999999999999
    (percent + 1e-9).floor().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic() {
        assert_eq!(
            tokenize_title("Hello, World! 123"),
            vec!["hello", "world", "123"]
        );
    }

    #[test]
    fn test_tokenize_html_entities_and_accents() {
        assert_eq!(tokenize_title("Foo &amp; Bar"), vec!["foo", "bar"]);
        assert_eq!(tokenize_title("Déjà Vu"), vec!["deja", "vu"]);
    }

    #[test]
    fn test_tokenize_hyphen_splits() {
        assert_eq!(
            tokenize_title("Pre-training of Deep Bidirectional"),
            vec!["pre", "training", "of", "deep", "bidirectional"]
        );
    }

    #[test]
    fn test_identical_titles() {
        assert_eq!(
            token_set_score("Attention Is All You Need", "Attention Is All You Need"),
            100
        );
    }

    #[test]
    fn test_word_order_ignored() {
        assert!(token_set_score("Neural Networks for NLP", "NLP for Neural Networks") >= 90);
    }

    #[test]
    fn test_case_and_punctuation_ignored() {
        assert_eq!(
            token_set_score(
                "BERT: Pre-training of Deep Bidirectional Transformers.",
                "bert pre training of deep bidirectional transformers"
            ),
            100
        );
    }

    #[test]
    fn test_missing_subtitle_is_subset() {
        assert_eq!(
            token_set_score(
                "Deep Residual Learning",
                "Deep Residual Learning for Image Recognition"
            ),
            100
        );
    }

    #[test]
    fn test_duplicate_tokens_collapse() {
        assert_eq!(token_set_score("data data data", "data"), 100);
    }

    #[test]
    fn test_partial_overlap_mid_range() {
        // shared "graph networks" vs "graph networks neural": 1 - 7/35
        assert_eq!(
            token_set_score("graph neural networks", "graph convolutional networks"),
            80
        );
    }

    #[test]
    fn test_unrelated_titles_low() {
        assert!(
            token_set_score(
                "Detecting Hallucinated References",
                "Completely Different Title About Cats"
            ) < 75
        );
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            ("graph neural networks", "graph convolutional networks"),
            ("A survey of transformers", "Transformers in vision: a survey"),
            ("Robust speech recognition", "Speech recognition at scale"),
        ];
        for (a, b) in pairs {
            assert_eq!(token_set_score(a, b), token_set_score(b, a), "{a} / {b}");
        }
    }

    #[test]
    fn test_empty_scores_zero() {
        assert_eq!(token_set_score("", "Something"), 0);
        assert_eq!(token_set_score("Something", ""), 0);
        assert_eq!(token_set_score("!!!", "Something"), 0);
    }

    #[test]
    fn test_score_in_range() {
        let s = token_set_score("quantum error correction", "classical error detection");
        assert!(s <= 100);
    }
}
