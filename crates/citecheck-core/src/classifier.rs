//! Verdict classification.
//!
//! Maps a [`Resolution`] to exactly one [`Verdict`]. The arms below are the
//! decision table, evaluated top to bottom; nothing here touches the network.

use crate::catalog::CatalogEntry;
use crate::matching::token_set_score;
use crate::resolver::Resolution;
use crate::{ReferenceRecord, Thresholds, Verdict, VerdictStatus};

const REASON_IDENTIFIER_FOUND: &str = "identifier resolved in catalog";
const REASON_IDENTIFIER_MISSING: &str = "identifier did not resolve in catalog";
const REASON_NO_TITLE: &str = "no title extracted";
const REASON_TITLE_MATCH: &str = "best fuzzy title match from catalog search";
const REASON_NO_CANDIDATE: &str = "no catalog candidate matched the title";

/// Classify a resolution into a verdict.
pub fn classify(
    reference: &ReferenceRecord,
    resolution: &Resolution,
    thresholds: &Thresholds,
) -> Verdict {
    match resolution {
        Resolution::IdentifierMatch { identifier, entry } => {
            // The identifier already confirms identity; the score is diagnostic.
            let score = match reference.title() {
                Some(title) => token_set_score(title, entry.title_or_empty()),
                None => 100,
            };
            Verdict {
                status: VerdictStatus::FoundByIdentifier,
                score,
                match_title: entry.title_or_empty().to_string(),
                match_identifier: entry
                    .identifier
                    .clone()
                    .unwrap_or_else(|| identifier.clone()),
                reason: REASON_IDENTIFIER_FOUND.to_string(),
            }
        }
        Resolution::IdentifierMissing { identifier } => Verdict {
            status: VerdictStatus::IdentifierNotFound,
            score: 0,
            match_title: String::new(),
            match_identifier: identifier.clone(),
            reason: REASON_IDENTIFIER_MISSING.to_string(),
        },
        Resolution::NoQuery => Verdict {
            status: VerdictStatus::NoTitle,
            score: 0,
            match_title: String::new(),
            match_identifier: String::new(),
            reason: REASON_NO_TITLE.to_string(),
        },
        Resolution::TitleSearch { candidates } => {
            let title = reference.title().unwrap_or("");
            match best_candidate(title, candidates) {
                Some((entry, score)) => Verdict {
                    status: thresholds.status_for(score),
                    score,
                    match_title: entry.title_or_empty().to_string(),
                    match_identifier: entry.identifier.clone().unwrap_or_default(),
                    reason: REASON_TITLE_MATCH.to_string(),
                },
                None => Verdict {
                    status: VerdictStatus::NotFound,
                    score: 0,
                    match_title: String::new(),
                    match_identifier: String::new(),
                    reason: REASON_NO_CANDIDATE.to_string(),
                },
            }
        }
    }
}

/// Highest-scoring candidate. Ties keep the earliest one in catalog order;
/// a candidate scoring 0 is never picked.
pub fn best_candidate<'a>(
    title: &str,
    candidates: &'a [CatalogEntry],
) -> Option<(&'a CatalogEntry, u8)> {
    let mut best: Option<(&CatalogEntry, u8)> = None;
    for entry in candidates {
        let score = token_set_score(title, entry.title_or_empty());
        let best_score = best.map(|(_, s)| s).unwrap_or(0);
        if score > best_score {
            best = Some((entry, score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, identifier: &str) -> ReferenceRecord {
        ReferenceRecord::new(title, "", identifier, vec![])
    }

    fn search(candidates: Vec<CatalogEntry>) -> Resolution {
        Resolution::TitleSearch { candidates }
    }

    #[test]
    fn identifier_match_scores_titles() {
        let verdict = classify(
            &record("X", "10.1/abc"),
            &Resolution::IdentifierMatch {
                identifier: "10.1/abc".into(),
                entry: CatalogEntry::new("X", "10.1/abc"),
            },
            &Thresholds::default(),
        );
        assert_eq!(verdict.status, VerdictStatus::FoundByIdentifier);
        assert_eq!(verdict.score, 100);
        assert_eq!(verdict.match_identifier, "10.1/abc");
        assert_eq!(verdict.match_title, "X");
        assert!(!verdict.reason.is_empty());
    }

    #[test]
    fn identifier_match_with_empty_title_scores_100() {
        let verdict = classify(
            &record("", "10.1/abc"),
            &Resolution::IdentifierMatch {
                identifier: "10.1/abc".into(),
                entry: CatalogEntry::new("Something Else Entirely", "10.1/abc"),
            },
            &Thresholds::default(),
        );
        assert_eq!(verdict.score, 100);
    }

    #[test]
    fn identifier_match_with_different_title_keeps_status() {
        // Low similarity is diagnostic only; the identifier decides.
        let verdict = classify(
            &record("Quantum gravity", "10.1/abc"),
            &Resolution::IdentifierMatch {
                identifier: "10.1/abc".into(),
                entry: CatalogEntry::new("Protein folding", "10.1/abc"),
            },
            &Thresholds::default(),
        );
        assert_eq!(verdict.status, VerdictStatus::FoundByIdentifier);
        assert!(verdict.score < 75);
    }

    #[test]
    fn identifier_match_falls_back_to_queried_identifier() {
        let verdict = classify(
            &record("X", "10.1/abc"),
            &Resolution::IdentifierMatch {
                identifier: "10.1/abc".into(),
                entry: CatalogEntry {
                    title: Some("X".into()),
                    identifier: None,
                },
            },
            &Thresholds::default(),
        );
        assert_eq!(verdict.match_identifier, "10.1/abc");
    }

    #[test]
    fn identifier_missing() {
        let verdict = classify(
            &record("Y", "10.1/missing"),
            &Resolution::IdentifierMissing {
                identifier: "10.1/missing".into(),
            },
            &Thresholds::default(),
        );
        assert_eq!(verdict.status, VerdictStatus::IdentifierNotFound);
        assert_eq!(verdict.score, 0);
        assert_eq!(verdict.match_identifier, "10.1/missing");
        assert_eq!(verdict.match_title, "");
    }

    #[test]
    fn no_query_is_no_title() {
        let verdict = classify(
            &ReferenceRecord::default(),
            &Resolution::NoQuery,
            &Thresholds::default(),
        );
        assert_eq!(verdict.status, VerdictStatus::NoTitle);
        assert_eq!(verdict.score, 0);
        assert!(!verdict.reason.is_empty());
    }

    #[test]
    fn exact_title_is_high() {
        let verdict = classify(
            &record("Attention Is All You Need", ""),
            &search(vec![CatalogEntry::new(
                "Attention Is All You Need",
                "10.5555/3295222.3295349",
            )]),
            &Thresholds::default(),
        );
        assert_eq!(verdict.status, VerdictStatus::FoundByTitleHigh);
        assert_eq!(verdict.score, 100);
        assert_eq!(verdict.match_identifier, "10.5555/3295222.3295349");
    }

    #[test]
    fn medium_match() {
        let verdict = classify(
            &record("graph neural networks", ""),
            &search(vec![CatalogEntry::new("graph convolutional networks", "10.1/g")]),
            &Thresholds::default(),
        );
        assert_eq!(verdict.score, 80);
        assert_eq!(verdict.status, VerdictStatus::FoundByTitleMed);
    }

    #[test]
    fn empty_search_is_not_found() {
        let verdict = classify(&record("T", ""), &search(vec![]), &Thresholds::default());
        assert_eq!(verdict.status, VerdictStatus::NotFound);
        assert_eq!(verdict.score, 0);
        assert_eq!(verdict.match_title, "");
    }

    #[test]
    fn low_score_is_not_found_but_keeps_candidate() {
        let verdict = classify(
            &record("Detecting Hallucinated References", ""),
            &search(vec![CatalogEntry::new(
                "Completely Different Title About Cats",
                "10.1/cats",
            )]),
            &Thresholds::default(),
        );
        assert_eq!(verdict.status, VerdictStatus::NotFound);
        assert!(verdict.score < 75);
    }

    #[test]
    fn best_candidate_wins_regardless_of_position() {
        let verdict = classify(
            &record("Deep Residual Learning for Image Recognition", ""),
            &search(vec![
                CatalogEntry::new("Image Recognition with Kernels", "10.1/a"),
                CatalogEntry::new("Deep Residual Learning for Image Recognition", "10.1/b"),
            ]),
            &Thresholds::default(),
        );
        assert_eq!(verdict.match_identifier, "10.1/b");
        assert_eq!(verdict.score, 100);
    }

    #[test]
    fn ties_keep_first_candidate() {
        let verdict = classify(
            &record("Attention Is All You Need", ""),
            &search(vec![
                CatalogEntry::new("Attention is all you need", "10.1/first"),
                CatalogEntry::new("ATTENTION IS ALL YOU NEED", "10.1/second"),
            ]),
            &Thresholds::default(),
        );
        assert_eq!(verdict.match_identifier, "10.1/first");
    }

    #[test]
    fn candidates_without_titles_are_skipped() {
        let verdict = classify(
            &record("Attention Is All You Need", ""),
            &search(vec![CatalogEntry {
                title: None,
                identifier: Some("10.1/untitled".into()),
            }]),
            &Thresholds::default(),
        );
        assert_eq!(verdict.status, VerdictStatus::NotFound);
        assert_eq!(verdict.match_identifier, "");
    }

    #[test]
    fn custom_thresholds_apply() {
        let thresholds = Thresholds::new(80, 60).unwrap();
        let verdict = classify(
            &record("graph neural networks", ""),
            &search(vec![CatalogEntry::new("graph convolutional networks", "10.1/g")]),
            &thresholds,
        );
        assert_eq!(verdict.status, VerdictStatus::FoundByTitleHigh);
    }

    #[test]
    fn classification_is_deterministic() {
        let r = record("Neural Networks for NLP", "");
        let res = search(vec![CatalogEntry::new("NLP for Neural Networks", "10.1/n")]);
        let t = Thresholds::default();
        assert_eq!(classify(&r, &res, &t), classify(&r, &res, &t));
    }
}
