//! Property-Based Tests
//!
//! Tests using property-based testing (proptest) to verify scorer and
//! ranker invariants:
//! - Scores stay in [0, 1] for arbitrary inputs
//! - Adding positive catalogue evidence never lowers a score
//! - Scoring is deterministic
//! - Results serialize to valid JSON without panics
//!
//! These tests complement unit tests by exploring the input space
//! automatically.

use planfab_core::{
    rank_pages, DetectionConfig, FeatureScorer, FeatureVector, LineFeatures, PageText, ScoredPage,
};
use proptest::prelude::*;

/// Words from the positive indicator catalogue used to grow evidence.
const POSITIVE_TERMS: &[&str] = &[
    "PLAN DE FABRICATION",
    "DESSINE",
    "DEMANDEUR",
    "CLIENT",
    "MATIERE",
    "ECHELLE",
    "APPAREIL",
    "USINAGE",
    "TOLERANCE",
    "DOSSIER",
    "INDICE",
    "NUANCE",
    "SECTION",
    "COUPE",
];

fn score_of(scorer: &FeatureScorer, text: &str, lines: &LineFeatures) -> f32 {
    scorer
        .score_page(&PageText::ocr(vec![text.to_string()]), lines)
        .0
}

/// Property: any text yields a score in [0, 1].
#[test]
fn proptest_score_bounded() {
    let scorer = FeatureScorer::new();
    proptest!(|(text in ".*{0,400}")| {
        let score = score_of(&scorer, &text, &LineFeatures::default());
        prop_assert!((0.0..=1.0).contains(&score), "score {score} out of range");
    });
}

/// Property: appending positive catalogue terms never lowers the score.
#[test]
fn proptest_positive_evidence_is_monotonic() {
    let scorer = FeatureScorer::new();
    proptest!(|(
        base in "[A-Z0-9 :.,ØÉÈ±-]{0,200}",
        picks in proptest::collection::vec(0..POSITIVE_TERMS.len(), 1..6),
    )| {
        let before = score_of(&scorer, &base, &LineFeatures::default());

        let mut grown = base.clone();
        for pick in picks {
            grown.push(' ');
            grown.push_str(POSITIVE_TERMS[pick]);
        }
        let after = score_of(&scorer, &grown, &LineFeatures::default());

        prop_assert!(
            after >= before,
            "score dropped from {before} to {after} after adding positive evidence"
        );
    });
}

/// Property: scoring identical input twice gives identical output.
#[test]
fn proptest_scoring_is_deterministic() {
    let scorer = FeatureScorer::new();
    proptest!(|(text in ".*{0,300}", count in 0usize..500, median in 0.0f32..500.0)| {
        let lines = LineFeatures {
            line_count: count,
            median_len: median,
            long_line_ratio: 0.1,
            non_axial_ratio: 0.2,
        };
        let first = scorer.score_page(&PageText::ocr(vec![text.clone()]), &lines);
        let second = scorer.score_page(&PageText::ocr(vec![text]), &lines);
        prop_assert_eq!(first, second);
    });
}

/// Property: ranked results keep at most top_k pages, never panic on
/// serialization, and honor the pre-truncation verdict rule.
#[test]
fn proptest_ranking_invariants() {
    proptest!(|(
        scores in proptest::collection::vec(0.0f32..=1.0, 0..30),
        top_k in 1usize..8,
        min_score in 0.0f32..=1.0,
    )| {
        let pages: Vec<ScoredPage> = scores
            .iter()
            .enumerate()
            .map(|(i, &score)| ScoredPage {
                page: i,
                score,
                features: FeatureVector::new(),
            })
            .collect();
        let page_count = pages.len();
        let config = DetectionConfig::default()
            .with_top_k(top_k)
            .with_min_score(min_score);

        let result = rank_pages(pages, vec![], page_count, &config, 0);

        prop_assert!(result.pages.len() <= top_k);
        prop_assert!(result.pages.len() <= page_count);

        let best = scores.iter().copied().fold(0.0f32, f32::max);
        let expected = !scores.is_empty() && best >= min_score;
        prop_assert_eq!(result.verdict, expected);

        // Sorted descending, index ascending on ties.
        for pair in result.pages.windows(2) {
            prop_assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].page < pair[1].page)
            );
        }

        let json = serde_json::to_string(&result);
        prop_assert!(json.is_ok(), "result should serialize");
    });
}
