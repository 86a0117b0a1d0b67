//! Ranking and thresholding of scored pages into a final verdict.

use tracing::debug;

use crate::config::DetectionConfig;
use crate::page::{DetectionResult, ScoredPage};

/// Assemble the final result from the complete per-page score sequence.
///
/// The verdict is computed from the maximum score over all pages before
/// the returned list is truncated to the ranking window, so a positive
/// page is never lost to a small `top_k`. Sorting is deterministic: score
/// descending, ties broken by ascending page index.
#[must_use = "assembled result is returned but not used"]
pub fn rank_pages(
    mut scored: Vec<ScoredPage>,
    failed_pages: Vec<usize>,
    page_count: usize,
    config: &DetectionConfig,
    processing_ms: u64,
) -> DetectionResult {
    // Verdict first, over the untruncated sequence.
    let best = scored.iter().map(|p| p.score).fold(0.0_f32, f32::max);
    let verdict = !scored.is_empty() && best >= config.min_score;

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.page.cmp(&b.page))
    });
    scored.truncate(config.top_k);

    debug!(
        page_count,
        best_score = best,
        verdict,
        returned = scored.len(),
        failed = failed_pages.len(),
        "Ranked document"
    );

    DetectionResult {
        verdict,
        pages: scored,
        failed_pages,
        page_count,
        processing_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::FeatureVector;

    fn page(index: usize, score: f32) -> ScoredPage {
        ScoredPage {
            page: index,
            score,
            features: FeatureVector::new(),
        }
    }

    fn config(top_k: usize, min_score: f32) -> DetectionConfig {
        DetectionConfig::default()
            .with_top_k(top_k)
            .with_min_score(min_score)
    }

    #[test]
    fn test_sorts_descending_with_index_tiebreak() {
        let result = rank_pages(
            vec![page(0, 0.2), page(1, 0.9), page(2, 0.2), page(3, 0.5)],
            vec![],
            4,
            &config(10, 0.4),
            0,
        );
        let order: Vec<usize> = result.pages.iter().map(|p| p.page).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
        assert!(result.verdict);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let result = rank_pages(
            vec![page(0, 0.1), page(1, 0.2), page(2, 0.3)],
            vec![],
            3,
            &config(2, 0.05),
            0,
        );
        assert_eq!(result.pages.len(), 2);
        assert_eq!(result.best_page(), Some(2));
    }

    #[test]
    fn test_verdict_considers_pages_beyond_window() {
        // Degenerate window: the winning page would fall outside top_k if
        // the verdict were computed after truncation.
        let result = rank_pages(
            vec![page(0, 0.95), page(1, 0.94), page(2, 0.1)],
            vec![],
            3,
            &config(1, 0.9),
            0,
        );
        assert_eq!(result.pages.len(), 1);
        assert!(result.verdict);
    }

    #[test]
    fn test_below_threshold_still_returns_best_page() {
        let result = rank_pages(vec![page(0, 0.85)], vec![], 1, &config(1, 0.9), 0);
        assert!(!result.verdict);
        assert_eq!(result.pages.len(), 1);
        assert_eq!(result.best_page(), Some(0));
    }

    #[test]
    fn test_empty_document_is_negative() {
        let result = rank_pages(vec![], vec![], 0, &config(5, 0.0), 0);
        assert!(!result.verdict);
        assert!(result.pages.is_empty());
    }

    #[test]
    fn test_failed_pages_are_reported() {
        let result = rank_pages(
            vec![page(0, 0.0), page(1, 0.6)],
            vec![0],
            2,
            &config(5, 0.5),
            12,
        );
        assert_eq!(result.failed_pages, vec![0]);
        assert_eq!(result.processing_ms, 12);
        assert!(result.verdict);
    }
}
