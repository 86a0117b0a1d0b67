//! Per-page data model and the final detection result.
//!
//! Pages are processed independently; everything a page contributes to the
//! final result is captured here as owned, serializable values so that
//! raster buffers can be released as soon as extraction completes.

use std::collections::BTreeMap;

use serde::Serialize;

/// How a page's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextProvenance {
    /// Embedded PDF text layer, used verbatim.
    Native,
    /// Text recognized from the rasterized page.
    Ocr,
    /// OCR was attempted but produced nothing usable; the page is scored
    /// with zero text-derived signal.
    OcrFailed,
}

/// Extracted text for one page: an ordered, best-effort sequence of
/// fragments plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// Text fragments in best-effort reading order.
    pub fragments: Vec<String>,
    /// Where the fragments came from.
    pub provenance: TextProvenance,
}

impl PageText {
    /// Text obtained from the native PDF layer.
    #[inline]
    #[must_use = "page text is created but not used"]
    pub const fn native(fragments: Vec<String>) -> Self {
        Self {
            fragments,
            provenance: TextProvenance::Native,
        }
    }

    /// Text recognized by OCR.
    #[inline]
    #[must_use = "page text is created but not used"]
    pub const fn ocr(fragments: Vec<String>) -> Self {
        Self {
            fragments,
            provenance: TextProvenance::Ocr,
        }
    }

    /// Empty text for a page whose OCR failed or timed out.
    #[inline]
    #[must_use = "page text is created but not used"]
    pub const fn ocr_failed() -> Self {
        Self {
            fragments: Vec::new(),
            provenance: TextProvenance::OcrFailed,
        }
    }

    /// All fragments joined with single spaces.
    #[must_use = "joined text is returned but not used"]
    pub fn joined(&self) -> String {
        self.fragments.join(" ")
    }

    /// Whether any text was extracted.
    #[inline]
    #[must_use = "emptiness check result is returned but not used"]
    pub fn is_empty(&self) -> bool {
        self.fragments.iter().all(|f| f.trim().is_empty())
    }
}

/// Line-geometry signal extracted from a rasterized page.
///
/// Fabrication drawings are dense with short dimension and hatching
/// strokes, many of them diagonal; assembly and layout sheets tend toward
/// long axial frame lines. All ratios are in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LineFeatures {
    /// Number of detected line segments.
    pub line_count: usize,
    /// Median segment length in pixels of the analyzed raster.
    pub median_len: f32,
    /// Fraction of segments longer than the long-line cutoff.
    pub long_line_ratio: f32,
    /// Fraction of segments that are neither horizontal nor vertical.
    pub non_axial_ratio: f32,
}

/// Detector name to bounded contribution, ordered for stable JSON output.
pub type FeatureVector = BTreeMap<String, f32>;

/// Why a page could not be fully processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFailure {
    /// The page object could not be parsed or rendered.
    Render,
    /// The OCR engine errored on the page.
    OcrFailed,
    /// The page missed its extraction deadline.
    Timeout,
}

/// One page's final contribution to the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPage {
    /// Zero-based page index.
    pub page: usize,
    /// Normalized fabrication-plan likelihood in [0, 1].
    pub score: f32,
    /// Per-detector contributions that produced the score.
    pub features: FeatureVector,
}

/// Final verdict for one document.
///
/// Invariant: `verdict` is true iff at least one processed page scored at
/// or above the configured threshold, evaluated over all pages before
/// `pages` is truncated to the ranking window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    /// Whether the document contains a fabrication plan.
    pub verdict: bool,
    /// Top candidate pages, score descending, at most `top_k` entries.
    pub pages: Vec<ScoredPage>,
    /// Indices of pages that failed rendering or extraction.
    pub failed_pages: Vec<usize>,
    /// Total number of pages in the document.
    pub page_count: usize,
    /// Wall-clock processing time for the document.
    pub processing_ms: u64,
}

impl DetectionResult {
    /// Highest-scoring page index, if any page was processed.
    #[must_use = "best page is computed but not used"]
    pub fn best_page(&self) -> Option<usize> {
        self.pages.first().map(|p| p.page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_text_joined() {
        let text = PageText::native(vec!["PLAN".to_string(), "DE COUPE".to_string()]);
        assert_eq!(text.joined(), "PLAN DE COUPE");
        assert!(!text.is_empty());
    }

    #[test]
    fn test_ocr_failed_is_empty() {
        let text = PageText::ocr_failed();
        assert!(text.is_empty());
        assert_eq!(text.provenance, TextProvenance::OcrFailed);
    }

    #[test]
    fn test_whitespace_fragments_are_empty() {
        let text = PageText::ocr(vec!["  ".to_string(), "\n".to_string()]);
        assert!(text.is_empty());
    }

    #[test]
    fn test_result_serializes_to_contract_shape() {
        let mut features = FeatureVector::new();
        features.insert("keywords".to_string(), 0.8);

        let result = DetectionResult {
            verdict: true,
            pages: vec![ScoredPage {
                page: 1,
                score: 0.72,
                features,
            }],
            failed_pages: vec![2],
            page_count: 3,
            processing_ms: 420,
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&result).unwrap()).unwrap();
        assert_eq!(json["verdict"], true);
        assert_eq!(json["pages"][0]["page"], 1);
        assert_eq!(json["pages"][0]["features"]["keywords"], 0.8);
        assert_eq!(json["failed_pages"][0], 2);
        assert_eq!(json["page_count"], 3);
    }

    #[test]
    fn test_page_failure_serialization() {
        assert_eq!(
            serde_json::to_string(&PageFailure::OcrFailed).unwrap(),
            "\"ocr_failed\""
        );
        assert_eq!(
            serde_json::to_string(&PageFailure::Timeout).unwrap(),
            "\"timeout\""
        );
    }
}
