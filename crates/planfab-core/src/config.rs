//! Detection configuration.
//!
//! All tunables are carried in an explicit [`DetectionConfig`] value passed
//! to the detector at call time. Nothing here is process-global; the
//! environment loader exists only because deployments configure the three
//! public tunables (`TOP_K`, `MIN_SCORE`, `MAX_PDF_MB`) through environment
//! variables.

use std::time::Duration;

use crate::error::{DetectError, Result};

/// Default number of candidate pages returned in the result.
const DEFAULT_TOP_K: usize = 5;

/// Default verdict threshold on the normalized [0, 1] score scale.
const DEFAULT_MIN_SCORE: f32 = 0.35;

/// Default document size limit in megabytes.
const DEFAULT_MAX_PDF_MB: f64 = 35.0;

/// Default rasterization resolution.
///
/// 200 DPI balances Tesseract accuracy on title-block text against the
/// memory cost of rendering large-format drawing sheets.
const DEFAULT_RENDER_DPI: f32 = 200.0;

/// Default native-text density threshold, in characters per square inch.
///
/// Pages at or above this density use the embedded text layer verbatim;
/// pages below it are treated as scans and routed through OCR. Drawing
/// sheets with only a stamped cartouche typically sit well below 1.0.
const DEFAULT_MIN_TEXT_DENSITY: f32 = 3.0;

/// Default Tesseract language pack.
const DEFAULT_OCR_LANGUAGE: &str = "fra";

/// Default OCR worker pool size.
const DEFAULT_OCR_WORKERS: usize = 2;

/// Default per-page extraction deadline.
const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(12);

/// Configuration for one detection request.
///
/// Construct with [`DetectionConfig::default`] and adjust through the
/// `with_*` builders, or load deployment tunables with
/// [`DetectionConfig::from_env`]. Call [`validate`](Self::validate) before
/// handing the value to a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Maximum number of scored pages returned in the result list.
    ///
    /// The verdict is always computed over all pages before this
    /// truncation is applied.
    pub top_k: usize,

    /// Minimum normalized score for a positive verdict, in [0, 1].
    pub min_score: f32,

    /// Maximum accepted document size in megabytes.
    pub max_pdf_mb: f64,

    /// Page rasterization resolution in dots per inch.
    pub render_dpi: f32,

    /// Native-text density threshold in characters per square inch.
    pub min_text_density: f32,

    /// Tesseract language pack used for OCR.
    pub ocr_language: String,

    /// Number of OCR worker threads (one engine instance per worker).
    pub ocr_workers: usize,

    /// Deadline for a single page's OCR extraction.
    ///
    /// A page that misses the deadline is recorded as a timeout failure
    /// and scored at the floor; the document keeps processing.
    pub page_timeout: Duration,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
            max_pdf_mb: DEFAULT_MAX_PDF_MB,
            render_dpi: DEFAULT_RENDER_DPI,
            min_text_density: DEFAULT_MIN_TEXT_DENSITY,
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            ocr_workers: DEFAULT_OCR_WORKERS,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        }
    }
}

impl DetectionConfig {
    /// Load deployment tunables from the environment.
    ///
    /// Reads `TOP_K`, `MIN_SCORE` and `MAX_PDF_MB`; unset or unparsable
    /// variables fall back to the defaults. Remaining fields keep their
    /// default values.
    #[must_use = "returns a config built from the environment"]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(top_k) = read_env_var("TOP_K") {
            config.top_k = top_k;
        }
        if let Some(min_score) = read_env_var("MIN_SCORE") {
            config.min_score = min_score;
        }
        if let Some(max_pdf_mb) = read_env_var("MAX_PDF_MB") {
            config.max_pdf_mb = max_pdf_mb;
        }
        config
    }

    /// Set the ranking window size.
    #[inline]
    #[must_use = "returns the adjusted config"]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the verdict threshold.
    #[inline]
    #[must_use = "returns the adjusted config"]
    pub const fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Set the document size limit in megabytes.
    #[inline]
    #[must_use = "returns the adjusted config"]
    pub const fn with_max_pdf_mb(mut self, max_pdf_mb: f64) -> Self {
        self.max_pdf_mb = max_pdf_mb;
        self
    }

    /// Set the rasterization resolution.
    #[inline]
    #[must_use = "returns the adjusted config"]
    pub const fn with_render_dpi(mut self, render_dpi: f32) -> Self {
        self.render_dpi = render_dpi;
        self
    }

    /// Set the OCR language pack.
    #[inline]
    #[must_use = "returns the adjusted config"]
    pub fn with_ocr_language(mut self, language: impl Into<String>) -> Self {
        self.ocr_language = language.into();
        self
    }

    /// Set the OCR worker pool size.
    #[inline]
    #[must_use = "returns the adjusted config"]
    pub const fn with_ocr_workers(mut self, workers: usize) -> Self {
        self.ocr_workers = workers;
        self
    }

    /// Set the per-page extraction deadline.
    #[inline]
    #[must_use = "returns the adjusted config"]
    pub const fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Size limit in bytes.
    #[inline]
    #[must_use = "limit is computed but not used"]
    pub fn max_bytes(&self) -> usize {
        (self.max_pdf_mb * 1024.0 * 1024.0) as usize
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Config`] naming the offending field when a
    /// value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.top_k < 1 {
            return Err(DetectError::Config("top_k must be >= 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(DetectError::Config(format!(
                "min_score must be in [0, 1], got {}",
                self.min_score
            )));
        }
        if self.max_pdf_mb <= 0.0 {
            return Err(DetectError::Config(format!(
                "max_pdf_mb must be positive, got {}",
                self.max_pdf_mb
            )));
        }
        if !(72.0..=600.0).contains(&self.render_dpi) {
            return Err(DetectError::Config(format!(
                "render_dpi must be in [72, 600], got {}",
                self.render_dpi
            )));
        }
        if self.min_text_density < 0.0 {
            return Err(DetectError::Config(format!(
                "min_text_density must be non-negative, got {}",
                self.min_text_density
            )));
        }
        if self.ocr_language.is_empty() {
            return Err(DetectError::Config(
                "ocr_language must not be empty".to_string(),
            ));
        }
        if self.ocr_workers < 1 {
            return Err(DetectError::Config("ocr_workers must be >= 1".to_string()));
        }
        if self.page_timeout.is_zero() {
            return Err(DetectError::Config(
                "page_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read and parse an environment variable, logging rejects.
fn read_env_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring unparsable environment variable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DetectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_k, 5);
        assert_eq!(config.ocr_language, "fra");
    }

    #[test]
    fn test_max_bytes() {
        let config = DetectionConfig::default().with_max_pdf_mb(1.0);
        assert_eq!(config.max_bytes(), 1024 * 1024);
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let config = DetectionConfig::default().with_top_k(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_min_score() {
        assert!(DetectionConfig::default()
            .with_min_score(1.2)
            .validate()
            .is_err());
        assert!(DetectionConfig::default()
            .with_min_score(-0.1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_rejects_nonpositive_size_limit() {
        let config = DetectionConfig::default().with_max_pdf_mb(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_extreme_dpi() {
        assert!(DetectionConfig::default()
            .with_render_dpi(30.0)
            .validate()
            .is_err());
        assert!(DetectionConfig::default()
            .with_render_dpi(1200.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_builder_chain() {
        let config = DetectionConfig::default()
            .with_top_k(3)
            .with_min_score(0.5)
            .with_ocr_workers(4)
            .with_page_timeout(Duration::from_secs(5));
        assert_eq!(config.top_k, 3);
        assert_eq!(config.min_score, 0.5);
        assert_eq!(config.ocr_workers, 4);
        assert_eq!(config.page_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }
}
