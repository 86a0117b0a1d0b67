//! OCR support for planfab_rs, built on Tesseract 5.x.
//!
//! Tesseract is a single-stage recognizer: detection and recognition run
//! in one pass over an encoded image. The engine here is tuned for the
//! cartouche of French fabrication drawings: the `fra` language pack and
//! a uniform-block page segmentation mode, fed with a binarized crop of
//! the title-block region.
//!
//! Tesseract handles are not shareable across threads, so concurrent
//! page processing goes through [`pool::OcrPool`]: a fixed set of worker
//! threads, one engine instance each, fed over a bounded channel.

pub mod pool;
pub mod preprocess;

use image::GrayImage;
use leptess::{LepTess, Variable};
use thiserror::Error;
use tracing::debug;

/// Mean Tesseract confidence (0-100) below which a recognition result is
/// discarded as noise.
const MIN_MEAN_CONFIDENCE: i32 = 25;

/// Configuration for OCR processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    /// Tesseract language code (e.g., "fra", "fra+eng").
    pub language: String,
    /// Page segmentation mode (see Tesseract PSM values).
    pub page_segmentation_mode: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "fra".to_string(),
            // PSM 6: assume a single uniform block of text, the right
            // mode for a cropped title block.
            page_segmentation_mode: 6,
        }
    }
}

/// Errors that can occur during OCR processing.
#[derive(Error, Debug, Clone)]
pub enum OcrError {
    /// Tesseract could not be initialized, usually a missing language
    /// pack.
    #[error("failed to initialize Tesseract with language '{language}': {message}")]
    Init {
        /// Requested language code.
        language: String,
        /// Underlying initialization failure.
        message: String,
    },

    /// The recognition pass failed.
    #[error("failed to run OCR: {0}")]
    Recognition(String),

    /// The input image could not be encoded for Tesseract.
    #[error("failed to encode image for OCR: {0}")]
    Encoding(String),
}

/// A Tesseract engine instance.
///
/// One engine serves many images; recognition replaces the previously
/// loaded image. Instances are not `Sync` and must stay on the thread
/// that created them.
pub struct OcrEngine {
    lt: LepTess,
}

impl OcrEngine {
    /// Create an engine for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OcrError::Init`] when the language data is missing or
    /// Tesseract rejects the configuration.
    pub fn new(config: &OcrConfig) -> Result<Self, OcrError> {
        let mut lt = LepTess::new(None, &config.language).map_err(|e| OcrError::Init {
            language: config.language.clone(),
            message: e.to_string(),
        })?;

        lt.set_variable(
            Variable::TesseditPagesegMode,
            &config.page_segmentation_mode.to_string(),
        )
        .map_err(|e| OcrError::Init {
            language: config.language.clone(),
            message: format!("failed to set page segmentation mode: {e}"),
        })?;

        Ok(Self { lt })
    }

    /// Recognize text in a preprocessed grayscale image.
    ///
    /// Returns the recognized lines in best-effort reading order. A blank
    /// image or a recognition below the confidence floor yields an empty
    /// vector, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the image cannot be encoded or Tesseract
    /// fails outright.
    pub fn recognize(&mut self, image: &GrayImage) -> Result<Vec<String>, OcrError> {
        // leptess consumes encoded image data, not raw pixels.
        let mut png = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut png, image::ImageFormat::Png)
            .map_err(|e| OcrError::Encoding(e.to_string()))?;

        self.lt
            .set_image_from_mem(png.get_ref())
            .map_err(|e| OcrError::Recognition(format!("failed to load image: {e}")))?;

        let text = self
            .lt
            .get_utf8_text()
            .map_err(|e| OcrError::Recognition(format!("failed to read text: {e}")))?;

        let confidence = self.lt.mean_text_conf();
        if confidence < MIN_MEAN_CONFIDENCE {
            debug!(confidence, "Discarding low-confidence OCR output");
            return Ok(Vec::new());
        }

        let fragments: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        debug!(
            fragments = fragments.len(),
            confidence, "OCR recognition complete"
        );

        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OcrConfig::default();
        assert_eq!(config.language, "fra");
        assert_eq!(config.page_segmentation_mode, 6);
    }

    #[test]
    fn test_init_error_carries_language() {
        let error = OcrError::Init {
            language: "xx_missing".to_string(),
            message: "no traineddata".to_string(),
        };
        let display = format!("{error}");
        assert!(display.contains("xx_missing"));
        assert!(display.contains("no traineddata"));
    }

    #[test]
    fn test_engine_rejects_unknown_language() {
        let config = OcrConfig {
            language: "definitely_not_a_language".to_string(),
            ..OcrConfig::default()
        };
        // Only meaningful where Tesseract itself is installed; an Init
        // error is acceptable either way.
        if let Err(e) = OcrEngine::new(&config) {
            assert!(matches!(e, OcrError::Init { .. }));
        }
    }
}
