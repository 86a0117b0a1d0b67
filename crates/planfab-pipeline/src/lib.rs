//! # planfab-pipeline - Detection Pipeline Orchestration
//!
//! Sequences rasterization, text extraction and scoring per page, then
//! ranks the scored pages into a [`DetectionResult`]. The entry point is
//! [`PlanDetector`]:
//!
//! ```rust,ignore
//! use planfab_core::DetectionConfig;
//! use planfab_pipeline::PlanDetector;
//!
//! let detector = PlanDetector::new(DetectionConfig::default())?;
//! let result = detector.detect(&pdf_bytes)?;
//! println!("verdict: {}", result.verdict);
//! for page in &result.pages {
//!     println!("page {} scored {:.3}", page.page, page.score);
//! }
//! ```
//!
//! Data flows strictly downward: raw bytes, per-page raster and text,
//! per-page score, ranked result. Raster buffers live for a single
//! page's processing; OCR runs on a bounded worker pool with a deadline
//! per page.
//!
//! [`DetectionResult`]: planfab_core::DetectionResult

pub mod detector;
pub mod extract;

pub use detector::{run_detection, OcrScheduler, PageSource, PdfiumPageSource, PlanDetector};
pub use extract::{plan_extraction, Extraction, TITLE_BLOCK_X_FRAC, TITLE_BLOCK_Y_FRAC};
