//! Error types for fabrication-plan detection.
//!
//! Fatal errors abort a request and are surfaced to the caller as a single
//! classification. Page-scoped failures are not errors in this sense: they
//! are recorded in [`PageFailure`](crate::page::PageFailure) entries on the
//! result and the affected page is scored at the floor.

use thiserror::Error;

/// Error types that can abort a detection request.
///
/// # Examples
///
/// ```rust,ignore
/// use planfab_core::{DetectError, Result};
///
/// match detector.detect(&bytes) {
///     Ok(result) => println!("verdict: {}", result.verdict),
///     Err(DetectError::DocumentTooLarge { size_bytes, limit_bytes }) => {
///         eprintln!("rejected: {size_bytes} > {limit_bytes}");
///     }
///     Err(DetectError::InvalidPdf(msg)) => eprintln!("not a PDF: {msg}"),
///     Err(e) => eprintln!("error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum DetectError {
    /// The uploaded byte stream exceeds the configured size limit.
    ///
    /// Raised before any parsing or rasterization takes place.
    #[error("document too large: {size_bytes} bytes exceeds limit of {limit_bytes} bytes")]
    DocumentTooLarge {
        /// Actual size of the uploaded document.
        size_bytes: usize,
        /// Configured limit derived from `max_pdf_mb`.
        limit_bytes: usize,
    },

    /// The byte stream could not be parsed as a PDF at all.
    ///
    /// Distinct from per-page render failures, which are recoverable and
    /// recorded on the result instead.
    #[error("invalid PDF: {0}")]
    InvalidPdf(String),

    /// The PDF rendering backend could not be loaded.
    #[error("PDF backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The OCR engine pool could not be started.
    ///
    /// Per-page OCR failures are page-scoped and never surface here.
    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    /// The supplied configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// File I/O error while reading an input document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error while rendering a result.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type alias for [`Result<T, DetectError>`].
pub type Result<T> = std::result::Result<T, DetectError>;
