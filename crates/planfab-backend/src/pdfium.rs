//! Pdfium adapter: document loading, page rasterization and native text
//! extraction.
//!
//! One [`PdfiumRasterizer`] binds the pdfium library once and opens one
//! document per request. Pdfium is not reentrant, so all calls for a
//! document stay on the thread that opened it; rasters leave this module
//! as owned [`image`] buffers that other threads may consume freely.

// Dimension and DPI conversions cast between f32 and integer pixel
// sizes; page dimensions are far below the lossy ranges.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use image::RgbImage;
use pdfium_render::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use planfab_core::{DetectError, Result};

/// PDF points per inch, the standard PostScript/PDF unit.
pub const PDF_POINTS_PER_INCH: f32 = 72.0;

/// A page-scoped rendering failure.
///
/// Recorded by the orchestrator; never aborts the document.
#[derive(Error, Debug)]
#[error("failed to render page {page}: {message}")]
pub struct PageRenderError {
    /// Zero-based index of the failing page.
    pub page: usize,
    /// Underlying pdfium failure.
    pub message: String,
}

/// One rasterized page with its native text candidate.
///
/// The raster buffer is the largest allocation in the pipeline; values
/// of this type are scoped to a single page's processing and dropped as
/// soon as extraction hands its fragments onward.
#[derive(Debug)]
pub struct RasterPage {
    /// Zero-based page index.
    pub index: usize,
    /// Page raster at the requested DPI.
    pub image: RgbImage,
    /// Embedded text layer, empty when the page has none.
    pub native_text: String,
    /// Page width in PDF points.
    pub width_pts: f32,
    /// Page height in PDF points.
    pub height_pts: f32,
}

impl RasterPage {
    /// Page area in square inches.
    #[must_use = "area is computed but not used"]
    pub fn area_square_inches(&self) -> f32 {
        (self.width_pts / PDF_POINTS_PER_INCH) * (self.height_pts / PDF_POINTS_PER_INCH)
    }

    /// Native text density in characters per square inch.
    ///
    /// The density decides whether the embedded layer is trusted or the
    /// page is treated as a scan and routed through OCR.
    #[must_use = "density is computed but not used"]
    pub fn native_density(&self) -> f32 {
        let area = self.area_square_inches();
        if area <= 0.0 {
            return 0.0;
        }
        self.native_text.chars().filter(|c| !c.is_whitespace()).count() as f32 / area
    }
}

/// Pdfium binding shared by all documents of a process.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    /// Bind the pdfium library.
    ///
    /// Tries a library next to the executable first, then the system
    /// library path.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::BackendUnavailable`] when no pdfium
    /// library can be loaded.
    pub fn new() -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| {
                DetectError::BackendUnavailable(format!(
                    "failed to load pdfium library, install libpdfium: {e:?}"
                ))
            })?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Open a document from an in-memory byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::InvalidPdf`] when the bytes cannot be
    /// parsed as a PDF at all. Per-page problems surface later, from
    /// [`PdfiumDocument::acquire_page`].
    pub fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<PdfiumDocument<'a>> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| DetectError::InvalidPdf(format!("{e:?}")))?;

        debug!(pages = document.pages().len(), "Opened PDF document");

        Ok(PdfiumDocument { document })
    }
}

/// One open PDF document.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumDocument<'_> {
    /// Number of pages in the document.
    #[must_use = "page count is returned but not used"]
    pub fn page_count(&self) -> usize {
        usize::from(self.document.pages().len())
    }

    /// Rasterize one page at the given DPI and extract its native text
    /// layer.
    ///
    /// A text-layer read failure is not a page failure: scanned pages
    /// routinely have no text object, so the candidate is simply empty.
    ///
    /// # Errors
    ///
    /// Returns [`PageRenderError`] when the page object cannot be parsed
    /// or rendered; the caller records the failure and continues with
    /// the remaining pages.
    pub fn acquire_page(
        &self,
        index: usize,
        dpi: f32,
    ) -> std::result::Result<RasterPage, PageRenderError> {
        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|e| PageRenderError {
                page: index,
                message: format!("failed to load page object: {e:?}"),
            })?;

        let width_pts = page.width().value;
        let height_pts = page.height().value;

        let render_config = PdfRenderConfig::new()
            .set_target_width((width_pts * dpi / PDF_POINTS_PER_INCH) as i32)
            .set_target_height((height_pts * dpi / PDF_POINTS_PER_INCH) as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| PageRenderError {
                page: index,
                message: format!("failed to render: {e:?}"),
            })?;

        let image = bitmap.as_image().to_rgb8();

        let native_text = match page.text() {
            Ok(text) => text.all(),
            Err(e) => {
                warn!(page = index, error = ?e, "No readable text layer on page");
                String::new()
            }
        };

        debug!(
            page = index,
            raster_w = image.width(),
            raster_h = image.height(),
            native_chars = native_text.chars().count(),
            "Acquired page"
        );

        Ok(RasterPage {
            index,
            image,
            native_text,
            width_pts,
            height_pts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_text(text: &str, width_pts: f32, height_pts: f32) -> RasterPage {
        RasterPage {
            index: 0,
            image: RgbImage::new(1, 1),
            native_text: text.to_string(),
            width_pts,
            height_pts,
        }
    }

    #[test]
    fn test_area_of_a4_portrait() {
        // A4 is 595 x 842 points.
        let page = page_with_text("", 595.0, 842.0);
        let area = page.area_square_inches();
        assert!((area - 96.66).abs() < 0.1, "unexpected area {area}");
    }

    #[test]
    fn test_density_ignores_whitespace() {
        let page = page_with_text("AB CD\n", 72.0, 72.0);
        assert!((page.native_density() - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_density_of_degenerate_page_is_zero() {
        let page = page_with_text("ABCD", 0.0, 842.0);
        assert_eq!(page.native_density(), 0.0);
    }

    #[test]
    fn test_render_error_display() {
        let error = PageRenderError {
            page: 3,
            message: "corrupt page object".to_string(),
        };
        let display = format!("{error}");
        assert!(display.contains("page 3"));
        assert!(display.contains("corrupt"));
    }
}
