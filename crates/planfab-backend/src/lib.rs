//! # planfab-backend - PDF Rasterization and Layout Analysis
//!
//! Pdfium-backed page access for the detection pipeline: open a document
//! from bytes, rasterize pages at a target DPI, pull the native text
//! layer, and derive line-geometry features from the raster.
//!
//! All pdfium calls stay on the thread that opened the document; the
//! rasters handed out are plain owned [`image`] buffers.

pub mod layout;
pub mod pdfium;

pub use layout::line_features;
pub use pdfium::{
    PageRenderError, PdfiumDocument, PdfiumRasterizer, RasterPage, PDF_POINTS_PER_INCH,
};
