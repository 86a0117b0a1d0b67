//! Per-page extraction strategy.
//!
//! A page with a dense embedded text layer is trusted verbatim: fast,
//! reliable and language independent. Everything else is treated as a
//! scan, and OCR concentrates on the title-block region where French
//! fabrication drawings carry their cartouche.

use image::GrayImage;
use tracing::debug;

use planfab_backend::RasterPage;
use planfab_ocr::preprocess;

/// Horizontal start of the title-block crop, as a fraction of page width.
pub const TITLE_BLOCK_X_FRAC: f32 = 0.42;

/// Vertical start of the title-block crop, as a fraction of page height.
pub const TITLE_BLOCK_Y_FRAC: f32 = 0.55;

/// Outcome of the extraction strategy decision for one page.
#[derive(Debug)]
pub enum Extraction {
    /// The embedded text layer is dense enough to use verbatim.
    Native(Vec<String>),
    /// The page needs OCR; carries the preprocessed title-block crop.
    NeedsOcr(GrayImage),
}

/// Decide how to extract text from a page.
#[must_use = "the extraction decision drives the page's processing"]
pub fn plan_extraction(page: &RasterPage, min_text_density: f32) -> Extraction {
    let density = page.native_density();
    if density >= min_text_density {
        debug!(page = page.index, density, "Using native text layer");
        return Extraction::Native(native_fragments(&page.native_text));
    }

    debug!(page = page.index, density, "Routing page through OCR");
    let crop = preprocess::crop_fraction(&page.image, TITLE_BLOCK_X_FRAC, TITLE_BLOCK_Y_FRAC);
    Extraction::NeedsOcr(preprocess::prepare_region(&crop))
}

/// Split a native text layer into ordered, non-empty line fragments.
fn native_fragments(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn page(native_text: &str, width_pts: f32, height_pts: f32) -> RasterPage {
        RasterPage {
            index: 0,
            image: RgbImage::from_pixel(120, 120, image::Rgb([255, 255, 255])),
            native_text: native_text.to_string(),
            width_pts,
            height_pts,
        }
    }

    #[test]
    fn test_dense_native_layer_is_used_verbatim() {
        // 72x72 points is one square inch; 40 characters is well above
        // the 3 chars-per-square-inch default.
        let page = page("PLAN DE FABRICATION\nECHELLE 1:20\nMATIERE ACIER", 72.0, 72.0);
        match plan_extraction(&page, 3.0) {
            Extraction::Native(fragments) => {
                assert_eq!(fragments.len(), 3);
                assert_eq!(fragments[0], "PLAN DE FABRICATION");
            }
            Extraction::NeedsOcr(_) => panic!("dense page should not be OCRed"),
        }
    }

    #[test]
    fn test_sparse_page_goes_to_ocr() {
        // A couple of stamped characters on an A4 sheet.
        let page = page("A4", 595.0, 842.0);
        assert!(matches!(
            plan_extraction(&page, 3.0),
            Extraction::NeedsOcr(_)
        ));
    }

    #[test]
    fn test_empty_layer_goes_to_ocr() {
        let page = page("", 595.0, 842.0);
        assert!(matches!(
            plan_extraction(&page, 3.0),
            Extraction::NeedsOcr(_)
        ));
    }

    #[test]
    fn test_native_fragments_drop_blank_lines() {
        let fragments = native_fragments("  DESSINE  \n\n\nCLIENT\n   ");
        assert_eq!(fragments, vec!["DESSINE".to_string(), "CLIENT".to_string()]);
    }
}
