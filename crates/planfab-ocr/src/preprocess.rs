//! Image preparation for title-block OCR.
//!
//! Tesseract accuracy on stamped cartouche text improves markedly with a
//! clean binary input: grayscale, upscale narrow crops, a light blur to
//! knock out scan grain, then Otsu binarization.

use image::imageops::FilterType;
use image::{GrayImage, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::gaussian_blur_f32;

/// Minimum working width for a title-block crop.
///
/// Crops narrower than this are upscaled before binarization so that
/// small cartouche lettering stays above Tesseract's usable glyph size.
const MIN_CROP_WIDTH: u32 = 1200;

/// Blur radius applied before thresholding.
const BLUR_SIGMA: f32 = 0.8;

/// Prepare a raster region for recognition.
#[must_use = "prepared image is returned but not used"]
pub fn prepare_region(region: &RgbImage) -> GrayImage {
    let mut gray = image::imageops::grayscale(region);

    let (width, height) = gray.dimensions();
    if width > 0 && width < MIN_CROP_WIDTH {
        let scale = MIN_CROP_WIDTH as f32 / width as f32;
        let new_height = ((height as f32 * scale).round() as u32).max(1);
        gray = image::imageops::resize(&gray, MIN_CROP_WIDTH, new_height, FilterType::CatmullRom);
    }

    let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
    let level = otsu_level(&blurred);
    threshold(&blurred, level, ThresholdType::Binary)
}

/// Crop the fraction of an image below `y_frac` and right of `x_frac`.
///
/// French fabrication drawings carry their cartouche in the bottom-right
/// corner of the sheet; extraction concentrates OCR there.
#[must_use = "cropped image is returned but not used"]
pub fn crop_fraction(image: &RgbImage, x_frac: f32, y_frac: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    let x0 = ((width as f32 * x_frac) as u32).min(width.saturating_sub(1));
    let y0 = ((height as f32 * y_frac) as u32).min(height.saturating_sub(1));
    image::imageops::crop_imm(image, x0, y0, width - x0, height - y0).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_crop_fraction_keeps_bottom_right() {
        let mut img = RgbImage::from_pixel(100, 80, Rgb([255, 255, 255]));
        img.put_pixel(99, 79, Rgb([0, 0, 0]));
        let crop = crop_fraction(&img, 0.42, 0.55);
        assert_eq!(crop.dimensions(), (58, 36));
        let (w, h) = crop.dimensions();
        assert_eq!(crop.get_pixel(w - 1, h - 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_crop_fraction_zero_is_identity_size() {
        let img = RgbImage::from_pixel(64, 64, Rgb([10, 10, 10]));
        let crop = crop_fraction(&img, 0.0, 0.0);
        assert_eq!(crop.dimensions(), (64, 64));
    }

    #[test]
    fn test_prepare_region_upscales_narrow_crops() {
        let img = RgbImage::from_pixel(300, 100, Rgb([128, 128, 128]));
        let prepared = prepare_region(&img);
        assert_eq!(prepared.width(), 1200);
        assert_eq!(prepared.height(), 400);
    }

    #[test]
    fn test_prepare_region_binarizes() {
        let mut img = RgbImage::from_pixel(1400, 200, Rgb([255, 255, 255]));
        for x in 200..400 {
            for y in 50..150 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let prepared = prepare_region(&img);
        assert!(prepared.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }
}
