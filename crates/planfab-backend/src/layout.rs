//! Line-geometry analysis of rasterized pages.
//!
//! Fabrication drawings read differently from assembly or layout sheets
//! at the stroke level: many short dimension and hatching segments, a
//! good share of them diagonal, and few of the very long axial frame
//! lines that dominate layout plans. This module recovers that signal
//! with canny edge detection and a Hough transform, then walks each
//! detected line across the edge map to split it into contiguous
//! segments with real lengths.
//!
//! The whole analysis is a pure function of the raster; a blank page
//! yields empty [`LineFeatures`].

// Pixel coordinates move between f32 geometry and integer indices; the
// analyzed raster is bounded well inside both ranges.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use image::imageops::FilterType;
use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use tracing::debug;

use planfab_core::LineFeatures;

/// Maximum working width for the analysis raster.
///
/// Larger pages are downscaled first; stroke statistics are scale
/// relative so the cutoffs below assume this working width.
const ANALYSIS_MAX_WIDTH: u32 = 1400;

/// Canny gradient thresholds.
const CANNY_LOW: f32 = 60.0;
const CANNY_HIGH: f32 = 180.0;

/// Minimum Hough votes for a candidate line.
const VOTE_THRESHOLD: u32 = 110;

/// Suppression radius merging near-duplicate Hough lines.
const SUPPRESSION_RADIUS: u32 = 8;

/// Maximum run of non-edge pixels tolerated inside one segment.
const MAX_SEGMENT_GAP: u32 = 10;

/// Minimum accepted segment length in pixels.
const MIN_SEGMENT_LEN: f32 = 80.0;

/// Segments longer than this count toward the long-line ratio.
const LONG_LINE_CUTOFF: f32 = 400.0;

/// Angular tolerance, in degrees, for calling a segment axial.
const AXIAL_TOLERANCE_DEG: f32 = 8.0;

/// Extract line features from a page raster.
#[must_use = "line features are computed but not used"]
pub fn line_features(image: &RgbImage) -> LineFeatures {
    let gray = downscale_gray(image);
    if gray.width() < 4 || gray.height() < 4 {
        return LineFeatures::default();
    }

    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: VOTE_THRESHOLD,
            suppression_radius: SUPPRESSION_RADIUS,
        },
    );

    let mut lengths: Vec<f32> = Vec::new();
    let mut non_axial = 0_usize;

    for line in &lines {
        let segments = walk_segments(&edges, line);
        let axial = is_axial(line);
        for len in segments {
            lengths.push(len);
            if !axial {
                non_axial += 1;
            }
        }
    }

    if lengths.is_empty() {
        debug!(hough_lines = lines.len(), "No usable segments on page");
        return LineFeatures::default();
    }

    let count = lengths.len();
    let long = lengths.iter().filter(|&&l| l > LONG_LINE_CUTOFF).count();

    lengths.sort_by(f32::total_cmp);
    let median_len = if count % 2 == 1 {
        lengths[count / 2]
    } else {
        (lengths[count / 2 - 1] + lengths[count / 2]) / 2.0
    };

    let features = LineFeatures {
        line_count: count,
        median_len,
        long_line_ratio: long as f32 / count as f32,
        non_axial_ratio: non_axial as f32 / count as f32,
    };

    debug!(
        segments = count,
        median_len = features.median_len,
        long_ratio = features.long_line_ratio,
        non_axial_ratio = features.non_axial_ratio,
        "Analyzed page geometry"
    );

    features
}

/// Grayscale and bound the raster to the analysis width.
fn downscale_gray(image: &RgbImage) -> GrayImage {
    let gray = image::imageops::grayscale(image);
    let (width, height) = gray.dimensions();
    if width <= ANALYSIS_MAX_WIDTH {
        return gray;
    }
    let scale = ANALYSIS_MAX_WIDTH as f32 / width as f32;
    let new_height = ((height as f32 * scale).round() as u32).max(1);
    image::imageops::resize(&gray, ANALYSIS_MAX_WIDTH, new_height, FilterType::Triangle)
}

/// Whether a Hough line runs horizontal or vertical within tolerance.
///
/// `angle_in_degrees` is the direction of the line's normal; the set of
/// axial directions is invariant under the 90 degree shift, so the test
/// can run on the normal directly.
fn is_axial(line: &PolarLine) -> bool {
    let mut a = line.angle_in_degrees as f32 % 180.0;
    if a > 90.0 {
        a = 180.0 - a;
    }
    a < AXIAL_TOLERANCE_DEG || a > 90.0 - AXIAL_TOLERANCE_DEG
}

/// Walk the edge map along one Hough line and collect contiguous segment
/// lengths.
///
/// The Hough transform reports infinite lines; the actual strokes are
/// runs of edge pixels along them. A run survives gaps up to
/// [`MAX_SEGMENT_GAP`] and is kept when at least [`MIN_SEGMENT_LEN`]
/// long.
fn walk_segments(edges: &GrayImage, line: &PolarLine) -> Vec<f32> {
    let (width, height) = edges.dimensions();
    let theta = (line.angle_in_degrees as f32).to_radians();
    let (sin, cos) = theta.sin_cos();

    // Base point on the line, direction along it.
    let base_x = line.r * cos;
    let base_y = line.r * sin;
    let (dir_x, dir_y) = (-sin, cos);

    let diagonal = ((width * width + height * height) as f32).sqrt();

    let mut segments = Vec::new();
    let mut run: u32 = 0;
    let mut gap: u32 = 0;

    let close_run = |run: &mut u32, gap: &mut u32, segments: &mut Vec<f32>| {
        if *run as f32 >= MIN_SEGMENT_LEN {
            segments.push(*run as f32);
        }
        *run = 0;
        *gap = 0;
    };

    let mut t = -diagonal;
    while t <= diagonal {
        let x = base_x + t * dir_x;
        let y = base_y + t * dir_y;
        t += 1.0;

        if x < 0.0 || y < 0.0 || x >= width as f32 || y >= height as f32 {
            close_run(&mut run, &mut gap, &mut segments);
            continue;
        }

        if edge_near(edges, x, y, cos, sin) {
            run += gap + 1;
            gap = 0;
        } else if run > 0 {
            gap += 1;
            if gap > MAX_SEGMENT_GAP {
                close_run(&mut run, &mut gap, &mut segments);
            }
        }
    }
    close_run(&mut run, &mut gap, &mut segments);

    segments
}

/// Check the pixel under a line sample plus one pixel to each side along
/// the normal, compensating for rounding against the thin canny ridge.
fn edge_near(edges: &GrayImage, x: f32, y: f32, normal_x: f32, normal_y: f32) -> bool {
    for offset in [-1.0_f32, 0.0, 1.0] {
        let px = (x + offset * normal_x).round();
        let py = (y + offset * normal_y).round();
        if px < 0.0 || py < 0.0 || px >= edges.width() as f32 || py >= edges.height() as f32 {
            continue;
        }
        if edges.get_pixel(px as u32, py as u32).0[0] > 0 {
            return true;
        }
    }
    false
}
