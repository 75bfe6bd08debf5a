// THEORY:
// The `MotionDetector` is the spatial layer of the controller. It compares the
// current smoothed frame with the reference frame and reports the single largest
// region of change, which is what the turret will aim at.
//
// Algorithm steps:
// 1.  **Differencing**: absolute per-pixel intensity difference against the
//     reference frame.
// 2.  **Binarization**: pixels whose difference exceeds the sensitivity threshold
//     become "moving"; everything else is background.
// 3.  **Dilation**: N passes of a 3x3 square element (one L-infinity dilation of
//     radius N) close the gaps between fragments of one object, a deer's legs and
//     body say, so they grow into one region.
// 4.  **External contours**: border following over the mask. Only outer borders
//     that are not nested inside another region's hole are kept, so a ring counts
//     once, with its hole, and anything inside the hole is ignored.
// 5.  **Selection**: each region is measured by the polygon area of its outer
//     border. The largest area above the minimum wins. A later region only
//     replaces the current best when it is strictly larger, so equal areas
//     resolve to the first region in raster order.
//
// The detector is stateless. A frame it cannot compare (wrong size) yields no
// detection rather than an error.

use crate::config::ControllerConfig;
use crate::core_modules::detection::Detection;
use crate::core_modules::frame::Frame;
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use imageproc::point::Point;
use tracing::warn;

const MOVING: u8 = 255;

/// Finds the dominant moving region of a frame relative to a reference frame.
#[derive(Debug, Clone)]
pub struct MotionDetector {
    min_contour_area: usize,
    threshold_sensitivity: u8,
    dilate_iterations: u8,
}

impl MotionDetector {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            min_contour_area: config.min_contour_area,
            threshold_sensitivity: config.threshold_sensitivity,
            dilate_iterations: config.dilate_iterations.min(u8::MAX as u32) as u8,
        }
    }

    /// Returns the bounding box and center of the largest qualifying region, if any.
    pub fn detect(&self, frame: &Frame, reference: &Frame) -> Option<Detection> {
        if !frame.same_dimensions(reference) {
            warn!(
                "Frame is {}x{} but reference is {}x{}; skipping detection.",
                frame.width(),
                frame.height(),
                reference.width(),
                reference.height()
            );
            return None;
        }

        // --- 1 & 2. Differencing and Binarization ---
        let mut mask = GrayImage::new(frame.width(), frame.height());
        for ((moving, current), background) in mask
            .pixels_mut()
            .zip(frame.intensity.pixels())
            .zip(reference.intensity.pixels())
        {
            if current[0].abs_diff(background[0]) > self.threshold_sensitivity {
                *moving = Luma([MOVING]);
            }
        }

        // --- 3. Dilation ---
        if self.dilate_iterations > 0 {
            mask = dilate(&mask, Norm::LInf, self.dilate_iterations);
        }

        // --- 4 & 5. External contours and Selection ---
        let mut best: Option<Detection> = None;
        for contour in find_contours::<i32>(&mask) {
            if !matches!(contour.border_type, BorderType::Outer) || contour.parent.is_some() {
                continue;
            }
            let Some(region) = outer_region(&contour.points) else {
                continue;
            };
            if region.area > self.min_contour_area as f64
                && best.is_none_or(|current| region.area > current.area)
            {
                best = Some(region);
            }
        }

        best
    }
}

/// Bounding box, center and enclosed area of one outer border.
fn outer_region(points: &[Point<i32>]) -> Option<Detection> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;

    Some(Detection::from_bounds(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
        polygon_area(points),
    ))
}

/// Shoelace area of the closed polygon through `points`.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    let twice: i64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum();
    twice.unsigned_abs() as f64 / 2.0
}
