// THEORY:
// A `Frame` is the normalized comparison form of one camera image: single channel
// intensity, Gaussian-smoothed so that sensor grain and flickering light do not
// register as motion. It is rebuilt every cycle and never mutated afterwards; the
// reference frame is simply a `Frame` that the reference manager decided to keep.

use image::{GrayImage, RgbImage, imageops};

/// A grayscale, smoothed snapshot of the scene.
#[derive(Debug, Clone)]
pub struct Frame {
    pub intensity: GrayImage,
}

impl Frame {
    /// Converts an RGB camera image into its smoothed intensity form.
    pub fn prepare(image: &RgbImage, blur_size: u32) -> Self {
        let gray = imageops::grayscale(image);
        let intensity = imageops::blur(&gray, sigma_for_kernel(blur_size));
        Self { intensity }
    }

    pub fn width(&self) -> u32 {
        self.intensity.width()
    }

    pub fn height(&self) -> u32 {
        self.intensity.height()
    }

    pub fn same_dimensions(&self, other: &Frame) -> bool {
        self.intensity.dimensions() == other.intensity.dimensions()
    }
}

/// Gaussian sigma for a square kernel of the given size, matching the rule OpenCV
/// applies when asked for sigma 0.
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    let k = kernel_size.max(1) as f32;
    0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
}
