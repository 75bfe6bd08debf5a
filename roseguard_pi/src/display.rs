//! Live preview window and optional annotated recording.
//!
//! Every cycle's image is annotated with the tracker status, a box around the
//! target and the wall-clock time, then shown in a HighGUI window and/or written
//! to a video file. Neither is required for the guard to work: a missing display
//! degrades to headless, and drawing errors are logged and ignored.

use anyhow::{Context, Result};
use chrono::Local;
use image::RgbImage;
use opencv::{
    core::{self, Mat, Point, Rect, Scalar},
    highgui, imgproc,
    prelude::*,
    videoio::VideoWriter,
};
use roseguard::core_modules::detection::Detection;
use roseguard::core_modules::tracker::TrackState;
use roseguard::{CycleReport, LoopControl};
use std::path::Path;
use tracing::{info, warn};

const WINDOW: &str = "Roseguard Feed";
const BOX_HALF: i32 = 20;
const RECORD_FPS: f64 = 10.0;

/// Status line drawn in the top-left corner.
pub fn status_text(state: TrackState, debugging: bool) -> String {
    let mut text = format!("Status: {}", state.label());
    if debugging {
        text.push_str(" (DEBUG MODE)");
    }
    text
}

/// The 40x40 box around the target center, clipped to the frame.
pub fn target_box(detection: &Detection, width: u32, height: u32) -> Rect {
    let cx = detection.center_x as i32;
    let cy = detection.center_y as i32;
    let x0 = (cx - BOX_HALF).max(0);
    let y0 = (cy - BOX_HALF).max(0);
    let x1 = (cx + BOX_HALF).min(width as i32);
    let y1 = (cy + BOX_HALF).min(height as i32);
    Rect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
}

/// What the overlay shows. Refresh cycles keep the previous status on screen.
#[derive(Debug, Clone, Copy, Default)]
struct Status {
    state: TrackState,
    debugging: bool,
    target: Option<Detection>,
}

pub struct Display {
    window: bool,
    recorder: Option<VideoWriter>,
    status: Status,
}

impl Display {
    /// Opens the preview window unless `headless`, and a recording if `record` is set.
    pub fn open(headless: bool, record: Option<&Path>, width: u32, height: u32) -> Result<Self> {
        let window = !headless
            && match highgui::named_window(WINDOW, highgui::WINDOW_AUTOSIZE) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Could not open preview window ({e}); running headless.");
                    false
                }
            };

        let recorder = match record {
            Some(path) => {
                let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
                let writer = VideoWriter::new(
                    &path.to_string_lossy(),
                    fourcc,
                    RECORD_FPS,
                    core::Size::new(width as i32, height as i32),
                    true,
                )
                .with_context(|| format!("Failed to open recording {}", path.display()))?;
                info!("Recording annotated feed to {}", path.display());
                Some(writer)
            }
            None => None,
        };

        Ok(Self {
            window,
            recorder,
            status: Status::default(),
        })
    }

    /// Annotates and presents one cycle. Returns `Quit` when `q` is pressed.
    pub fn show(&mut self, image: &RgbImage, report: &CycleReport) -> LoopControl {
        if let Some(outcome) = report.outcome() {
            self.status = Status {
                state: outcome.state,
                debugging: outcome.debugging,
                target: outcome.detection,
            };
        }
        if !self.window && self.recorder.is_none() {
            return LoopControl::Continue;
        }

        match self.present(image) {
            Ok(control) => control,
            Err(e) => {
                warn!("Preview failed: {e}");
                LoopControl::Continue
            }
        }
    }

    fn present(&mut self, image: &RgbImage) -> opencv::Result<LoopControl> {
        let frame = self.annotate(image)?;

        if let Some(writer) = self.recorder.as_mut() {
            writer.write(&frame)?;
        }

        if self.window {
            highgui::imshow(WINDOW, &frame)?;
            let key = highgui::wait_key(1)? & 0xFF;
            if key == 'q' as i32 {
                info!("'q' key pressed. Exiting.");
                return Ok(LoopControl::Quit);
            }
        }
        Ok(LoopControl::Continue)
    }

    fn annotate(&self, image: &RgbImage) -> opencv::Result<Mat> {
        let (width, height) = image.dimensions();
        let mut rgb = Mat::new_rows_cols_with_default(
            height as i32,
            width as i32,
            core::CV_8UC3,
            Scalar::all(0.0),
        )?;
        rgb.data_bytes_mut()?.copy_from_slice(image.as_raw());

        let mut frame = Mat::default();
        imgproc::cvt_color(&rgb, &mut frame, imgproc::COLOR_RGB2BGR, 0)?;

        let red = Scalar::new(0.0, 0.0, 255.0, 0.0);
        let green = Scalar::new(0.0, 255.0, 0.0, 0.0);

        if let Some(target) = &self.status.target {
            let rect = target_box(target, width, height);
            imgproc::rectangle(&mut frame, rect, green, 2, imgproc::LINE_8, 0)?;
        }

        imgproc::put_text(
            &mut frame,
            &status_text(self.status.state, self.status.debugging),
            Point::new(10, 20),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.7,
            red,
            2,
            imgproc::LINE_8,
            false,
        )?;
        imgproc::put_text(
            &mut frame,
            &Local::now().format("%A %d %B %Y %I:%M:%S%p").to_string(),
            Point::new(10, height as i32 - 10),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            red,
            1,
            imgproc::LINE_8,
            false,
        )?;

        Ok(frame)
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        if let Some(writer) = self.recorder.as_mut() {
            let _ = writer.release();
        }
        if self.window {
            let _ = highgui::destroy_all_windows();
        }
    }
}
