//! OpenCV-backed `FrameSource`: a live camera by index, or a recorded video file.

use anyhow::{Context, Result, bail};
use image::RgbImage;
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use roseguard::{FrameSource, RoseguardError};
use std::time::{Duration, Instant};
use tracing::warn;

/// Consecutive empty reads tolerated from a live camera before giving up.
const MAX_EMPTY_READS: u32 = 30;

pub struct Camera {
    capture: VideoCapture,
    live: bool,
    width: u32,
    height: u32,
    raw: Mat,
}

impl Camera {
    /// `source` is a camera index ("0") or a path to a video file. Frames are
    /// delivered at `width` x `height` whatever the device produces.
    pub fn open(source: &str, width: u32, height: u32) -> Result<Self> {
        let (mut capture, live) = match source.parse::<i32>() {
            Ok(index) => (VideoCapture::new(index, videoio::CAP_ANY)?, true),
            Err(_) => (VideoCapture::from_file(source, videoio::CAP_ANY)?, false),
        };
        if !capture.is_opened()? {
            bail!("Could not open video source '{source}'");
        }
        if live {
            capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)?;
            capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)?;
        }
        Ok(Self {
            capture,
            live,
            width,
            height,
            raw: Mat::default(),
        })
    }

    /// Discards frames for `duration` so exposure and white balance settle.
    /// A no-op for recorded video.
    pub fn warm_up(&mut self, duration: Duration) -> Result<()> {
        if !self.live {
            return Ok(());
        }
        let start = Instant::now();
        while start.elapsed() < duration {
            self.capture
                .read(&mut self.raw)
                .context("Camera failed during warm-up")?;
        }
        Ok(())
    }

    fn to_rgb(&self) -> opencv::Result<Option<RgbImage>> {
        let size = Size::new(self.width as i32, self.height as i32);
        let mut resized = Mat::default();
        let bgr = if self.raw.size()? == size {
            &self.raw
        } else {
            imgproc::resize(&self.raw, &mut resized, size, 0.0, 0.0, imgproc::INTER_AREA)?;
            &resized
        };

        let mut rgb = Mat::default();
        imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        Ok(RgbImage::from_raw(
            self.width,
            self.height,
            rgb.data_bytes()?.to_vec(),
        ))
    }
}

impl FrameSource for Camera {
    fn next_frame(&mut self) -> roseguard::Result<Option<RgbImage>> {
        let mut empty_reads = 0;
        loop {
            let grabbed = self
                .capture
                .read(&mut self.raw)
                .map_err(|e| RoseguardError::Acquisition(e.to_string()))?;

            if grabbed && !self.raw.empty() {
                break;
            }
            if !self.live {
                return Ok(None);
            }
            empty_reads += 1;
            if empty_reads >= MAX_EMPTY_READS {
                return Err(RoseguardError::Acquisition(format!(
                    "camera returned {empty_reads} empty frames in a row"
                )));
            }
            warn!("Camera returned an empty frame; retrying.");
        }

        match self.to_rgb() {
            Ok(Some(image)) => Ok(Some(image)),
            Ok(None) => Err(RoseguardError::Acquisition(
                "converted frame has an unexpected size".into(),
            )),
            Err(e) => Err(RoseguardError::Acquisition(e.to_string())),
        }
    }
}
