// Directory-backed `Storage`: every shot leaves a JPEG of what the camera saw.

use crate::core_modules::peripherals::Storage;
use crate::error::Result;
use chrono::{DateTime, Local};
use image::{ImageEncoder, RgbImage};
use std::path::{Path, PathBuf};

const JPEG_QUALITY: u8 = 90;

/// Writes `trigger_<session>_<hint>.jpg` files into one directory.
pub struct ImageDirStorage {
    directory: PathBuf,
    session: String,
}

impl ImageDirStorage {
    /// Creates the directory if needed. `session_start` stamps every file name so
    /// pictures from different runs never collide.
    pub fn new(directory: impl AsRef<Path>, session_start: DateTime<Local>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            session: session_start.format("%Y%m%d_%H%M%S").to_string(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Storage for ImageDirStorage {
    fn save(&mut self, image: &RgbImage, hint: &str) -> Result<PathBuf> {
        let path = self
            .directory
            .join(format!("trigger_{}_{}.jpg", self.session, hint));
        let output = std::io::BufWriter::new(std::fs::File::create(&path)?);
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(output, JPEG_QUALITY);
        encoder.write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgb;

    #[test]
    fn saves_named_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let session = Local.with_ymd_and_hms(2024, 5, 17, 6, 30, 5).unwrap();
        let mut storage =
            ImageDirStorage::new(dir.path().join("trigger_pictures"), session).unwrap();

        let image = RgbImage::from_pixel(64, 48, Rgb([20, 120, 40]));
        let path = storage.save(&image, "3").unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "trigger_20240517_063005_3.jpg"
        );
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (64, 48));
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let storage = ImageDirStorage::new(&nested, Local::now()).unwrap();
        assert!(storage.directory().is_dir());
    }
}
