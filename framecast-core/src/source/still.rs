//! Still-image source.

use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::frame::Frame;
use crate::log::{self, SharedLogger};
use crate::source::FrameSource;

/// Decodes one image file on `open` and yields a fresh copy of it on
/// every read.
pub struct ImageSource {
    path: PathBuf,
    frame: Option<Frame>,
    logger: SharedLogger,
}

impl ImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame: None,
            logger: log::null(),
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for ImageSource {
    fn open(&mut self) -> Result<(), SourceError> {
        if self.frame.is_some() {
            return Ok(());
        }
        if !self.path.exists() {
            return Err(SourceError::Open(format!(
                "{} does not exist",
                self.path.display()
            )));
        }

        let decoded = image::open(&self.path)
            .map_err(|e| SourceError::Decode(format!("{}: {e}", self.path.display())))?;
        let frame = Frame::from(decoded.to_rgb8());
        if frame.is_empty() {
            return Err(SourceError::Decode(format!(
                "{} has no pixels",
                self.path.display()
            )));
        }

        self.logger.info(&format!(
            "opened image {} ({}x{})",
            self.path.display(),
            frame.width(),
            frame.height()
        ));
        self.frame = Some(frame);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, SourceError> {
        self.frame.clone().ok_or(SourceError::NotOpened)
    }

    fn close(&mut self) {
        self.frame = None;
    }

    fn width(&self) -> u32 {
        self.frame.as_ref().map_or(0, Frame::width)
    }

    fn height(&self) -> u32 {
        self.frame.as_ref().map_or(0, Frame::height)
    }

    fn frame_rate(&self) -> f64 {
        0.0
    }

    fn is_opened(&self) -> bool {
        self.frame.is_some()
    }

    fn name(&self) -> String {
        format!("image:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::frame::PixelFormat;

    #[test]
    fn missing_file_fails_to_open() {
        let mut src = ImageSource::new("/definitely/not/here.png");
        assert!(matches!(src.open(), Err(SourceError::Open(_))));
        assert!(!src.is_opened());
        assert!(matches!(src.read_frame(), Err(SourceError::NotOpened)));
    }

    #[test]
    fn garbage_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        std::fs::write(&path, b"not an image").unwrap();
        let mut src = ImageSource::new(&path);
        assert!(matches!(src.open(), Err(SourceError::Decode(_))));
    }

    #[test]
    fn repeats_the_decoded_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        RgbImage::from_pixel(7, 5, Rgb([1, 2, 3])).save(&path).unwrap();

        let mut src = ImageSource::new(&path);
        src.open().unwrap();
        assert_eq!((src.width(), src.height()), (7, 5));
        assert_eq!(src.frame_rate(), 0.0);

        let a = src.read_frame().unwrap();
        let b = src.read_frame().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.format(), PixelFormat::Rgb8);
        assert_eq!(a.pixel(6, 4), Some(&[1u8, 2, 3][..]));

        src.close();
        assert!(!src.is_opened());
        assert_eq!(src.width(), 0);
    }
}
