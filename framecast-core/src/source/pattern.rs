//! Synthetic moving gradient, for demos and soak tests without a camera.

use crate::error::SourceError;
use crate::frame::{Frame, PixelFormat};
use crate::source::FrameSource;

/// Generates a diagonal gradient that scrolls one step per frame.
#[derive(Debug, Clone)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    format: PixelFormat,
    frame_rate: f64,
    /// Stop after this many frames; `None` runs forever.
    limit: Option<u64>,
    produced: u64,
    opened: bool,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgb8,
            frame_rate: 30.0,
            limit: None,
            produced: 0,
            opened: false,
        }
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.frame_rate = fps;
        self
    }

    /// Stop with end-of-stream after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Frame number `n` of the pattern.
    pub fn render(&self, n: u64) -> Frame {
        let shift = (n % 256) as u32;
        let (w, h) = (self.width.max(1), self.height.max(1));
        let mut data = Vec::with_capacity(w as usize * h as usize * self.format.channels());
        for y in 0..h {
            for x in 0..w {
                let r = ((x * 255 / w + shift) % 256) as u8;
                let g = ((y * 255 / h + shift) % 256) as u8;
                let b = (((x + y) * 255 / (w + h) + 2 * shift) % 256) as u8;
                match self.format {
                    PixelFormat::Gray8 => data.push(r / 2 + g / 2),
                    PixelFormat::Rgb8 => data.extend_from_slice(&[r, g, b]),
                }
            }
        }
        Frame::new(w, h, self.format, data).unwrap_or_else(|_| Frame::empty())
    }
}

impl FrameSource for TestPatternSource {
    fn open(&mut self) -> Result<(), SourceError> {
        if self.width == 0 || self.height == 0 {
            return Err(SourceError::Open(format!(
                "invalid pattern size {}x{}",
                self.width, self.height
            )));
        }
        if !self.opened {
            self.produced = 0;
            self.opened = true;
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, SourceError> {
        if !self.opened {
            return Err(SourceError::NotOpened);
        }
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            return Err(SourceError::EndOfStream);
        }
        let frame = self.render(self.produced);
        self.produced += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn name(&self) -> String {
        format!("pattern:{}x{}", self.width, self.height)
    }
}
