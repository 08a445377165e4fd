//! In-memory frame list.

use crate::error::SourceError;
use crate::frame::Frame;
use crate::source::FrameSource;

/// Plays back a fixed list of frames.
///
/// Without looping the source reports [`SourceError::EndOfStream`] after
/// the last frame.
#[derive(Debug, Clone)]
pub struct MemorySource {
    frames: Vec<Frame>,
    position: usize,
    looping: bool,
    frame_rate: f64,
    opened: bool,
}

impl MemorySource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            position: 0,
            looping: false,
            frame_rate: 0.0,
            opened: false,
        }
    }

    /// Restart from the first frame after the last one.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Rate reported through [`FrameSource::frame_rate`].
    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.frame_rate = fps;
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames handed out since the last `open`.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl FrameSource for MemorySource {
    fn open(&mut self) -> Result<(), SourceError> {
        if self.frames.is_empty() {
            return Err(SourceError::Open("no frames to play".into()));
        }
        if !self.opened {
            self.position = 0;
            self.opened = true;
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, SourceError> {
        if !self.opened {
            return Err(SourceError::NotOpened);
        }
        let index = if self.looping {
            self.position % self.frames.len()
        } else {
            self.position
        };
        let frame = self
            .frames
            .get(index)
            .cloned()
            .ok_or(SourceError::EndOfStream)?;
        self.position += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn width(&self) -> u32 {
        self.frames.first().map_or(0, Frame::width)
    }

    fn height(&self) -> u32 {
        self.frames.first().map_or(0, Frame::height)
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn name(&self) -> String {
        format!("memory:{}", self.frames.len())
    }
}
