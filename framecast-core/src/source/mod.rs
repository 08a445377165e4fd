//! Frame acquisition.
//!
//! [`FrameSource`] is the contract the controller drives: open once, read
//! frames until an error, close. `read_frame` distinguishes a clean end of
//! stream ([`SourceError::EndOfStream`]) from real failures, although the
//! controller stops on either.
//!
//! | Source              | Produces                                   |
//! |---------------------|--------------------------------------------|
//! | [`ImageSource`]       | One decoded still image, repeated forever |
//! | [`MemorySource`]      | A fixed list of frames, optionally looped |
//! | [`TestPatternSource`] | A synthetic moving gradient               |

pub mod memory;
pub mod pattern;
pub mod still;

use crate::error::SourceError;
use crate::frame::Frame;

pub use memory::MemorySource;
pub use pattern::TestPatternSource;
pub use still::ImageSource;

/// A producer of frames.
///
/// Sources are moved onto the controller's worker thread, hence `Send`.
pub trait FrameSource: Send {
    /// Prepare the source. Calling `open` on an opened source is a no-op.
    fn open(&mut self) -> Result<(), SourceError>;

    /// Produce the next frame.
    ///
    /// Each returned frame is owned by the caller; later reads never
    /// modify it.
    fn read_frame(&mut self) -> Result<Frame, SourceError>;

    /// Release resources. Safe to call more than once.
    fn close(&mut self);

    /// Frame width in pixels, 0 when unknown.
    fn width(&self) -> u32;

    /// Frame height in pixels, 0 when unknown.
    fn height(&self) -> u32;

    /// Native frame rate, 0 for sources without timing.
    fn frame_rate(&self) -> f64;

    fn is_opened(&self) -> bool;

    /// Human-readable identifier for logs.
    fn name(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<(), SourceError> {
        (**self).open()
    }

    fn read_frame(&mut self) -> Result<Frame, SourceError> {
        (**self).read_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn frame_rate(&self) -> f64 {
        (**self).frame_rate()
    }

    fn is_opened(&self) -> bool {
        (**self).is_opened()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}
