//! JPEG encoder for processed frames.
//!
//! Produces one self-contained JPEG per frame, which is exactly what the
//! broadcast server sends as a single binary message. Output is a pure
//! function of the frame and the quality setting.

use bytes::Bytes;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

use crate::error::EncodeError;
use crate::frame::{Frame, PixelFormat};

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 95;

// ── FrameEncoder ─────────────────────────────────────────────────

/// Lossy still-image encoder with a fixed quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoder {
    /// JPEG quality, always in `1..=100`.
    quality: u8,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY)
    }
}

impl FrameEncoder {
    /// Create an encoder; `quality` is clamped to `1..=100`.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn set_quality(&mut self, quality: u8) {
        self.quality = quality.clamp(1, 100);
    }

    /// Encode `frame` at the configured quality.
    pub fn encode(&self, frame: &Frame) -> Result<Bytes, EncodeError> {
        encode_jpeg(frame, self.quality)
    }
}

/// Encode `frame` as a baseline JPEG at `quality` (clamped to `1..=100`).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Bytes, EncodeError> {
    if frame.is_empty() {
        return Err(EncodeError::EmptyFrame);
    }

    let color = match frame.format() {
        PixelFormat::Gray8 => ExtendedColorType::L8,
        PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
    };

    // Rough upper bound for typical content; the Vec grows if needed.
    let mut out = Vec::with_capacity(frame.samples().len() / 4);
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode(
        frame.samples(),
        frame.width(),
        frame.height(),
        color,
    )?;
    Ok(Bytes::from(out))
}

// ── Tests ────────────────────────────────────────────────────────
