//! Frame and pixel layout types shared by every pipeline stage.
//!
//! A [`Frame`] owns its sample buffer, so `clone()` is always a deep copy.
//! Frames cross thread boundaries by value; no two threads ever share a
//! mutable buffer.

use image::{GrayImage, RgbImage};

use crate::error::FramecastError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Sample layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 1 byte per pixel: intensity.
    Gray8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
}

impl PixelFormat {
    /// Samples per pixel.
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }

    /// Layout for a channel count, if supported.
    pub const fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::Gray8),
            3 => Some(PixelFormat::Rgb8),
            _ => None,
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// A rectangular, tightly packed image buffer.
///
/// `data` holds `height` rows of `width * channels` bytes. The empty frame
/// (zero width or height) is the only frame without samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an existing buffer, checking that its length matches the
    /// dimensions.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, FramecastError> {
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(FramecastError::InvalidFrame(format!(
                "{width}x{height} {format:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// A frame with no samples.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            format: PixelFormat::Gray8,
            data: Vec::new(),
        }
    }

    /// A frame where every pixel is `pixel`.
    ///
    /// `pixel` must hold exactly `format.channels()` samples; extra samples
    /// are ignored and missing ones are zero.
    pub fn filled(width: u32, height: u32, format: PixelFormat, pixel: &[u8]) -> Self {
        let channels = format.channels();
        let mut px = [0u8; 3];
        for (dst, src) in px.iter_mut().zip(pixel) {
            *dst = *src;
        }
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * channels);
        for _ in 0..count {
            data.extend_from_slice(&px[..channels]);
        }
        Self {
            width,
            height,
            format,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// `true` when the frame has no samples.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// All samples, row-major.
    pub fn samples(&self) -> &[u8] {
        &self.data
    }

    pub fn samples_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the frame and return its buffer.
    pub fn into_samples(self) -> Vec<u8> {
        self.data
    }

    /// Bytes in one row.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.channels()
    }

    /// Samples of the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.channels();
        let offset = y as usize * self.row_len() + x as usize * channels;
        self.data.get(offset..offset + channels)
    }

    /// Same width, height and channel count as `other`.
    pub fn same_shape(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }
}

// ── image interop ────────────────────────────────────────────────

impl From<GrayImage> for Frame {
    fn from(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Gray8,
            data: img.into_raw(),
        }
    }
}

impl From<RgbImage> for Frame {
    fn from(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgb8,
            data: img.into_raw(),
        }
    }
}

impl Frame {
    /// Copy into a gray image buffer (`Gray8` only).
    pub(crate) fn to_gray_image(&self) -> Option<GrayImage> {
        match self.format {
            PixelFormat::Gray8 => GrayImage::from_raw(self.width, self.height, self.data.clone()),
            PixelFormat::Rgb8 => None,
        }
    }

    pub(crate) fn to_rgb_image(&self) -> Option<RgbImage> {
        match self.format {
            PixelFormat::Rgb8 => RgbImage::from_raw(self.width, self.height, self.data.clone()),
            PixelFormat::Gray8 => None,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_buffer_length() {
        assert!(Frame::new(4, 2, PixelFormat::Rgb8, vec![0; 24]).is_ok());
        assert!(Frame::new(4, 2, PixelFormat::Rgb8, vec![0; 8]).is_err());
        assert!(Frame::new(4, 2, PixelFormat::Gray8, vec![0; 8]).is_ok());
    }

    #[test]
    fn empty_frame_is_empty() {
        assert!(Frame::empty().is_empty());
        assert!(Frame::filled(0, 5, PixelFormat::Gray8, &[1]).is_empty());
        assert!(!Frame::filled(1, 1, PixelFormat::Gray8, &[1]).is_empty());
    }

    #[test]
    fn filled_repeats_pixel() {
        let f = Frame::filled(3, 2, PixelFormat::Rgb8, &[10, 20, 30]);
        assert_eq!(f.samples().len(), 18);
        assert_eq!(f.pixel(2, 1), Some(&[10u8, 20, 30][..]));
        assert_eq!(f.pixel(3, 0), None);
    }

    #[test]
    fn clone_is_deep() {
        let original = Frame::filled(2, 2, PixelFormat::Gray8, &[7]);
        let mut copy = original.clone();
        copy.samples_mut()[0] = 99;
        assert_eq!(original.samples()[0], 7);
        assert_eq!(copy.samples()[0], 99);
    }

    #[test]
    fn image_roundtrip_keeps_shape() {
        let f = Frame::filled(5, 4, PixelFormat::Rgb8, &[1, 2, 3]);
        let img = f.to_rgb_image().unwrap();
        let back = Frame::from(img);
        assert_eq!(back, f);
        assert!(f.to_gray_image().is_none());
    }

    #[test]
    fn channels_from_format() {
        assert_eq!(PixelFormat::from_channels(1), Some(PixelFormat::Gray8));
        assert_eq!(PixelFormat::from_channels(3), Some(PixelFormat::Rgb8));
        assert_eq!(PixelFormat::from_channels(4), None);
    }
}
