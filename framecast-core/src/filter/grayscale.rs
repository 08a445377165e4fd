//! Luma reduction.

use crate::frame::{Frame, PixelFormat};

/// BT.601 luma of an RGB triple, fixed-point with 14 fractional bits.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    let y = (R * r as u32 + G * g as u32 + B * b as u32 + (1 << 13)) >> 14;
    y.min(255) as u8
}

/// Reduces colour frames to one intensity channel.
///
/// Single-channel input passes through as a copy.
#[derive(Debug, Default, Clone)]
pub struct GrayscaleFilter;

impl GrayscaleFilter {
    pub const NAME: &'static str = "grayscale";

    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, input: &Frame) -> Frame {
        match input.format() {
            PixelFormat::Gray8 => input.clone(),
            PixelFormat::Rgb8 => {
                let data: Vec<u8> = input
                    .samples()
                    .chunks_exact(3)
                    .map(|px| luma(px[0], px[1], px[2]))
                    .collect();
                Frame::new(input.width(), input.height(), PixelFormat::Gray8, data)
                    .unwrap_or_else(|_| Frame::empty())
            }
        }
    }
}
