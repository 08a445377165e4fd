//! Geometric resize by explicit dimensions or by a scale factor.

use image::imageops::{self, FilterType};
use serde_json::{Map, Value};

use crate::error::{FilterError, ParameterError};
use crate::filter::params;
use crate::frame::{Frame, PixelFormat};

/// Largest edge the filter will produce.
pub const MAX_DIMENSION: u32 = 16_384;

/// How the target size is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeMode {
    Dimensions { width: u32, height: u32 },
    Scale(f64),
}

/// Bilinear resize.
///
/// Setting `scale` switches to scale mode; it stays in effect until both
/// `width` and `height` have been set again.
#[derive(Debug, Clone)]
pub struct ResizeFilter {
    mode: ResizeMode,
    width: Option<u32>,
    height: Option<u32>,
}

impl ResizeFilter {
    pub const NAME: &'static str = "resize";

    /// Resize every frame to `width x height`.
    pub fn new(width: u32, height: u32) -> Result<Self, ParameterError> {
        if width == 0 {
            return Err(params::out_of_range("width", width));
        }
        if height == 0 {
            return Err(params::out_of_range("height", height));
        }
        Ok(Self {
            mode: ResizeMode::Dimensions { width, height },
            width: Some(width),
            height: Some(height),
        })
    }

    /// Resize every frame by `scale` in both directions.
    pub fn with_scale(scale: f64) -> Result<Self, ParameterError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(params::out_of_range("scale", scale));
        }
        Ok(Self {
            mode: ResizeMode::Scale(scale),
            width: None,
            height: None,
        })
    }

    pub fn mode(&self) -> ResizeMode {
        self.mode
    }

    /// Output size for an input of `width x height`.
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self.mode {
            ResizeMode::Dimensions { width, height } => (width, height),
            ResizeMode::Scale(s) => (scaled(width, s), scaled(height, s)),
        }
    }

    pub fn apply(&self, input: &Frame) -> Result<Frame, FilterError> {
        let (tw, th) = self.target_size(input.width(), input.height());
        if tw > MAX_DIMENSION || th > MAX_DIMENSION {
            return Err(FilterError::Failed(format!(
                "target size {tw}x{th} exceeds {MAX_DIMENSION}"
            )));
        }

        if (tw, th) == (input.width(), input.height()) {
            return Ok(input.clone());
        }

        let out = match input.format() {
            PixelFormat::Gray8 => input
                .to_gray_image()
                .map(|img| Frame::from(imageops::resize(&img, tw, th, FilterType::Triangle))),
            PixelFormat::Rgb8 => input
                .to_rgb_image()
                .map(|img| Frame::from(imageops::resize(&img, tw, th, FilterType::Triangle))),
        };
        out.ok_or_else(|| FilterError::Failed("frame buffer does not match its dimensions".into()))
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<(), ParameterError> {
        match name {
            "width" => {
                self.width = Some(params::as_positive_u32(name, value)?);
                self.sync_dimensions();
            }
            "height" => {
                self.height = Some(params::as_positive_u32(name, value)?);
                self.sync_dimensions();
            }
            "scale" => {
                self.mode = ResizeMode::Scale(params::as_positive_f64(name, value)?);
            }
            _ => {
                return Err(ParameterError::Unknown {
                    filter: Self::NAME.into(),
                    name: name.into(),
                })
            }
        }
        Ok(())
    }

    pub fn parameters(&self) -> Map<String, Value> {
        let mut map = Map::new();
        let (mode, scale) = match self.mode {
            ResizeMode::Dimensions { .. } => ("dimensions", Value::Null),
            ResizeMode::Scale(s) => ("scale", Value::from(s)),
        };
        map.insert("mode".into(), Value::from(mode));
        map.insert("width".into(), self.width.map_or(Value::Null, Value::from));
        map.insert("height".into(), self.height.map_or(Value::Null, Value::from));
        map.insert("scale".into(), scale);
        map
    }

    fn sync_dimensions(&mut self) {
        if let (Some(width), Some(height)) = (self.width, self.height) {
            self.mode = ResizeMode::Dimensions { width, height };
        }
    }
}

fn scaled(dim: u32, scale: f64) -> u32 {
    let v = (dim as f64 * scale).round();
    if v >= u32::MAX as f64 {
        u32::MAX
    } else {
        (v as u32).max(1)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rejects_non_positive_construction() {
        assert!(ResizeFilter::new(0, 10).is_err());
        assert!(ResizeFilter::new(10, 0).is_err());
        assert!(ResizeFilter::with_scale(0.0).is_err());
        assert!(ResizeFilter::with_scale(-1.0).is_err());
        assert!(ResizeFilter::with_scale(f64::NAN).is_err());
    }

    #[test]
    fn resizes_to_dimensions() {
        let f = ResizeFilter::new(8, 6).unwrap();
        let out = f
            .apply(&Frame::filled(16, 12, PixelFormat::Rgb8, &[10, 20, 30]))
            .unwrap();
        assert_eq!((out.width(), out.height()), (8, 6));
        assert_eq!(out.format(), PixelFormat::Rgb8);
        assert!(out.samples().chunks(3).all(|px| px == [10, 20, 30]));
    }

    #[test]
    fn same_size_is_a_deep_copy() {
        let input = Frame::filled(5, 5, PixelFormat::Gray8, &[9]);
        let f = ResizeFilter::new(5, 5).unwrap();
        let mut out = f.apply(&input).unwrap();
        assert!(out.same_shape(&input));
        out.samples_mut()[0] = 200;
        assert_eq!(input.samples()[0], 9);
    }

    #[test]
    fn scale_mode_takes_precedence() {
        let mut f = ResizeFilter::new(100, 100).unwrap();
        f.set_parameter("scale", &json!(0.5)).unwrap();
        let out = f
            .apply(&Frame::filled(40, 20, PixelFormat::Gray8, &[1]))
            .unwrap();
        assert_eq!((out.width(), out.height()), (20, 10));

        // A single dimension is not enough to leave scale mode.
        let mut f = ResizeFilter::with_scale(2.0).unwrap();
        f.set_parameter("width", &json!(30)).unwrap();
        assert_eq!(f.mode(), ResizeMode::Scale(2.0));
        f.set_parameter("height", &json!(10)).unwrap();
        assert_eq!(
            f.mode(),
            ResizeMode::Dimensions {
                width: 30,
                height: 10
            }
        );
    }

    #[test]
    fn setting_dimensions_leaves_scale_mode() {
        let mut f = ResizeFilter::new(64, 48).unwrap();
        f.set_parameter("scale", &json!(3.0)).unwrap();
        f.set_parameter("width", &json!(32)).unwrap();
        assert_eq!(f.target_size(10, 10), (32, 48));
    }

    #[test]
    fn invalid_values_keep_previous() {
        let mut f = ResizeFilter::new(64, 48).unwrap();
        assert!(f.set_parameter("width", &json!(0)).is_err());
        assert!(f.set_parameter("height", &json!(-5)).is_err());
        assert!(f.set_parameter("scale", &json!(0)).is_err());
        assert!(f.set_parameter("depth", &json!(3)).is_err());
        assert_eq!(f.target_size(1, 1), (64, 48));
        assert_eq!(f.parameters()["mode"], json!("dimensions"));
    }

    #[test]
    fn tiny_scale_never_hits_zero() {
        let f = ResizeFilter::with_scale(0.001).unwrap();
        assert_eq!(f.target_size(10, 10), (1, 1));
    }

    #[test]
    fn oversized_target_fails() {
        let f = ResizeFilter::with_scale(10_000.0).unwrap();
        assert!(f.apply(&Frame::filled(4, 4, PixelFormat::Gray8, &[0])).is_err());
    }
}
