//! Per-frame transformations.
//!
//! The set of filter kinds is closed: [`FilterKind`] is a sum type over
//! grayscale, resize and lookup-table remap, plus a [`Custom`](FilterKind::Custom)
//! escape hatch for embedders. A [`Filter`] wraps one kind with a name and
//! an enabled flag and is shared through [`SharedFilter`], so a
//! configuration surface and the pipeline observe the same instance.
//!
//! | Module      | Purpose                                   |
//! |-------------|-------------------------------------------|
//! | `grayscale` | Luma reduction of colour frames           |
//! | `resize`    | Bilinear resize by dimensions or scale    |
//! | `lut`       | 256-entry lookup-table remap              |
//! | `params`    | Typed extraction from JSON values         |

pub mod grayscale;
pub mod lut;
pub mod params;
pub mod resize;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::error::{FilterError, ParameterError};
use crate::frame::Frame;
use crate::log::{self, SharedLogger};

pub use grayscale::GrayscaleFilter;
pub use lut::{LutFilter, LutKind};
pub use resize::{ResizeFilter, ResizeMode};

/// Reference-counted filter handle.
pub type SharedFilter = Arc<Filter>;

// ── CustomFilter ─────────────────────────────────────────────────

/// Extension point for transformations outside the built-in kinds.
pub trait CustomFilter: Send {
    /// Stable identifier reported by the filter.
    fn name(&self) -> &str;

    fn apply(&mut self, input: &Frame) -> Result<Frame, FilterError>;

    fn set_parameter(&mut self, name: &str, _value: &Value) -> Result<(), ParameterError> {
        Err(ParameterError::Unknown {
            filter: self.name().to_string(),
            name: name.to_string(),
        })
    }

    fn parameters(&self) -> Map<String, Value> {
        Map::new()
    }
}

// ── FilterKind ───────────────────────────────────────────────────

/// The kind-specific state of a filter.
pub enum FilterKind {
    Grayscale(GrayscaleFilter),
    Resize(ResizeFilter),
    Lut(LutFilter),
    Custom(Box<dyn CustomFilter>),
}

impl FilterKind {
    fn name(&self) -> String {
        match self {
            FilterKind::Grayscale(_) => GrayscaleFilter::NAME.to_string(),
            FilterKind::Resize(_) => ResizeFilter::NAME.to_string(),
            FilterKind::Lut(_) => LutFilter::NAME.to_string(),
            FilterKind::Custom(c) => c.name().to_string(),
        }
    }

    fn apply(&mut self, input: &Frame) -> Result<Frame, FilterError> {
        match self {
            FilterKind::Grayscale(f) => Ok(f.apply(input)),
            FilterKind::Resize(f) => f.apply(input),
            FilterKind::Lut(f) => Ok(f.apply(input)),
            FilterKind::Custom(f) => f.apply(input),
        }
    }

    fn set_parameter(&mut self, filter: &str, name: &str, value: &Value) -> Result<(), ParameterError> {
        match self {
            FilterKind::Grayscale(_) => Err(ParameterError::Unknown {
                filter: filter.to_string(),
                name: name.to_string(),
            }),
            FilterKind::Resize(f) => f.set_parameter(name, value),
            FilterKind::Lut(f) => f.set_parameter(name, value),
            FilterKind::Custom(f) => f.set_parameter(name, value),
        }
    }

    fn parameters(&self) -> Map<String, Value> {
        match self {
            FilterKind::Grayscale(_) => Map::new(),
            FilterKind::Resize(f) => f.parameters(),
            FilterKind::Lut(f) => f.parameters(),
            FilterKind::Custom(f) => f.parameters(),
        }
    }
}

impl From<GrayscaleFilter> for FilterKind {
    fn from(f: GrayscaleFilter) -> Self {
        FilterKind::Grayscale(f)
    }
}

impl From<ResizeFilter> for FilterKind {
    fn from(f: ResizeFilter) -> Self {
        FilterKind::Resize(f)
    }
}

impl From<LutFilter> for FilterKind {
    fn from(f: LutFilter) -> Self {
        FilterKind::Lut(f)
    }
}

// ── Filter ───────────────────────────────────────────────────────

/// A named, enable-able, parameterised transformation.
///
/// All mutation goes through `&self`, so a [`SharedFilter`] can be
/// reconfigured from one thread while the pipeline applies it on another.
pub struct Filter {
    name: String,
    enabled: AtomicBool,
    kind: Mutex<FilterKind>,
    logger: SharedLogger,
}

impl Filter {
    pub fn new(kind: impl Into<FilterKind>) -> Self {
        let kind = kind.into();
        Self {
            name: kind.name(),
            enabled: AtomicBool::new(true),
            kind: Mutex::new(kind),
            logger: log::null(),
        }
    }

    /// Wrap an embedder-defined transformation.
    pub fn custom(filter: impl CustomFilter + 'static) -> Self {
        Self::new(FilterKind::Custom(Box::new(filter)))
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Move into a shared handle.
    pub fn shared(self) -> SharedFilter {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Transform `input` into a new frame.
    ///
    /// Never returns an empty frame on success.
    pub fn apply(&self, input: &Frame) -> Result<Frame, FilterError> {
        let mut kind = self.kind.lock().map_err(|_| FilterError::Poisoned)?;
        let output = kind.apply(input)?;
        if output.is_empty() {
            return Err(FilterError::EmptyOutput);
        }
        Ok(output)
    }

    /// Set a named parameter.
    ///
    /// `"enabled"` is accepted by every kind. Rejections are logged as
    /// warnings and the previous value stays in effect.
    pub fn set_parameter(&self, name: &str, value: &Value) -> Result<(), ParameterError> {
        let result = if name == "enabled" {
            params::as_bool(name, value).map(|enabled| self.set_enabled(enabled))
        } else {
            match self.kind.lock() {
                Ok(mut kind) => kind.set_parameter(&self.name, name, value),
                Err(_) => Err(ParameterError::Poisoned),
            }
        };

        match &result {
            Ok(()) => self
                .logger
                .debug(&format!("{}: {name} set to {value}", self.name)),
            Err(e) => self.logger.warning(&format!("{}: {e}", self.name)),
        }
        result
    }

    /// Current parameters as a JSON object, including `enabled`.
    pub fn parameters(&self) -> Value {
        let mut map = match self.kind.lock() {
            Ok(kind) => kind.parameters(),
            Err(_) => Map::new(),
        };
        map.insert("enabled".into(), Value::Bool(self.is_enabled()));
        Value::Object(map)
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::frame::PixelFormat;
    use crate::log::testing::RecordingLogger;
    use crate::log::Level;

    struct Doubler;

    impl CustomFilter for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }

        fn apply(&mut self, input: &Frame) -> Result<Frame, FilterError> {
            let mut out = input.clone();
            for s in out.samples_mut() {
                *s = s.saturating_mul(2);
            }
            Ok(out)
        }
    }

    struct Vanisher;

    impl CustomFilter for Vanisher {
        fn name(&self) -> &str {
            "vanisher"
        }

        fn apply(&mut self, _input: &Frame) -> Result<Frame, FilterError> {
            Ok(Frame::empty())
        }
    }

    #[test]
    fn names_follow_kind() {
        assert_eq!(Filter::new(GrayscaleFilter::new()).name(), "grayscale");
        assert_eq!(Filter::new(LutFilter::new(LutKind::Invert)).name(), "lut");
        assert_eq!(Filter::custom(Doubler).name(), "doubler");
    }

    #[test]
    fn shared_handles_see_the_same_state() {
        let filter = Filter::new(LutFilter::new(LutKind::Identity)).shared();
        let ui_handle = Arc::clone(&filter);

        ui_handle.set_enabled(false);
        assert!(!filter.is_enabled());

        ui_handle
            .set_parameter("lut_type", &json!("invert"))
            .unwrap();
        let out = filter
            .apply(&Frame::filled(1, 1, PixelFormat::Gray8, &[10]))
            .unwrap();
        assert_eq!(out.samples(), &[245]);
    }

    #[test]
    fn empty_output_is_an_error() {
        let filter = Filter::custom(Vanisher);
        let err = filter
            .apply(&Frame::filled(2, 2, PixelFormat::Gray8, &[1]))
            .unwrap_err();
        assert_eq!(err, FilterError::EmptyOutput);
    }

    #[test]
    fn custom_filter_applies() {
        let filter = Filter::custom(Doubler);
        let out = filter
            .apply(&Frame::filled(1, 1, PixelFormat::Gray8, &[100]))
            .unwrap();
        assert_eq!(out.samples(), &[200]);
    }

    #[test]
    fn enabled_parameter_is_universal() {
        let filter = Filter::new(GrayscaleFilter::new());
        filter.set_parameter("enabled", &json!(false)).unwrap();
        assert!(!filter.is_enabled());
        assert_eq!(filter.parameters()["enabled"], json!(false));

        let err = filter.set_parameter("enabled", &json!("yes")).unwrap_err();
        assert!(matches!(err, ParameterError::InvalidType { .. }));
    }

    #[test]
    fn unknown_parameter_warns_and_rejects() {
        let logger = Arc::new(RecordingLogger::default());
        let filter = Filter::new(GrayscaleFilter::new()).with_logger(logger.clone());

        let err = filter.set_parameter("sigma", &json!(2.0)).unwrap_err();
        assert!(matches!(err, ParameterError::Unknown { .. }));
        assert_eq!(logger.count(Level::Warning), 1);

        let err = Filter::custom(Doubler)
            .set_parameter("gain", &json!(2))
            .unwrap_err();
        assert!(matches!(err, ParameterError::Unknown { .. }));
    }
}
