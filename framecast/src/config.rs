//! Configuration for the framecast service.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use framecast_core::error::{FramecastError, ParameterError};
use framecast_core::filter::{Filter, GrayscaleFilter, LutFilter, LutKind, ResizeFilter, SharedFilter};
use framecast_core::filter::lut::{Lut, LUT_SIZE};
use framecast_core::frame::PixelFormat;
use framecast_core::log;
use framecast_core::source::{FrameSource, ImageSource, TestPatternSource};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Broadcast server settings.
    pub network: NetworkConfig,
    /// Frame source.
    pub source: SourceConfig,
    /// Processing loop settings.
    pub processing: ProcessingConfig,
    /// JPEG encoder settings.
    pub encoder: EncoderConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Filter chain, applied in order.
    pub filters: Vec<FilterConfig>,
}

/// Broadcast server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Serve frames over WebSocket at all.
    pub enabled: bool,
    /// TCP port for WebSocket clients.
    pub port: u16,
    /// Interface to bind.
    pub bind_address: IpAddr,
    /// Frames queued per client before that client starts dropping.
    pub client_queue: usize,
}

/// Where frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A still image file, repeated.
    Image,
    /// A synthetic moving gradient.
    Pattern,
}

/// Frame source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Image file for `kind = "image"`.
    pub path: PathBuf,
    /// Pattern width in pixels.
    pub width: u32,
    /// Pattern height in pixels.
    pub height: u32,
    /// Single-channel pattern.
    pub gray: bool,
    /// Stop after this many pattern frames (0 = unbounded).
    pub frames: u64,
    /// Rate reported by the pattern source.
    pub frame_rate: f64,
}

/// Processing loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Pipeline name used in logs.
    pub pipeline_name: String,
    /// Target frames per second (<= 0 runs unpaced).
    pub target_fps: f64,
}

/// Encoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub enabled: bool,
    /// JPEG quality, clamped to 1..=100.
    pub quality: u8,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

/// One entry of the `[[filters]]` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    Grayscale {
        #[serde(default = "default_enabled")]
        enabled: bool,
    },
    Resize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
        /// Takes precedence over `width`/`height` when set.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scale: Option<f64>,
        #[serde(default = "default_enabled")]
        enabled: bool,
    },
    Lut {
        #[serde(default = "default_lut_type")]
        lut_type: String,
        #[serde(default = "default_lut_param")]
        param: f64,
        /// 256 entries; selects the custom table.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom_lut: Option<Vec<u8>>,
        #[serde(default = "default_enabled")]
        enabled: bool,
    },
}

fn default_enabled() -> bool {
    true
}

fn default_lut_type() -> String {
    LutKind::Identity.as_str().to_string()
}

fn default_lut_param() -> f64 {
    1.0
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: framecast_core::server::DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            client_queue: framecast_core::server::DEFAULT_CLIENT_QUEUE,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Pattern,
            path: PathBuf::from("input.png"),
            width: 640,
            height: 480,
            gray: false,
            frames: 0,
            frame_rate: 30.0,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            pipeline_name: "main".into(),
            target_fps: 30.0,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: framecast_core::encoder::DEFAULT_QUALITY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl StreamConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Build every configured filter, in order.
    pub fn build_filters(&self) -> Result<Vec<SharedFilter>, FramecastError> {
        self.filters.iter().map(FilterConfig::build).collect()
    }
}

impl SourceConfig {
    /// Instantiate the configured source (not yet opened).
    pub fn build(&self) -> Box<dyn FrameSource> {
        match self.kind {
            SourceKind::Image => Box::new(
                ImageSource::new(&self.path).with_logger(log::tracing_logger("source")),
            ),
            SourceKind::Pattern => {
                let format = if self.gray {
                    PixelFormat::Gray8
                } else {
                    PixelFormat::Rgb8
                };
                let mut pattern = TestPatternSource::new(self.width, self.height)
                    .with_format(format)
                    .with_frame_rate(self.frame_rate);
                if self.frames > 0 {
                    pattern = pattern.with_limit(self.frames);
                }
                Box::new(pattern)
            }
        }
    }
}

impl FilterConfig {
    /// Construct the shared filter this entry describes.
    pub fn build(&self) -> Result<SharedFilter, FramecastError> {
        let (filter, enabled) = match self {
            FilterConfig::Grayscale { enabled } => (Filter::new(GrayscaleFilter::new()), *enabled),
            FilterConfig::Resize {
                width,
                height,
                scale,
                enabled,
            } => {
                let resize = match (scale, width, height) {
                    (Some(scale), _, _) => ResizeFilter::with_scale(*scale)?,
                    (None, Some(w), Some(h)) => ResizeFilter::new(*w, *h)?,
                    _ => {
                        return Err(ParameterError::InvalidType {
                            name: "resize".into(),
                            expected: "both width and height, or scale",
                        }
                        .into());
                    }
                };
                (Filter::new(resize), *enabled)
            }
            FilterConfig::Lut {
                lut_type,
                param,
                custom_lut,
                enabled,
            } => {
                let lut = match custom_lut {
                    Some(table) => LutFilter::custom(to_table(table)?),
                    None => {
                        let kind: LutKind = lut_type.parse()?;
                        if kind == LutKind::Custom {
                            return Err(ParameterError::InvalidTable(
                                "lut_type = \"custom\" needs custom_lut".into(),
                            )
                            .into());
                        }
                        LutFilter::with_param(kind, *param)
                    }
                };
                (Filter::new(lut), *enabled)
            }
        };

        filter.set_enabled(enabled);
        Ok(filter.with_logger(log::tracing_logger("filter")).shared())
    }
}

fn to_table(entries: &[u8]) -> Result<Lut, ParameterError> {
    <Lut>::try_from(entries).map_err(|_| {
        ParameterError::InvalidTable(format!(
            "expected {LUT_SIZE} entries, got {}",
            entries.len()
        ))
    })
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let mut cfg = StreamConfig::default();
        cfg.filters.push(FilterConfig::Grayscale { enabled: true });
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("port = 9001"));
        assert!(text.contains("target_fps"));
        assert!(text.contains("[[filters]]"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = StreamConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: StreamConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 9001);
        assert_eq!(parsed.encoder.quality, 95);
        assert_eq!(parsed.source.kind, SourceKind::Pattern);
    }

    #[test]
    fn parses_filter_chain() {
        let text = r#"
            [source]
            kind = "image"
            path = "frame.png"

            [[filters]]
            kind = "grayscale"

            [[filters]]
            kind = "resize"
            width = 320
            height = 240

            [[filters]]
            kind = "lut"
            lut_type = "gamma"
            param = 2.2
            enabled = false
        "#;
        let cfg: StreamConfig = toml::from_str(text).unwrap();
        assert_eq!(cfg.source.kind, SourceKind::Image);
        assert_eq!(cfg.filters.len(), 3);
        assert_eq!(
            cfg.filters[1],
            FilterConfig::Resize {
                width: Some(320),
                height: Some(240),
                scale: None,
                enabled: true
            }
        );

        let built = cfg.build_filters().unwrap();
        let names: Vec<&str> = built.iter().map(|f| f.name()).collect();
        assert_eq!(names, ["grayscale", "resize", "lut"]);
        assert!(!built[2].is_enabled());
    }

    #[test]
    fn invalid_filters_are_rejected() {
        let half_resize = FilterConfig::Resize {
            width: Some(10),
            height: None,
            scale: None,
            enabled: true,
        };
        assert!(half_resize.build().is_err());

        let bad_type = FilterConfig::Lut {
            lut_type: "sepia".into(),
            param: 1.0,
            custom_lut: None,
            enabled: true,
        };
        assert!(bad_type.build().is_err());

        let short_table = FilterConfig::Lut {
            lut_type: "custom".into(),
            param: 1.0,
            custom_lut: Some(vec![0; 10]),
            enabled: true,
        };
        assert!(short_table.build().is_err());

        let zero_scale = FilterConfig::Resize {
            width: None,
            height: None,
            scale: Some(0.0),
            enabled: true,
        };
        assert!(zero_scale.build().is_err());
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = StreamConfig::load(&dir.path().join("absent.toml"));
        assert_eq!(missing.network.port, 9001);

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "network = [").unwrap();
        assert_eq!(StreamConfig::load(&broken).processing.target_fps, 30.0);

        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[network]\nport = 9100\n").unwrap();
        let cfg = StreamConfig::load(&good);
        assert_eq!(cfg.network.port, 9100);
        assert_eq!(cfg.network.client_queue, 8);
    }

    #[test]
    fn pattern_source_honours_size() {
        let cfg = SourceConfig {
            width: 64,
            height: 32,
            ..SourceConfig::default()
        };
        let source = cfg.build();
        assert_eq!((source.width(), source.height()), (64, 32));
    }
}
