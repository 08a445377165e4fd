//! 256-entry lookup-table remap.
//!
//! The table is regenerated eagerly whenever the generator kind or its
//! numeric parameter changes, so `apply` only ever indexes.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::ParameterError;
use crate::filter::params;
use crate::frame::Frame;

/// Number of entries in a lookup table.
pub const LUT_SIZE: usize = 256;

/// A complete lookup table.
pub type Lut = [u8; LUT_SIZE];

// ── LutKind ──────────────────────────────────────────────────────

/// Table generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LutKind {
    Identity,
    Invert,
    /// `factor * (v - 128) + 128`
    Contrast,
    /// `v + offset`
    Brightness,
    /// `(v / 255)^gamma * 255`
    Gamma,
    /// `c * ln(v + 1)` with `c = 255 / ln(256)`
    Logarithmic,
    /// `255 * (e^(v/255) - 1) / (e - 1)`
    Exponential,
    /// `v >= threshold` maps to 255, everything else is unchanged.
    ThresholdBinary,
    /// Caller-supplied table.
    Custom,
}

impl LutKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            LutKind::Identity => "identity",
            LutKind::Invert => "invert",
            LutKind::Contrast => "contrast",
            LutKind::Brightness => "brightness",
            LutKind::Gamma => "gamma",
            LutKind::Logarithmic => "logarithmic",
            LutKind::Exponential => "exponential",
            LutKind::ThresholdBinary => "threshold_binary",
            LutKind::Custom => "custom",
        }
    }
}

impl fmt::Display for LutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LutKind {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(LutKind::Identity),
            "invert" => Ok(LutKind::Invert),
            "contrast" => Ok(LutKind::Contrast),
            "brightness" => Ok(LutKind::Brightness),
            "gamma" => Ok(LutKind::Gamma),
            "logarithmic" => Ok(LutKind::Logarithmic),
            "exponential" => Ok(LutKind::Exponential),
            "threshold_binary" | "threshold" => Ok(LutKind::ThresholdBinary),
            "custom" => Ok(LutKind::Custom),
            other => Err(params::out_of_range("lut_type", other)),
        }
    }
}

// ── Generators ───────────────────────────────────────────────────

/// Build the table for `kind` with parameter `param`.
///
/// `Custom` has no generator and yields the identity table.
pub fn generate(kind: LutKind, param: f64) -> Lut {
    let mut lut = [0u8; LUT_SIZE];
    for (i, entry) in lut.iter_mut().enumerate() {
        let v = i as f64;
        *entry = match kind {
            LutKind::Identity | LutKind::Custom => i as u8,
            LutKind::Invert => 255 - i as u8,
            LutKind::Contrast => saturate_trunc(param * (v - 128.0) + 128.0),
            LutKind::Brightness => saturate_trunc(v + param),
            LutKind::Gamma => saturate_round((v / 255.0).powf(param) * 255.0),
            LutKind::Logarithmic => {
                let c = 255.0 / 256f64.ln();
                saturate_round(c * (v + 1.0).ln())
            }
            LutKind::Exponential => {
                let e = std::f64::consts::E;
                saturate_round(255.0 * ((v / 255.0).exp() - 1.0) / (e - 1.0))
            }
            LutKind::ThresholdBinary => {
                if v >= param {
                    255
                } else {
                    i as u8
                }
            }
        };
    }
    lut
}

fn saturate_trunc(v: f64) -> u8 {
    saturate_round(v.trunc())
}

fn saturate_round(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

// ── LutFilter ────────────────────────────────────────────────────

/// Channel-agnostic remap through a 256-entry table.
#[derive(Debug, Clone)]
pub struct LutFilter {
    kind: LutKind,
    param: f64,
    table: Lut,
}

impl Default for LutFilter {
    fn default() -> Self {
        Self::new(LutKind::Identity)
    }
}

impl LutFilter {
    pub const NAME: &'static str = "lut";

    /// Generator `kind` with the default parameter `1.0`.
    pub fn new(kind: LutKind) -> Self {
        Self::with_param(kind, 1.0)
    }

    pub fn with_param(kind: LutKind, param: f64) -> Self {
        Self {
            kind,
            param,
            table: generate(kind, param),
        }
    }

    /// Use a caller-supplied table.
    pub fn custom(table: Lut) -> Self {
        Self {
            kind: LutKind::Custom,
            param: 1.0,
            table,
        }
    }

    pub fn kind(&self) -> LutKind {
        self.kind
    }

    pub fn param(&self) -> f64 {
        self.param
    }

    pub fn table(&self) -> &Lut {
        &self.table
    }

    pub fn apply(&self, input: &Frame) -> Frame {
        let mut out = input.clone();
        for s in out.samples_mut() {
            *s = self.table[*s as usize];
        }
        out
    }

    pub fn set_parameter(&mut self, name: &str, value: &Value) -> Result<(), ParameterError> {
        match name {
            "lut_type" => {
                let kind: LutKind = params::as_str(name, value)?.parse()?;
                if kind == LutKind::Custom {
                    return Err(ParameterError::InvalidTable(
                        "set 'custom_lut' to supply a custom table".into(),
                    ));
                }
                self.kind = kind;
                self.regenerate();
            }
            "param" => {
                self.param = params::as_f64(name, value)?;
                self.regenerate();
            }
            "custom_lut" => {
                self.table = parse_table(value)?;
                self.kind = LutKind::Custom;
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
        map.insert("lut_type".into(), Value::from(self.kind.as_str()));
        map.insert("param".into(), Value::from(self.param));
        if self.kind == LutKind::Custom {
            map.insert(
                "custom_lut".into(),
                Value::from(self.table.iter().map(|&v| v as u64).collect::<Vec<_>>()),
            );
        }
        map
    }

    fn regenerate(&mut self) {
        if self.kind != LutKind::Custom {
            self.table = generate(self.kind, self.param);
        }
    }
}

/// Validate a JSON array of exactly 256 integers in `0..=255`.
fn parse_table(value: &Value) -> Result<Lut, ParameterError> {
    let entries = value
        .as_array()
        .ok_or_else(|| ParameterError::InvalidTable("expected an array".into()))?;
    if entries.len() != LUT_SIZE {
        return Err(ParameterError::InvalidTable(format!(
            "expected {LUT_SIZE} entries, got {}",
            entries.len()
        )));
    }

    let mut table = [0u8; LUT_SIZE];
    for (i, (slot, entry)) in table.iter_mut().zip(entries).enumerate() {
        *slot = entry
            .as_u64()
            .filter(|v| *v <= 255)
            .ok_or_else(|| {
                ParameterError::InvalidTable(format!("entry {i} is not an integer in 0..=255"))
            })? as u8;
    }
    Ok(table)
}
