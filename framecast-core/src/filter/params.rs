//! Typed extraction from the dynamically-typed parameter surface.

use serde_json::Value;

use crate::error::ParameterError;

pub(crate) fn as_bool(name: &str, value: &Value) -> Result<bool, ParameterError> {
    value.as_bool().ok_or_else(|| invalid_type(name, "a boolean"))
}

pub(crate) fn as_f64(name: &str, value: &Value) -> Result<f64, ParameterError> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid_type(name, "a finite number"))
}

pub(crate) fn as_str<'a>(name: &str, value: &'a Value) -> Result<&'a str, ParameterError> {
    value.as_str().ok_or_else(|| invalid_type(name, "a string"))
}

/// An integer `> 0` that fits in `u32`.
pub(crate) fn as_positive_u32(name: &str, value: &Value) -> Result<u32, ParameterError> {
    let v = value
        .as_i64()
        .ok_or_else(|| invalid_type(name, "an integer"))?;
    if v <= 0 || v > u32::MAX as i64 {
        return Err(out_of_range(name, v));
    }
    Ok(v as u32)
}

/// A number `> 0`.
pub(crate) fn as_positive_f64(name: &str, value: &Value) -> Result<f64, ParameterError> {
    let v = as_f64(name, value)?;
    if v <= 0.0 {
        return Err(out_of_range(name, v));
    }
    Ok(v)
}

pub(crate) fn invalid_type(name: &str, expected: &'static str) -> ParameterError {
    ParameterError::InvalidType {
        name: name.to_string(),
        expected,
    }
}

pub(crate) fn out_of_range(name: &str, value: impl ToString) -> ParameterError {
    ParameterError::OutOfRange {
        name: name.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn positive_integers() {
        assert_eq!(as_positive_u32("width", &json!(640)).unwrap(), 640);
        assert!(matches!(
            as_positive_u32("width", &json!(0)),
            Err(ParameterError::OutOfRange { .. })
        ));
        assert!(matches!(
            as_positive_u32("width", &json!(-3)),
            Err(ParameterError::OutOfRange { .. })
        ));
        assert!(matches!(
            as_positive_u32("width", &json!(1.5)),
            Err(ParameterError::InvalidType { .. })
        ));
    }

    #[test]
    fn numbers_and_strings() {
        assert_eq!(as_f64("param", &json!(2)).unwrap(), 2.0);
        assert!(as_f64("param", &json!("2")).is_err());
        assert_eq!(as_str("lut_type", &json!("gamma")).unwrap(), "gamma");
        assert!(as_positive_f64("scale", &json!(0.0)).is_err());
    }
}
