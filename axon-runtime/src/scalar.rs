//! Scalar (de)serialization rules
//!
//! The fixed set of named coercions the generator's scalar table refers
//! to. Each rule takes the raw JSON value a GraphQL argument arrives as and
//! produces the host-typed value, range-checked for numeric kinds. Bytes
//! travel as standard-alphabet base64 strings.

use base64::Engine;
use serde_json::Value;

/// Sentinel scalar for responses with no meaningful fields; GraphQL
/// disallows empty object types, so those collapse to this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoData;

/// A failed coercion.
#[derive(Debug, thiserror::Error)]
pub enum ScalarError {
    /// The value's JSON type does not match the rule.
    #[error("expected {expected}, found {found}")]
    Type {
        /// What the rule accepts.
        expected: &'static str,
        /// JSON type actually present.
        found: &'static str,
    },

    /// A numeric value outside the target type's range.
    #[error("value {value} out of range for {target}")]
    Range {
        /// The offending value, rendered.
        value: String,
        /// Target type name.
        target: &'static str,
    },

    /// A bytes value that is not valid base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Boolean coercion.
pub fn to_bool(value: &Value) -> Result<bool, ScalarError> {
    value.as_bool().ok_or(ScalarError::Type {
        expected: "boolean",
        found: type_name(value),
    })
}

/// 32-bit signed integer coercion, range-checked.
pub fn to_i32(value: &Value) -> Result<i32, ScalarError> {
    let wide = to_i64(value)?;
    i32::try_from(wide).map_err(|_| ScalarError::Range {
        value: wide.to_string(),
        target: "i32",
    })
}

/// 64-bit signed integer coercion.
pub fn to_i64(value: &Value) -> Result<i64, ScalarError> {
    value.as_i64().ok_or(ScalarError::Type {
        expected: "integer",
        found: type_name(value),
    })
}

/// 32-bit unsigned integer coercion, range-checked.
pub fn to_u32(value: &Value) -> Result<u32, ScalarError> {
    let wide = to_u64(value)?;
    u32::try_from(wide).map_err(|_| ScalarError::Range {
        value: wide.to_string(),
        target: "u32",
    })
}

/// 64-bit unsigned integer coercion.
pub fn to_u64(value: &Value) -> Result<u64, ScalarError> {
    value.as_u64().ok_or(ScalarError::Type {
        expected: "unsigned integer",
        found: type_name(value),
    })
}

/// 32-bit float coercion; JSON numbers narrow lossily.
pub fn to_f32(value: &Value) -> Result<f32, ScalarError> {
    to_f64(value).map(|wide| wide as f32)
}

/// 64-bit float coercion.
pub fn to_f64(value: &Value) -> Result<f64, ScalarError> {
    value.as_f64().ok_or(ScalarError::Type {
        expected: "number",
        found: type_name(value),
    })
}

/// String coercion.
pub fn to_string(value: &Value) -> Result<String, ScalarError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(ScalarError::Type {
            expected: "string",
            found: type_name(value),
        })
}

/// Bytes coercion from a base64 string.
pub fn to_bytes(value: &Value) -> Result<Vec<u8>, ScalarError> {
    let text = value.as_str().ok_or(ScalarError::Type {
        expected: "base64 string",
        found: type_name(value),
    })?;
    Ok(base64::engine::general_purpose::STANDARD.decode(text)?)
}
