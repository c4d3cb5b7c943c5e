//! Loose JSON coercions shared by predicates, the resolver and the dispatcher.
//!
//! Stored records are authored by hand in a UI and arrive with whatever
//! types the form produced: numbers as strings, booleans as `"true"`.
//! These helpers never fail; a value that cannot be coerced is `None`.

use serde_json::Value;

/// Coerce a JSON value to a finite number.
///
/// Numbers pass through, strings are trimmed and parsed. Empty strings,
/// booleans, null, arrays, objects and non-finite results are `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Coerce a JSON value to an integral id (`3`, `3.0` and `"3"` are all `3`).
pub fn coerce_id(value: &Value) -> Option<i64> {
    let n = coerce_number(value)?;
    if n.fract() != 0.0 || n < i64::MIN as f64 || n > i64::MAX as f64 {
        return None;
    }
    Some(n as i64)
}

/// Convert a number back to JSON, keeping whole numbers integral so that
/// `25.0` renders as `25` in templates and outbound payloads.
pub fn number_to_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// Strict boolean flag: `true` or the string `"true"`.
pub fn is_true_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

/// Loose boolean coercion used when normalizing adapter payloads.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Render a scalar as a string. Arrays and objects are `None`.
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Script-style truthiness: null, `false`, `0`, NaN and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
