///
/// Conversions between engine values and host values.
///
/// Row cells reach host code as raw text (or null), the way the engine
/// renders them; function arguments keep their storage class. Values
/// returned by host functions go back as text, integer or real, and any
/// other kind becomes SQL NULL.
///

use rusqlite::types::{Value as SqlValue, ValueRef};
use sqlbridge_core::Value;

/// Cell value as the engine's text rendering.
pub(crate) fn raw_text(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Text(i.to_string()),
        ValueRef::Real(f) => Value::Text(format_real(f)),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

/// Argument value with its storage class preserved.
pub(crate) fn typed(arg: ValueRef<'_>) -> Value {
    match arg {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

/// Result slot for a host function's return value.
pub(crate) fn to_engine(value: Value) -> SqlValue {
    match value {
        Value::Text(s) => SqlValue::Text(s),
        Value::Integer(i) => SqlValue::Integer(i),
        Value::Float(f) => SqlValue::Real(f),
        _ => SqlValue::Null,
    }
}

// Integral reals keep a trailing ".0" like the engine's own rendering.
fn format_real(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}
