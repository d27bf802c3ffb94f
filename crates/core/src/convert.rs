//! Coercion of raw values into an attribute's declared type.
//!
//! Raw values arrive from application code and from repository records, so
//! they are frequently textual. `coerce` maps them onto the canonical stored
//! representation of a `DataType`, returning `None` when no natural mapping
//! exists. Callers wrap the failure into a conversion error carrying the
//! attribute name.

use crate::types::DataType;
use crate::value::Value;
use alloc::string::{String, ToString};

/// Coerces `raw` into the canonical representation of `data_type`.
///
/// `Null` is accepted by every type.
pub fn coerce(data_type: DataType, raw: Value) -> Option<Value> {
    if raw.is_null() {
        return Some(Value::Null);
    }

    match data_type {
        DataType::Integer => to_integer(raw),
        DataType::Boolean => to_boolean(raw),
        DataType::String => to_string(raw),
        DataType::Symbol => match raw {
            Value::Symbol(s) | Value::String(s) => Some(Value::Symbol(s)),
            _ => None,
        },
        DataType::DateTime => to_datetime(raw),
        DataType::Object => match raw {
            Value::Object(o) => Some(Value::Object(o)),
            _ => None,
        },
    }
}

fn to_integer(raw: Value) -> Option<Value> {
    match raw {
        Value::Integer(v) => Some(Value::Integer(v)),
        Value::Boolean(b) => Some(Value::Integer(b as i64)),
        Value::DateTime(secs) => Some(Value::Integer(secs)),
        Value::String(s) | Value::Symbol(s) => s.trim().parse::<i64>().ok().map(Value::Integer),
        _ => None,
    }
}

fn to_boolean(raw: Value) -> Option<Value> {
    match raw {
        Value::Boolean(b) => Some(Value::Boolean(b)),
        Value::Integer(0) => Some(Value::Boolean(false)),
        Value::Integer(1) => Some(Value::Boolean(true)),
        Value::String(s) | Value::Symbol(s) => match s.as_str() {
            "true" => Some(Value::Boolean(true)),
            "false" => Some(Value::Boolean(false)),
            _ => None,
        },
        _ => None,
    }
}

fn to_string(raw: Value) -> Option<Value> {
    let text: String = match raw {
        Value::String(s) | Value::Symbol(s) => s,
        Value::Integer(v) => v.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::DateTime(secs) => chrono::DateTime::from_timestamp(secs, 0)?.to_rfc3339(),
        _ => return None,
    };
    Some(Value::String(text))
}

fn to_datetime(raw: Value) -> Option<Value> {
    match raw {
        Value::DateTime(secs) | Value::Integer(secs) => Some(Value::DateTime(secs)),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| Value::DateTime(dt.timestamp())),
        _ => None,
    }
}
