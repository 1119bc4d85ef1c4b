//! Decimal-string encoding for response bodies.
//!
//! Every JSON number leaving the service is rendered as the exact decimal
//! text of that number, inside a string. `1723331552` becomes
//! `"1723331552"`, so clients that parse numbers as binary floats never see
//! a rounded timestamp or an id derived from one.
//!
//! `serde_json` is built with `arbitrary_precision`, so a number keeps the
//! text it arrived with, including integers wider than 64 bits and decimal
//! fractions such as `19.99`.
//!
//! Inbound values go the other way through [`parse_epoch_seconds`], which
//! accepts both forms so a note read from the service can be sent straight
//! back in an update.

use serde::Serialize;
use serde_json::Value;

use crate::types::Item;

/// Replaces every number in `value` (recursively) with its decimal string.
#[must_use]
pub fn encode(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        Value::Array(values) => Value::Array(values.into_iter().map(encode).collect()),
        Value::Object(map) => Value::Object(encode_item(map)),
        other => other,
    }
}

/// [`encode`] applied to each attribute of an item.
#[must_use]
pub fn encode_item(item: Item) -> Item {
    item.into_iter().map(|(k, v)| (k, encode(v))).collect()
}

/// Serializes `value` to a JSON string with all numbers decimal-encoded.
pub fn to_body<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(&encode(serde_json::to_value(value)?))
}

/// Reads whole seconds since epoch from a number or a decimal string.
///
/// Integral floats such as `1723331552.0` are accepted; fractional values
/// are not.
#[must_use]
pub fn parse_epoch_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
