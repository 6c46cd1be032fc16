/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Built-in value transformers.
//!
//! Transformers are pure functions on values, never raise, and are
//! referenced on a `FieldDefinition` by name rather than stored as an
//! opaque closure: custom transformers are not supported in a persisted
//! schema document, only the seven built-ins below.

use serde_json::Value as JsonValue;

pub type TransformerFn = fn(JsonValue) -> Option<JsonValue>;

/// A name -> pure-function map seeded with the built-in transformers:
/// `int`, `float`, `str`, `bool`, `datetime`, `date`, `json`.
pub struct TransformerRegistry {
    builtins: std::collections::HashMap<&'static str, TransformerFn>,
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        let mut builtins: std::collections::HashMap<&'static str, TransformerFn> =
            std::collections::HashMap::new();
        builtins.insert("int", to_int);
        builtins.insert("float", to_float);
        builtins.insert("str", to_str);
        builtins.insert("bool", to_bool);
        builtins.insert("datetime", to_datetime);
        builtins.insert("date", to_date);
        builtins.insert("json", to_json);
        Self { builtins }
    }
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the named transformer. On any failure (unknown name or a
    /// value the transformer can't convert), returns `None` so the caller
    /// keeps the raw value, per the "never raise" contract.
    pub fn apply(&self, name: &str, value: JsonValue) -> Option<JsonValue> {
        self.builtins.get(name)?(value)
    }
}

fn to_int(value: JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => Some(JsonValue::Number(n)),
        JsonValue::Number(n) => n.as_f64().map(|f| (f as i64).into()),
        JsonValue::String(s) => s.trim().parse::<i64>().ok().map(Into::into),
        JsonValue::Bool(b) => Some((b as i64).into()),
        _ => None,
    }
}

fn to_float(value: JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::Number(n) => n.as_f64().and_then(serde_json::Number::from_f64).map(JsonValue::Number),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number),
        _ => None,
    }
}

fn to_str(value: JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::String(s) => Some(JsonValue::String(s)),
        JsonValue::Null => None,
        other => Some(JsonValue::String(other.to_string())),
    }
}

fn to_bool(value: JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::Bool(b) => Some(JsonValue::Bool(b)),
        JsonValue::Number(n) => n.as_i64().map(|i| JsonValue::Bool(i != 0)),
        JsonValue::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(JsonValue::Bool(true)),
            "false" | "0" | "no" => Some(JsonValue::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn to_datetime(value: JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::String(s) if looks_like_iso8601(&s) => Some(JsonValue::String(s)),
        _ => None,
    }
}

fn to_date(value: JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::String(s) if s.len() == 10 && s.as_bytes().get(4) == Some(&b'-') => {
            Some(JsonValue::String(s))
        }
        _ => None,
    }
}

fn to_json(value: JsonValue) -> Option<JsonValue> {
    Some(value)
}

/// Minimal ISO-8601 shape check, shared with `introspect.rs`'s type
/// inference.
pub fn looks_like_iso8601(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 10
        && bytes[0..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
        && (bytes.len() == 10 || bytes[10] == b'T' || bytes[10] == b' ')
}
