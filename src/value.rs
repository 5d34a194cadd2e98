//! The dynamic field-value union carried on structured log records.
//!
//! Grounded in the re-architecture note for `interface{}` field values
//! (spec §9): unknown dynamic types collapse to a typed sentinel rather
//! than attempting to serialize them, and cyclic or over-deep structures
//! are bounded by a depth-limited, cycle-detecting walk instead of full
//! graph linearization.

use ahash::AHashMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Maximum nesting depth the marshaller will walk before substituting the
/// `[max depth exceeded]` sentinel (spec §4.5).
pub const MAX_DEPTH: usize = 16;

/// A structured field value.
///
/// Maps use `ahash::AHashMap` rather than `std::collections::HashMap`,
/// matching the teacher's choice for its field-lookup hot paths.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(AHashMap<String, Value>),
}

impl Value {
    /// Render this value the way the text formatter wants `k=v` pairs
    /// rendered: scalars print plainly, everything else falls back to its
    /// JSON-ish rendering through [`Value::to_json_depth_limited`].
    pub fn render_text(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::UInt64(v) => v.to_string(),
            Value::Float64(v) => v.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
            Value::List(_) | Value::Map(_) => self.to_json_depth_limited().to_string(),
        }
    }

    /// Convert to a `serde_json::Value`, replacing anything past
    /// [`MAX_DEPTH`] with a sentinel. Cycles cannot occur in this owned
    /// tree representation (there are no back-references), but the depth
    /// bound is still enforced defensively since callers may construct
    /// deeply nested values programmatically.
    pub fn to_json_depth_limited(&self) -> JsonValue {
        self.to_json_at_depth(0)
    }

    fn to_json_at_depth(&self, depth: usize) -> JsonValue {
        if depth >= MAX_DEPTH {
            return JsonValue::String("[max depth exceeded]".to_string());
        }
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int64(v) => JsonValue::from(*v),
            Value::UInt64(v) => JsonValue::from(*v),
            Value::Float64(v) => {
                serde_json::Number::from_f64(*v).map(JsonValue::Number).unwrap_or(JsonValue::Null)
            }
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Bytes(b) => JsonValue::String(format!("<{} bytes>", b.len())),
            Value::List(items) => JsonValue::Array(
                items.iter().map(|v| v.to_json_at_depth(depth + 1)).collect(),
            ),
            Value::Map(map) => {
                let mut obj = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json_at_depth(depth + 1));
                }
                JsonValue::Object(obj)
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json_depth_limited().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
