//! JSON formatter: one compact object per line, per spec §4.5.
//!
//! Two field layouts, selected by [`JsonFormatter::flatten_fields`]:
//! flattened (fields merge directly into the top-level object, keys
//! colliding with reserved names like `timestamp` are dropped) or nested
//! under a `fields` key. Grounded in the teacher's `format/json.rs`
//! `JsonRecord` struct.

use super::{passthrough_if_raw, Formatter};
use crate::error::LogForgeError;
use crate::record::{LogRecord, Payload};
use crate::value::Value;
use serde_json::{Map, Value as JsonValue};

const RESERVED_KEYS: &[&str] = &["timestamp", "level", "message", "fields", "metadata", "stack_trace"];

pub struct JsonFormatter {
    /// Merge fields into the top-level object instead of nesting them
    /// under `"fields"`.
    pub flatten_fields: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        JsonFormatter { flatten_fields: false }
    }
}

impl JsonFormatter {
    pub fn flattened() -> Self {
        JsonFormatter { flatten_fields: true }
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, LogForgeError> {
        if let Some(bytes) = passthrough_if_raw(record) {
            return Ok(bytes);
        }

        let mut obj = Map::new();
        let message = record.resolved_message();

        match &record.payload {
            Payload::Structured(entry) => {
                obj.insert("timestamp".to_string(), JsonValue::String(entry.timestamp_str.clone()));
                obj.insert("level".to_string(), JsonValue::String(entry.level_str.to_string()));
                obj.insert("message".to_string(), JsonValue::String(message));
                insert_fields(&mut obj, &entry.fields, self.flatten_fields);
                if !entry.metadata.is_empty() {
                    obj.insert(
                        "metadata".to_string(),
                        value_map_to_json(&entry.metadata),
                    );
                }
                if let Some(trace) = &entry.stack_trace {
                    obj.insert("stack_trace".to_string(), JsonValue::String(trace.clone()));
                }
                if let Some(file) = &entry.file {
                    obj.insert("file".to_string(), JsonValue::String(file.clone()));
                }
                if let Some(line) = entry.line {
                    obj.insert("line".to_string(), JsonValue::from(line));
                }
            }
            _ => {
                obj.insert(
                    "timestamp".to_string(),
                    JsonValue::String(record.wall_time.to_rfc3339()),
                );
                obj.insert("level".to_string(), JsonValue::String(record.level.as_str().to_string()));
                obj.insert("message".to_string(), JsonValue::String(message));
                if let Some(fields) = &record.fields {
                    insert_fields(&mut obj, fields, self.flatten_fields);
                }
            }
        }

        let mut out = serde_json::to_vec(&JsonValue::Object(obj))
            .map_err(|e| LogForgeError::FormatError(e.to_string()))?;
        out.push(b'\n');
        Ok(out)
    }
}

fn insert_fields(obj: &mut Map<String, JsonValue>, fields: &ahash::AHashMap<String, Value>, flatten: bool) {
    if fields.is_empty() {
        return;
    }
    if flatten {
        for (k, v) in fields {
            if RESERVED_KEYS.contains(&k.as_str()) {
                continue;
            }
            obj.insert(k.clone(), v.to_json_depth_limited());
        }
    } else {
        obj.insert("fields".to_string(), value_map_to_json(fields));
    }
}

fn value_map_to_json(map: &ahash::AHashMap<String, Value>) -> JsonValue {
    let mut out = Map::with_capacity(map.len());
    for (k, v) in map {
        out.insert(k.clone(), v.to_json_depth_limited());
    }
    JsonValue::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use crate::record::StructuredEntry;

    #[test]
    fn nested_mode_puts_fields_under_key() {
        let formatter = JsonFormatter::default();
        let mut entry = StructuredEntry::new(Level::Info, "hello");
        entry.fields.insert("user".to_string(), Value::from("alice"));
        let record = LogRecord::structured(Level::Info, entry);

        let bytes = formatter.format(&record).unwrap();
        let parsed: JsonValue = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["message"], "hello");
        assert_eq!(parsed["fields"]["user"], "alice");
        assert!(parsed.get("user").is_none());
    }

    #[test]
    fn flattened_mode_merges_fields_at_top_level() {
        let formatter = JsonFormatter::flattened();
        let mut entry = StructuredEntry::new(Level::Info, "hello");
        entry.fields.insert("user".to_string(), Value::from("alice"));
        let record = LogRecord::structured(Level::Info, entry);

        let bytes = formatter.format(&record).unwrap();
        let parsed: JsonValue = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["user"], "alice");
        assert!(parsed.get("fields").is_none());
    }

    #[test]
    fn flattened_mode_drops_reserved_key_collisions() {
        let formatter = JsonFormatter::flattened();
        let mut entry = StructuredEntry::new(Level::Info, "hello");
        entry.fields.insert("timestamp".to_string(), Value::from("spoofed"));
        let record = LogRecord::structured(Level::Info, entry);

        let bytes = formatter.format(&record).unwrap();
        let parsed: JsonValue = serde_json::from_slice(&bytes).unwrap();
        assert_ne!(parsed["timestamp"], "spoofed");
    }

    #[test]
    fn raw_bytes_pass_through_unmodified() {
        let formatter = JsonFormatter::default();
        let record = LogRecord::raw(Level::Error, b"{\"already\":\"json\"}".to_vec());
        let bytes = formatter.format(&record).unwrap();
        assert_eq!(bytes, b"{\"already\":\"json\"}");
    }

    #[test]
    fn ends_with_newline_when_not_raw() {
        let formatter = JsonFormatter::default();
        let entry = StructuredEntry::new(Level::Info, "hi");
        let record = LogRecord::structured(Level::Info, entry);
        let bytes = formatter.format(&record).unwrap();
        assert_eq!(*bytes.last().unwrap(), b'\n');
    }
}
