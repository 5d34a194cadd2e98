//! The unit of work that flows from the ingress API to the dispatcher.

use crate::level::Level;
use crate::value::Value;
use ahash::AHashMap;
use smallvec::SmallVec;
use std::time::Instant;

/// Inline capacity for lazy-format arguments before falling back to the
/// heap — most call sites pass a handful of fields, so this avoids an
/// allocation on the hot path (the "small-string/inline-field
/// optimization" named in the data model's design note).
pub type ArgVec = SmallVec<[Value; 4]>;

/// Exactly one of these populates a [`LogRecord`] (data model invariant).
#[derive(Debug, Clone)]
pub enum Payload {
    /// A format string plus positional arguments. `sprintf`-style
    /// expansion is deferred until the dispatcher actually needs bytes —
    /// if the record is filtered or sampled out downstream first, the
    /// format is never evaluated.
    Lazy { format: String, args: ArgVec },
    /// Pre-formatted bytes, passed straight through to the destination
    /// with no further formatting (no trailing newline is appended).
    Raw(Vec<u8>),
    /// A fully structured entry, the formatter's native input.
    Structured(Box<StructuredEntry>),
}

/// The formatter's input in structured mode.
#[derive(Debug, Clone)]
pub struct StructuredEntry {
    pub timestamp_str: String,
    pub level_str: &'static str,
    pub message: String,
    pub fields: AHashMap<String, Value>,
    pub metadata: AHashMap<String, Value>,
    /// Populated when Error-level capture is enabled (§4.5).
    pub stack_trace: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl StructuredEntry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        StructuredEntry {
            timestamp_str: chrono::Utc::now().to_rfc3339(),
            level_str: level.as_str(),
            message: message.into(),
            fields: AHashMap::new(),
            metadata: AHashMap::new(),
            stack_trace: None,
            file: None,
            line: None,
        }
    }
}

/// One unit of user input flowing through the pipeline: created on the
/// producer thread, consumed exactly once by the dispatcher, released
/// after every enabled destination has processed it.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    /// Captured at ingress. Ordering uses enqueue order, never timestamp
    /// comparison (spec §9) — this is retained for latency metrics only.
    pub captured_at: Instant,
    pub wall_time: chrono::DateTime<chrono::Utc>,
    pub payload: Payload,
    pub fields: Option<AHashMap<String, Value>>,
}

impl LogRecord {
    pub fn lazy(level: Level, format: impl Into<String>, args: ArgVec) -> Self {
        LogRecord {
            level,
            captured_at: Instant::now(),
            wall_time: chrono::Utc::now(),
            payload: Payload::Lazy { format: format.into(), args },
            fields: None,
        }
    }

    pub fn structured(level: Level, entry: StructuredEntry) -> Self {
        LogRecord {
            level,
            captured_at: Instant::now(),
            wall_time: chrono::Utc::now(),
            payload: Payload::Structured(Box::new(entry)),
            fields: None,
        }
    }

    pub fn raw(level: Level, bytes: Vec<u8>) -> Self {
        LogRecord {
            level,
            captured_at: Instant::now(),
            wall_time: chrono::Utc::now(),
            payload: Payload::Raw(bytes),
            fields: None,
        }
    }

    pub fn with_fields(mut self, fields: AHashMap<String, Value>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Resolve the lazy `(format, args)` payload into the final message
    /// text. Positional placeholders are `{}`, matching the template
    /// syntax the rest of the crate already uses for k=v rendering.
    pub fn resolved_message(&self) -> String {
        match &self.payload {
            Payload::Lazy { format, args } => expand_format(format, args),
            Payload::Structured(entry) => entry.message.clone(),
            Payload::Raw(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Expand `{}`-style positional placeholders in `format` against `args`,
/// in order. Extra placeholders beyond the argument count are left
/// unexpanded; extra arguments are ignored.
fn expand_format(format: &str, args: &ArgVec) -> String {
    let mut out = String::with_capacity(format.len() + args.len() * 8);
    let mut chars = format.chars().peekable();
    let mut arg_iter = args.iter();
    while let Some(c) = chars.next() {
        if c == '{' && chars.peek() == Some(&'}') {
            chars.next();
            match arg_iter.next() {
                Some(v) => out.push_str(&v.render_text()),
                None => out.push_str("{}"),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_format_expands_positional_args() {
        let mut args = ArgVec::new();
        args.push(Value::from("alice"));
        args.push(Value::Int64(3));
        let record = LogRecord::lazy(Level::Info, "user {} logged in {} times", args);
        assert_eq!(record.resolved_message(), "user alice logged in 3 times");
    }

    #[test]
    fn raw_payload_is_passthrough() {
        let record = LogRecord::raw(Level::Warn, b"already-formatted".to_vec());
        assert_eq!(record.resolved_message(), "already-formatted");
    }

    #[test]
    fn structured_entry_carries_message_through() {
        let entry = StructuredEntry::new(Level::Error, "boom");
        let record = LogRecord::structured(Level::Error, entry);
        assert_eq!(record.resolved_message(), "boom");
    }
}
