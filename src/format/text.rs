//! Text formatter: `[timestamp] [LEVEL] message [k=v …] [stack_trace=…]`.
//!
//! Grounded in the teacher's `format/template.rs` placeholder-expansion
//! approach, but specialized to the fixed layout spec §4.5 names rather
//! than a free-form template string (the free-form template stays
//! available as [`TextFormatter::with_template`] for callers who want it).

use super::{passthrough_if_raw, Formatter};
use crate::error::LogForgeError;
use crate::level::Level;
use crate::record::{LogRecord, Payload};
use crate::value::Value;
use ahash::AHashMap;

/// Casing applied to the level token in text output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelStyle {
    Upper,
    Lower,
    Symbol,
}

impl LevelStyle {
    fn render(self, level: Level) -> String {
        match self {
            LevelStyle::Upper => level.as_str().to_string(),
            LevelStyle::Lower => level.as_str().to_ascii_lowercase(),
            LevelStyle::Symbol => level.symbol().to_string(),
        }
    }
}

pub struct TextFormatter {
    /// `chrono::format` strftime pattern for the timestamp.
    pub timestamp_format: String,
    pub level_style: LevelStyle,
    /// Custom `{time}/{level}/{message}/{extra}` template; when set,
    /// overrides the fixed layout entirely.
    pub template: Option<String>,
}

impl Default for TextFormatter {
    fn default() -> Self {
        TextFormatter {
            timestamp_format: "%Y-%m-%dT%H:%M:%S%.3fZ".to_string(),
            level_style: LevelStyle::Upper,
            template: None,
        }
    }
}

impl TextFormatter {
    pub fn with_template(template: impl Into<String>) -> Self {
        TextFormatter { template: Some(template.into()), ..Default::default() }
    }

    fn field_suffix(&self, fields: &AHashMap<String, Value>, stack_trace: Option<&str>) -> String {
        if fields.is_empty() && stack_trace.is_none() {
            return String::new();
        }
        let mut out = String::new();
        let mut keys: Vec<&String> = fields.keys().collect();
        keys.sort();
        for key in keys {
            out.push(' ');
            out.push_str(key);
            out.push('=');
            out.push_str(&fields[key].render_text());
        }
        if let Some(trace) = stack_trace {
            out.push_str(" stack_trace=");
            out.push_str(trace);
        }
        out
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, LogForgeError> {
        if let Some(bytes) = passthrough_if_raw(record) {
            return Ok(bytes);
        }

        let timestamp = record.wall_time.format(&self.timestamp_format).to_string();
        let level_token = self.level_style.render(record.level);
        let message = record.resolved_message();

        let empty = AHashMap::new();
        let (fields, stack_trace) = match &record.payload {
            Payload::Structured(entry) => (&entry.fields, entry.stack_trace.as_deref()),
            _ => (record.fields.as_ref().unwrap_or(&empty), None),
        };

        let line = if let Some(template) = &self.template {
            render_template(template, &timestamp, &level_token, &message, fields)
        } else {
            let suffix = self.field_suffix(fields, stack_trace);
            format!("[{timestamp}] [{level_token}] {message}{suffix}")
        };

        let mut out = line.into_bytes();
        out.push(b'\n');
        Ok(out)
    }
}

fn render_template(
    template: &str,
    timestamp: &str,
    level: &str,
    message: &str,
    fields: &AHashMap<String, Value>,
) -> String {
    let mut out = template
        .replace("{time}", timestamp)
        .replace("{level}", level)
        .replace("{message}", message);
    if out.contains("{extra}") {
        let mut keys: Vec<&String> = fields.keys().collect();
        keys.sort();
        let extra = keys
            .iter()
            .map(|k| format!("{}={}", k, fields[*k].render_text()))
            .collect::<Vec<_>>()
            .join(" ");
        out = out.replace("{extra}", &extra);
    }
    out
}
