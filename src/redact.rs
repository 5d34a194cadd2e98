//! Sensitive-data redaction (component C3).
//!
//! Two surfaces, per spec §4.4: pattern redaction on the final formatted
//! byte stream, and field redaction on structured field maps before
//! formatting. Nested maps and list items are walked to a bounded depth
//! (reusing [`crate::value::MAX_DEPTH`]) so a pathological field value
//! cannot make redaction itself unbounded.

use crate::value::{Value, MAX_DEPTH};
use ahash::AHashMap;
use regex::Regex;

const DEFAULT_PLACEHOLDER: &str = "[REDACTED]";

/// Case-insensitive sensitive field names, with common variants (spec
/// §4.4). Checked against a lower-cased field key.
const SENSITIVE_FIELD_NAMES: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "secret",
    "token",
    "access_token",
    "refresh_token",
    "api_key",
    "apikey",
    "authorization",
    "auth",
    "private_key",
    "privatekey",
    "client_secret",
];

/// Compiled regex patterns plus the replacement placeholder, applied in
/// registration order as full regex replaces.
pub struct Redactor {
    patterns: Vec<Regex>,
    placeholder: String,
}

impl Redactor {
    pub fn new() -> Self {
        Redactor { patterns: Vec::new(), placeholder: DEFAULT_PLACEHOLDER.to_string() }
    }

    pub fn with_placeholder(placeholder: impl Into<String>) -> Self {
        Redactor { patterns: Vec::new(), placeholder: placeholder.into() }
    }

    pub fn add_pattern(&mut self, pattern: Regex) {
        self.patterns.push(pattern);
    }

    /// Apply every pattern, in order, to formatted text. Each pass is a
    /// full regex replace-all over the previous pass's output.
    pub fn redact_text(&self, input: &str) -> String {
        let mut out = input.to_string();
        for pattern in &self.patterns {
            out = pattern.replace_all(&out, self.placeholder.as_str()).into_owned();
        }
        out
    }

    /// Apply pattern redaction directly to formatted bytes, as the
    /// dispatcher does post-formatting (spec §4.6 step 2). Invalid UTF-8
    /// is passed through unredacted rather than panicking — binary
    /// payloads (the `raw_bytes` passthrough path) are not pattern-redacted.
    pub fn redact_bytes(&self, input: &[u8]) -> Vec<u8> {
        match std::str::from_utf8(input) {
            Ok(text) => self.redact_text(text).into_bytes(),
            Err(_) => input.to_vec(),
        }
    }

    /// Walk a structured field map and replace the value of any key
    /// whose name case-insensitively matches the sensitive set with the
    /// placeholder. Called before formatting, per spec §4.4.
    pub fn redact_fields(&self, fields: &AHashMap<String, Value>) -> AHashMap<String, Value> {
        fields
            .iter()
            .map(|(k, v)| {
                if is_sensitive_name(k) {
                    (k.clone(), Value::String(self.placeholder.clone()))
                } else {
                    (k.clone(), self.redact_value(v, 0))
                }
            })
            .collect()
    }

    fn redact_value(&self, value: &Value, depth: usize) -> Value {
        if depth >= MAX_DEPTH {
            return value.clone();
        }
        match value {
            Value::List(items) => {
                Value::List(items.iter().map(|v| self.redact_value(v, depth + 1)).collect())
            }
            Value::Map(map) => {
                let redacted = map
                    .iter()
                    .map(|(k, v)| {
                        if is_sensitive_name(k) {
                            (k.clone(), Value::String(self.placeholder.clone()))
                        } else {
                            (k.clone(), self.redact_value(v, depth + 1))
                        }
                    })
                    .collect();
                Value::Map(redacted)
            }
            other => other.clone(),
        }
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_sensitive_name(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_FIELD_NAMES.iter().any(|name| *name == lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_redaction_replaces_every_match_in_order() {
        let mut redactor = Redactor::new();
        redactor.add_pattern(Regex::new(r"password=\w+").unwrap());
        redactor.add_pattern(Regex::new(r"token=[\w-]+").unwrap());

        let out = redactor.redact_text("User login password=hunter2 token=abc-123");
        assert_eq!(out.matches("[REDACTED]").count(), 2);
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("abc-123"));
    }

    #[test]
    fn sensitive_field_names_are_case_insensitive() {
        let redactor = Redactor::new();
        let mut fields = AHashMap::new();
        fields.insert("Password".to_string(), Value::from("hunter2"));
        fields.insert("user".to_string(), Value::from("alice"));

        let redacted = redactor.redact_fields(&fields);
        assert_eq!(redacted.get("Password"), Some(&Value::String("[REDACTED]".to_string())));
        assert_eq!(redacted.get("user"), Some(&Value::from("alice")));
    }

    #[test]
    fn nested_maps_are_walked() {
        let redactor = Redactor::new();
        let mut inner = AHashMap::new();
        inner.insert("api_key".to_string(), Value::from("sk-live-123"));
        let mut fields = AHashMap::new();
        fields.insert("auth_context".to_string(), Value::Map(inner));

        let redacted = redactor.redact_fields(&fields);
        if let Some(Value::Map(inner)) = redacted.get("auth_context") {
            assert_eq!(inner.get("api_key"), Some(&Value::String("[REDACTED]".to_string())));
        } else {
            panic!("expected nested map to survive redaction");
        }
    }

    #[test]
    fn custom_placeholder_is_used() {
        let mut redactor = Redactor::with_placeholder("***");
        redactor.add_pattern(Regex::new(r"secret").unwrap());
        assert_eq!(redactor.redact_text("it's a secret"), "it's a ***");
    }
}
