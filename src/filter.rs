//! User-defined filters, evaluated on the producer thread (component C4).
//!
//! Gating happens before enqueue so that filtered records cost only
//! predicate evaluation (spec §4.2's design note) — no formatting, no
//! allocation of a queue slot.

use crate::error::{LogForgeError, Result};
use crate::level::Level;
use crate::value::Value;
use ahash::AHashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A pure predicate over `(level, message, fields)`. Returning `false`
/// stops processing for that record.
pub trait Filter: Send + Sync {
    fn allow(&self, level: Level, message: &str, fields: &AHashMap<String, Value>) -> bool;
}

/// Keep only records at or above a minimum level. Redundant with the
/// logger's global level gate, but useful on a per-destination filter
/// stack (spec §3 Destination.filters).
pub struct LevelFilter(pub Level);

impl Filter for LevelFilter {
    fn allow(&self, level: Level, _message: &str, _fields: &AHashMap<String, Value>) -> bool {
        level >= self.0
    }
}

/// Pass only records whose field `key` equals `value` exactly.
pub struct FieldEquals {
    pub key: String,
    pub value: Value,
}

impl Filter for FieldEquals {
    fn allow(&self, _level: Level, _message: &str, fields: &AHashMap<String, Value>) -> bool {
        fields.get(&self.key) == Some(&self.value)
    }
}

/// Pass only messages that match (or, inverted, that do not match) a
/// compiled regex.
pub struct RegexFilter {
    pattern: Regex,
    include: bool,
}

impl RegexFilter {
    pub fn include(pattern: Regex) -> Self {
        RegexFilter { pattern, include: true }
    }

    pub fn exclude(pattern: Regex) -> Self {
        RegexFilter { pattern, include: false }
    }
}

impl Filter for RegexFilter {
    fn allow(&self, _level: Level, message: &str, _fields: &AHashMap<String, Value>) -> bool {
        let matched = self.pattern.is_match(message);
        if self.include { matched } else { !matched }
    }
}

/// Wrap an arbitrary closure as a filter, for the "custom" filter kind.
pub struct CustomFilter<F>(pub F)
where
    F: Fn(Level, &str, &AHashMap<String, Value>) -> bool + Send + Sync;

impl<F> Filter for CustomFilter<F>
where
    F: Fn(Level, &str, &AHashMap<String, Value>) -> bool + Send + Sync,
{
    fn allow(&self, level: Level, message: &str, fields: &AHashMap<String, Value>) -> bool {
        (self.0)(level, message, fields)
    }
}

/// An ordered stack of filters, evaluated in registration order. The
/// first filter to return `false` stops the chain.
#[derive(Default)]
pub struct FilterStack {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterStack {
    pub fn new() -> Self {
        FilterStack { filters: Vec::new() }
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn evaluate(&self, level: Level, message: &str, fields: &AHashMap<String, Value>) -> bool {
        for filter in &self.filters {
            if !filter.allow(level, message, fields) {
                return false;
            }
        }
        true
    }
}

/// Declarative, serializable description of a [`Filter`] (spec §3
/// Destination.filters / Scalars.filters), so a filter stack can be
/// named in [`crate::config::LoggerConfig`]/[`crate::config::DestinationConfig`]
/// instead of only built up in code against the trait directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterSpec {
    Level { min_level: String },
    FieldEquals { key: String, value: String },
    Regex { pattern: String, include: bool },
}

impl FilterSpec {
    pub fn build(&self) -> Result<Box<dyn Filter>> {
        match self {
            FilterSpec::Level { min_level } => {
                let level = Level::parse(min_level)
                    .ok_or_else(|| LogForgeError::InvalidConfig(format!("unknown min_level '{min_level}'")))?;
                Ok(Box::new(LevelFilter(level)))
            }
            FilterSpec::FieldEquals { key, value } => {
                Ok(Box::new(FieldEquals { key: key.clone(), value: Value::from(value.as_str()) }))
            }
            FilterSpec::Regex { pattern, include } => {
                let compiled = Regex::new(pattern)
                    .map_err(|e| LogForgeError::InvalidConfig(format!("bad filter pattern '{pattern}': {e}")))?;
                let filter: Box<dyn Filter> = if *include {
                    Box::new(RegexFilter::include(compiled))
                } else {
                    Box::new(RegexFilter::exclude(compiled))
                };
                Ok(filter)
            }
        }
    }
}

/// Build a [`FilterStack`] from a config-declared spec list, in order.
pub fn build_filter_stack(specs: &[FilterSpec]) -> Result<FilterStack> {
    let mut stack = FilterStack::new();
    for spec in specs {
        stack.push(spec.build()?);
    }
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_fields() -> AHashMap<String, Value> {
        AHashMap::new()
    }

    #[test]
    fn empty_stack_allows_everything() {
        let stack = FilterStack::new();
        assert!(stack.evaluate(Level::Trace, "anything", &empty_fields()));
    }

    #[test]
    fn first_false_short_circuits() {
        let mut stack = FilterStack::new();
        stack.push(Box::new(LevelFilter(Level::Warn)));
        assert!(!stack.evaluate(Level::Info, "msg", &empty_fields()));
        assert!(stack.evaluate(Level::Error, "msg", &empty_fields()));
    }

    #[test]
    fn field_equals_matches_exact_value() {
        let mut fields = AHashMap::new();
        fields.insert("user".to_string(), Value::from("alice"));
        let filter = FieldEquals { key: "user".to_string(), value: Value::from("alice") };
        assert!(filter.allow(Level::Info, "msg", &fields));

        let mismatch = FieldEquals { key: "user".to_string(), value: Value::from("bob") };
        assert!(!mismatch.allow(Level::Info, "msg", &fields));
    }

    #[test]
    fn regex_include_and_exclude() {
        let re = Regex::new(r"^payment").unwrap();
        let include = RegexFilter::include(re.clone());
        let exclude = RegexFilter::exclude(re);
        assert!(include.allow(Level::Info, "payment processed", &empty_fields()));
        assert!(!include.allow(Level::Info, "login ok", &empty_fields()));
        assert!(!exclude.allow(Level::Info, "payment processed", &empty_fields()));
    }

    #[test]
    fn filter_spec_builds_a_working_stack() {
        let specs = vec![
            FilterSpec::Level { min_level: "warn".to_string() },
            FilterSpec::Regex { pattern: "^payment".to_string(), include: true },
        ];
        let stack = build_filter_stack(&specs).unwrap();
        assert!(!stack.evaluate(Level::Info, "payment processed", &empty_fields()));
        assert!(!stack.evaluate(Level::Error, "login ok", &empty_fields()));
        assert!(stack.evaluate(Level::Error, "payment processed", &empty_fields()));
    }

    #[test]
    fn filter_spec_rejects_bad_level() {
        let specs = vec![FilterSpec::Level { min_level: "loud".to_string() }];
        assert!(build_filter_stack(&specs).is_err());
    }

    #[test]
    fn filter_spec_rejects_bad_regex() {
        let specs = vec![FilterSpec::Regex { pattern: "(".to_string(), include: true }];
        assert!(build_filter_stack(&specs).is_err());
    }
}
