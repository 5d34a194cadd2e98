//! Context-bound logger (component C12).
//!
//! A deadline-aware wrapper on top of [`crate::logger::Logger`], used the
//! way request-scoped loggers are built throughout the corpus: extract
//! fields from a request/call context once, bind them, then let every
//! call-site add a few more. `{context-extracted fields} ∪ {bound fields}
//! ∪ {call-site fields}` merge with later entries winning, per spec
//! §4.11.

use crate::error::{LogForgeError, Result};
use crate::level::Level;
use crate::logger::Logger;
use crate::value::Value;
use ahash::AHashMap;
use std::time::{Duration, Instant};

/// A deadline a caller wants every call on this logger to respect. `None`
/// means no deadline — calls behave exactly like the bare [`Logger`].
#[derive(Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Deadline(None)
    }

    pub fn after(duration: Duration) -> Self {
        Deadline(Some(Instant::now() + duration))
    }

    fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}

/// Extracts a field set from an application-defined context type. Kept
/// generic so callers can plug in whatever request/span context their
/// application already threads through (trace id, tenant id, and so on)
/// without this crate depending on their type.
pub trait ContextFields {
    fn context_fields(&self) -> AHashMap<String, Value>;
}

pub struct ContextLogger {
    logger: Logger,
    fields: AHashMap<String, Value>,
    deadline: Deadline,
}

impl ContextLogger {
    pub fn new<C: ContextFields>(logger: Logger, context: &C) -> Self {
        ContextLogger { logger, fields: context.context_fields(), deadline: Deadline::none() }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_fields(mut self, fields: AHashMap<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Merge `{context-extracted} ∪ {bound} ∪ {call-site}` (later wins)
    /// and log at `level`. If the deadline has already passed, returns
    /// `Cancelled` without enqueueing — an already-enqueued record is
    /// never dropped retroactively by a later deadline check (spec
    /// §4.11).
    pub fn log(&self, level: Level, message: impl Into<String>, call_site: AHashMap<String, Value>) -> Result<()> {
        if self.deadline.is_expired() {
            return Err(LogForgeError::LoggerClosed);
        }
        let mut merged = self.fields.clone();
        merged.extend(call_site);

        match self.deadline.remaining() {
            Some(remaining) => self.logger.log_with_deadline(level, message, merged, remaining),
            None => {
                self.logger.log_structured(level, message, merged);
                Ok(())
            }
        }
    }

    pub fn info(&self, message: impl Into<String>) -> Result<()> {
        self.log(Level::Info, message, AHashMap::new())
    }

    pub fn warn(&self, message: impl Into<String>) -> Result<()> {
        self.log(Level::Warn, message, AHashMap::new())
    }

    pub fn error(&self, message: impl Into<String>) -> Result<()> {
        self.log(Level::Error, message, AHashMap::new())
    }
}
