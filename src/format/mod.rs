//! Converting a [`crate::record::LogRecord`] into emitted bytes
//! (component C2).
//!
//! Both formatters append a terminating newline unless the input is raw
//! bytes (pass-through), per spec §4.5.

pub mod json;
pub mod text;

use crate::error::LogForgeError;
use crate::record::{LogRecord, Payload};

/// A formatter turns a record into the bytes a destination writes.
pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, LogForgeError>;
}

/// Which built-in formatter a destination uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Text,
    Json,
}

/// Raw-bytes records skip both formatters entirely — this is the shared
/// passthrough both [`text::TextFormatter`] and [`json::JsonFormatter`]
/// delegate to before doing any formatting work of their own.
pub(crate) fn passthrough_if_raw(record: &LogRecord) -> Option<Vec<u8>> {
    match &record.payload {
        Payload::Raw(bytes) => Some(bytes.clone()),
        _ => None,
    }
}
