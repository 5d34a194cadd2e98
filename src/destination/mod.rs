//! Destinations: named, independently-configured log sinks.
//!
//! A [`Destination`] wraps a concrete backend (file or syslog, component
//! C6/C7) behind one trait so the dispatcher can drive an arbitrary list
//! of them uniformly. Grounded in the teacher's per-sink model
//! (`config/state.rs`'s `SinkConfig`, one formatter/filter/rotation set
//! per named sink) generalized to the pluggable-backend shape spec §3
//! describes.

pub mod file;
pub mod syslog;

use crate::error::{LogForgeError, Result};
use crate::filter::FilterStack;
use crate::format::{json::JsonFormatter, text::TextFormatter, FormatKind, Formatter};
use crate::level::Level;
use crate::record::{LogRecord, Payload};
use crate::value::Value;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;

/// Parsed form of a destination URI (`file://` or `syslog://`).
#[derive(Debug, Clone)]
pub enum DestinationUri {
    File { path: String },
    Syslog { network: String, address: String },
}

/// Parse a destination URI, per the ingress registration contract (spec
/// §3 Destination.uri, §7): unrecognized schemes are rejected.
pub fn parse_uri(uri: &str) -> Result<DestinationUri> {
    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(DestinationUri::File { path: path.to_string() });
    }
    if let Some(rest) = uri.strip_prefix("syslog://") {
        let (network, address) = rest.split_once('/').unwrap_or(("udp", rest));
        return Ok(DestinationUri::Syslog {
            network: network.to_string(),
            address: address.to_string(),
        });
    }
    Err(LogForgeError::InvalidUri(uri.to_string()))
}

/// Per-destination counters surfaced through [`crate::metrics::Metrics`]
/// aggregation and used by the disk-full recovery path to decide when a
/// destination is "degraded".
#[derive(Debug, Default)]
pub struct DestinationStats {
    pub bytes_written: AtomicU64,
    pub write_errors: AtomicU64,
    pub degraded: AtomicBool,
}

/// A concrete backend a [`Destination`] drives. Implementors own their
/// own I/O handle and any rotation/reconnect state.
pub trait Backend: Send {
    /// Write one already-formatted-and-redacted record's bytes. `level`
    /// is passed alongside the bytes so a backend that needs per-record
    /// metadata outside the formatted payload (syslog's priority prefix)
    /// doesn't need the formatter to bake it in.
    fn write(&mut self, level: Level, bytes: &[u8]) -> Result<()>;
    /// Flush buffered output without closing the backend.
    fn flush(&mut self) -> Result<()>;
    /// Release resources; called once during logger shutdown.
    fn close(&mut self) -> Result<()>;
}

fn build_formatter(kind: FormatKind) -> Box<dyn Formatter> {
    match kind {
        FormatKind::Text => Box::new(TextFormatter::default()),
        FormatKind::Json => Box::new(JsonFormatter::default()),
    }
}

/// Borrow whatever field map `record` carries, for per-destination filter
/// evaluation (spec §3 Destination.filters). Falls back to a shared empty
/// map rather than allocating one per call.
fn record_fields(record: &LogRecord) -> &AHashMap<String, Value> {
    static EMPTY: OnceLock<AHashMap<String, Value>> = OnceLock::new();
    match &record.payload {
        Payload::Structured(entry) => &entry.fields,
        _ => record.fields.as_ref().unwrap_or_else(|| EMPTY.get_or_init(AHashMap::new)),
    }
}

/// One named sink: a backend, its formatter, minimum level and filter
/// stack, and the live enable switch the dynamic config watcher flips.
pub struct Destination {
    pub name: String,
    pub min_level: Level,
    pub filters: FilterStack,
    pub enabled: AtomicBool,
    pub stats: DestinationStats,
    formatter: Box<dyn Formatter>,
    backend: Mutex<Box<dyn Backend>>,
}

impl Destination {
    pub fn new(
        name: impl Into<String>,
        backend: Box<dyn Backend>,
        format: FormatKind,
        min_level: Level,
    ) -> Self {
        Destination {
            name: name.into(),
            min_level,
            filters: FilterStack::new(),
            enabled: AtomicBool::new(true),
            stats: DestinationStats::default(),
            formatter: build_formatter(format),
            backend: Mutex::new(backend),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Format and write `record` if it's enabled and passes this
    /// destination's own filter stack (spec §3 Destination.filters).
    /// Caller (the dispatcher) has already applied field-name redaction;
    /// `redactor`'s pattern passes run here, on the formatted byte stream,
    /// since they need the rendered text rather than the structured
    /// fields (spec §4.4/§4.6 step 2).
    /// Returns the number of bytes written on success, `0` if the record
    /// was skipped by level/filter, so the dispatcher can roll a global
    /// byte count into [`crate::metrics::Metrics`] alongside this
    /// destination's own [`DestinationStats`] breakdown.
    pub fn handle(&self, record: &LogRecord, redactor: &crate::redact::Redactor) -> Result<usize> {
        if !self.is_enabled() || record.level < self.min_level {
            return Ok(0);
        }
        if !self.filters.evaluate(record.level, &record.resolved_message(), record_fields(record)) {
            return Ok(0);
        }
        let bytes = redactor.redact_bytes(&self.formatter.format(record)?);
        let mut backend = self.backend.lock();
        match backend.write(record.level, &bytes) {
            Ok(()) => {
                self.stats.bytes_written.fetch_add(bytes.len() as u64, Ordering::Relaxed);
                self.stats.degraded.store(false, Ordering::Relaxed);
                Ok(bytes.len())
            }
            Err(err) => {
                self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
                self.stats.degraded.store(true, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.backend.lock().flush()
    }

    pub fn close(&self) -> Result<()> {
        self.backend.lock().close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StructuredEntry;
    use std::sync::{Arc, Mutex as StdMutex};

    struct RecordingBackend(Arc<StdMutex<Vec<Vec<u8>>>>);

    impl Backend for RecordingBackend {
        fn write(&mut self, _level: Level, bytes: &[u8]) -> Result<()> {
            self.0.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn per_destination_filter_rejects_before_write() {
        use crate::filter::RegexFilter;

        let writes = Arc::new(StdMutex::new(Vec::new()));
        let backend = RecordingBackend(Arc::clone(&writes));
        let mut destination =
            Destination::new("primary", Box::new(backend), FormatKind::Text, Level::Trace);
        destination
            .filters
            .push(Box::new(RegexFilter::include(regex::Regex::new("^payment").unwrap())));

        let redactor = crate::redact::Redactor::new();
        let entry = StructuredEntry::new(Level::Info, "login ok");
        let record = LogRecord::structured(Level::Info, entry);
        destination.handle(&record, &redactor).unwrap();
        assert!(writes.lock().unwrap().is_empty());

        let entry = StructuredEntry::new(Level::Info, "payment processed");
        let record = LogRecord::structured(Level::Info, entry);
        destination.handle(&record, &redactor).unwrap();
        assert_eq!(writes.lock().unwrap().len(), 1);
    }

    #[test]
    fn parses_file_uri() {
        match parse_uri("file:///var/log/app.log").unwrap() {
            DestinationUri::File { path } => assert_eq!(path, "/var/log/app.log"),
            _ => panic!("expected file uri"),
        }
    }

    #[test]
    fn parses_syslog_uri_with_network() {
        match parse_uri("syslog://tcp/127.0.0.1:514").unwrap() {
            DestinationUri::Syslog { network, address } => {
                assert_eq!(network, "tcp");
                assert_eq!(address, "127.0.0.1:514");
            }
            _ => panic!("expected syslog uri"),
        }
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(parse_uri("ftp://nope"), Err(LogForgeError::InvalidUri(_))));
    }
}
