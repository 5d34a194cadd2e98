//! The single-consumer dispatcher loop (component C9).
//!
//! Grounded in the teacher's `backend/async.rs` background-writer thread
//! (`thread::spawn` draining a channel until disconnect, flushing on
//! timeout), generalized from one buffered file writer to the full
//! redact → per-destination-format → write → metrics pipeline spec §4.6
//! describes.

use crate::destination::Destination;
use crate::diagnostics::{report, ErrorEvent, ErrorHandler, ErrorKind};
use crate::error::LogForgeError;
use crate::metrics::Metrics;
use crate::record::LogRecord;
use crate::redact::Redactor;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Shared destination registry the dispatcher reads on every record and
/// the management API mutates under the same lock.
pub type DestinationRegistry = Arc<RwLock<Vec<Arc<Destination>>>>;

pub struct Dispatcher {
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the dispatcher thread. It runs until `receiver` disconnects
    /// (the producer side dropped every sender, i.e. the logger closed),
    /// draining whatever remains, then flushing and closing every
    /// destination before exiting (spec §4.6/§5 shutdown).
    pub fn spawn(
        receiver: Receiver<LogRecord>,
        destinations: DestinationRegistry,
        redactor: Arc<RwLock<Redactor>>,
        metrics: Arc<Metrics>,
        error_handler: Option<ErrorHandler>,
    ) -> Self {
        let handle = thread::spawn(move || {
            loop {
                match receiver.recv_timeout(FLUSH_POLL_INTERVAL) {
                    Ok(record) => {
                        dispatch_one(&record, &destinations, &redactor, &metrics, &error_handler);
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            // Drain whatever was queued before the channel closed.
            while let Ok(record) = receiver.try_recv() {
                dispatch_one(&record, &destinations, &redactor, &metrics, &error_handler);
            }
            for destination in destinations.read().iter() {
                let _ = destination.flush();
                let _ = destination.close();
            }
        });
        Dispatcher { handle: Some(handle) }
    }

    /// Block until the dispatcher thread has exited (called after the
    /// ingress side has closed its senders).
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn dispatch_one(
    record: &LogRecord,
    destinations: &DestinationRegistry,
    redactor: &Arc<RwLock<Redactor>>,
    metrics: &Arc<Metrics>,
    error_handler: &Option<ErrorHandler>,
) {
    metrics.record_logged(record.level);
    let started = Instant::now();
    let guard = redactor.read();
    let redacted = redact_record(record, &guard);
    for destination in destinations.read().iter() {
        if !destination.is_enabled() {
            continue;
        }
        match destination.handle(&redacted, &guard) {
            Ok(bytes) => metrics.record_bytes_written(bytes as u64),
            Err(err) => {
                metrics.record_write_error();
                report(
                    error_handler.as_ref(),
                    ErrorEvent::new(error_kind_for(&err), err.to_string())
                        .with_destination(destination.name.clone()),
                );
            }
        }
    }
    metrics.record_write_latency_us(started.elapsed().as_micros() as u64);
}

/// Map a write failure to the error-reporting taxonomy (spec §4.6 step 6:
/// "report any non-recovered error via the error handler").
fn error_kind_for(err: &LogForgeError) -> ErrorKind {
    match err {
        LogForgeError::DiskFull(_) => ErrorKind::DiskFull,
        LogForgeError::RotationError(_) => ErrorKind::Rotation,
        _ => ErrorKind::Write,
    }
}

/// Field-name redaction, applied before formatting since it operates on
/// the structured field map rather than rendered text (spec §4.4).
/// Pattern redaction runs later, per-destination, on the formatted byte
/// stream (`Destination::handle`).
fn redact_record(record: &LogRecord, redactor: &Redactor) -> LogRecord {
    use crate::record::Payload;
    match &record.payload {
        Payload::Structured(entry) => {
            let mut redacted_entry = (**entry).clone();
            redacted_entry.fields = redactor.redact_fields(&entry.fields);
            let mut clone = record.clone();
            clone.payload = Payload::Structured(Box::new(redacted_entry));
            clone
        }
        _ => {
            let mut clone = record.clone();
            if let Some(fields) = &record.fields {
                clone.fields = Some(redactor.redact_fields(fields));
            }
            clone
        }
    }
}

/// Used by tests and by `Logger::flush` to wait for in-flight records to
/// be observed by every destination's flush, without exposing the
/// dispatcher's internal channel.
pub fn flush_all(destinations: &DestinationRegistry) -> crate::error::Result<()> {
    for destination in destinations.read().iter() {
        destination.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::file::{FileBackend, FileOptions};
    use crate::format::FormatKind;
    use crate::level::Level;
    use crate::record::StructuredEntry;
    use crossbeam_channel::bounded;

    #[test]
    fn dispatcher_drains_queue_and_writes_to_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let backend = FileBackend::open(&path, FileOptions::default(), None, None).unwrap();
        let destination =
            Arc::new(Destination::new("primary", Box::new(backend), FormatKind::Text, Level::Trace));
        let destinations: DestinationRegistry = Arc::new(RwLock::new(vec![destination]));
        let redactor = Arc::new(RwLock::new(Redactor::new()));
        let metrics = Arc::new(Metrics::new());

        let (sender, receiver) = bounded::<LogRecord>(16);
        let dispatcher = Dispatcher::spawn(receiver, destinations, redactor, metrics.clone(), None);

        let entry = StructuredEntry::new(Level::Info, "hello");
        sender.send(LogRecord::structured(Level::Info, entry)).unwrap();
        drop(sender);
        dispatcher.join();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("hello"));
        assert_eq!(metrics.snapshot().messages_logged_by_level[Level::Info.index()], 1);
    }

    #[test]
    fn structured_fields_are_redacted_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let backend = FileBackend::open(&path, FileOptions::default(), None, None).unwrap();
        let destination = Arc::new(Destination::new(
            "primary",
            Box::new(backend),
            FormatKind::Json,
            Level::Trace,
        ));
        let destinations: DestinationRegistry = Arc::new(RwLock::new(vec![destination]));
        let redactor = Arc::new(RwLock::new(Redactor::new()));
        let metrics = Arc::new(Metrics::new());

        let (sender, receiver) = bounded::<LogRecord>(16);
        let dispatcher = Dispatcher::spawn(receiver, destinations, redactor, metrics, None);

        let mut entry = StructuredEntry::new(Level::Info, "login");
        entry.fields.insert("password".to_string(), crate::value::Value::from("hunter2"));
        sender.send(LogRecord::structured(Level::Info, entry)).unwrap();
        drop(sender);
        dispatcher.join();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("hunter2"));
        assert!(contents.contains("REDACTED"));
    }

    struct FailingBackend;

    impl crate::destination::Backend for FailingBackend {
        fn write(&mut self, _level: Level, _bytes: &[u8]) -> crate::error::Result<()> {
            Err(LogForgeError::BackendUnavailable("gone".to_string()))
        }
        fn flush(&mut self) -> crate::error::Result<()> {
            Ok(())
        }
        fn close(&mut self) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failures_are_reported_to_the_error_handler() {
        use std::sync::Mutex;

        let destination =
            Arc::new(Destination::new("primary", Box::new(FailingBackend), FormatKind::Text, Level::Trace));
        let destinations: DestinationRegistry = Arc::new(RwLock::new(vec![destination]));
        let redactor = Arc::new(RwLock::new(Redactor::new()));
        let metrics = Arc::new(Metrics::new());

        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&events);
        let handler: ErrorHandler = Arc::new(move |event| captured.lock().unwrap().push(event.to_string()));

        let (sender, receiver) = bounded::<LogRecord>(16);
        let dispatcher = Dispatcher::spawn(receiver, destinations, redactor, metrics, Some(handler));

        let entry = StructuredEntry::new(Level::Info, "hello");
        sender.send(LogRecord::structured(Level::Info, entry)).unwrap();
        drop(sender);
        dispatcher.join();

        let seen = events.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("primary"));
    }
}
