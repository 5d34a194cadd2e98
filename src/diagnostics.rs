//! Internal error reporting: the engine cannot log failures about its own
//! pipeline through its own pipeline (risk of recursive failure), so
//! internal failures are reported through a separate callback registered at
//! construction. Grounded in the teacher's `utils/debug.rs` internal
//! diagnostic channel, generalized from a free-standing debug-log function
//! to a typed callback the caller can register and intercept.

use std::fmt;
use std::sync::Arc;

/// Which part of the pipeline produced an [`ErrorEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The ingress queue was full and a record was dropped.
    Enqueue,
    /// A destination's write failed (after any retry).
    Write,
    /// A write failed because the filesystem reported no space.
    DiskFull,
    /// The rotation rename chain failed.
    Rotation,
    /// A background compression job failed.
    Compression,
    /// A syslog reconnect attempt failed.
    SyslogReconnect,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Enqueue => "enqueue",
            ErrorKind::Write => "write",
            ErrorKind::DiskFull => "disk_full",
            ErrorKind::Rotation => "rotation",
            ErrorKind::Compression => "compression",
            ErrorKind::SyslogReconnect => "syslog_reconnect",
        };
        f.write_str(s)
    }
}

/// One internal failure, handed to the registered [`ErrorHandler`] (or
/// printed to stderr if none is registered).
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    /// Name of the destination involved, when the failure is scoped to one.
    pub destination: Option<String>,
    pub message: String,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ErrorEvent { kind, destination: None, message: message.into() }
    }

    pub fn with_destination(mut self, name: impl Into<String>) -> Self {
        self.destination = Some(name.into());
        self
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.destination {
            Some(name) => write!(f, "[{}] {name}: {}", self.kind, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// A callback receiving internal pipeline failures. `Arc`-wrapped so it can
/// be cloned into background threads (the dispatcher, compression workers,
/// the syslog reconnector) without requiring the callback itself to be
/// `Clone`.
pub type ErrorHandler = Arc<dyn Fn(ErrorEvent) + Send + Sync>;

/// Report `event` through `handler`, or to stderr when no handler is
/// registered — mirroring the teacher's compression-worker "drop a job
/// with a stderr warning" fallback.
pub fn report(handler: Option<&ErrorHandler>, event: ErrorEvent) {
    match handler {
        Some(handler) => handler(event),
        None => eprintln!("logforge: {event}"),
    }
}
