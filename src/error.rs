//! Error taxonomy for the logging engine.
//!
//! Management APIs (`add_destination`, `remove_destination`, `set_level`,
//! `flush`, `close`, `apply_config`) return `Result<T, LogForgeError>`. The
//! ingress path never surfaces these — failures there are only observable
//! through the metrics surface and the registered [`crate::ErrorHandler`].

use std::fmt;

/// Everything that can go wrong inside the pipeline.
///
/// Each variant corresponds to one of the error kinds named in the
/// engine's error taxonomy: enqueue pressure, lifecycle misuse, bad
/// configuration, unreachable backends, disk exhaustion, transient I/O,
/// formatter failure, rotation failure and compression failure.
#[derive(Debug)]
pub enum LogForgeError {
    /// The ingress queue was full and the record was dropped.
    QueueFull,
    /// A management call was attempted after the logger was closed.
    LoggerClosed,
    /// A construction option or dynamic-config delta failed validation.
    InvalidConfig(String),
    /// A destination could not be opened or has lost its connection.
    BackendUnavailable(String),
    /// A write failed because the filesystem reported no space.
    DiskFull(String),
    /// A write failed transiently and was retried with backoff.
    TransientIo(String),
    /// A formatter could not serialize a record.
    FormatError(String),
    /// The rotation rename chain failed.
    RotationError(String),
    /// A compression worker could not finish compressing a rotated file.
    CompressionError(String),
    /// A destination name collided with one already registered.
    DuplicateDestination(String),
    /// A destination URI used an unrecognized scheme.
    InvalidUri(String),
    /// No destination exists with the given name.
    UnknownDestination(String),
}

impl fmt::Display for LogForgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogForgeError::QueueFull => write!(f, "ingress queue is full"),
            LogForgeError::LoggerClosed => write!(f, "logger is closed"),
            LogForgeError::InvalidConfig(m) => write!(f, "invalid configuration: {m}"),
            LogForgeError::BackendUnavailable(m) => write!(f, "backend unavailable: {m}"),
            LogForgeError::DiskFull(m) => write!(f, "disk full: {m}"),
            LogForgeError::TransientIo(m) => write!(f, "transient I/O error: {m}"),
            LogForgeError::FormatError(m) => write!(f, "format error: {m}"),
            LogForgeError::RotationError(m) => write!(f, "rotation error: {m}"),
            LogForgeError::CompressionError(m) => write!(f, "compression error: {m}"),
            LogForgeError::DuplicateDestination(name) => {
                write!(f, "destination '{name}' already registered")
            }
            LogForgeError::InvalidUri(uri) => write!(f, "invalid destination uri: {uri}"),
            LogForgeError::UnknownDestination(name) => {
                write!(f, "no destination named '{name}'")
            }
        }
    }
}

impl std::error::Error for LogForgeError {}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LogForgeError>;

/// Classification of a failed write, used to pick a recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailureKind {
    /// `ENOSPC`-equivalent: the filesystem is full.
    DiskFull,
    /// A short write, interrupted syscall, or similar recoverable error.
    Transient,
    /// The connection backing the destination dropped.
    ConnectionClosed,
}

/// Classify a `std::io::Error` the way the file and syslog destinations
/// need to in order to pick between disk-full recovery, bounded retry, or
/// reconnect.
pub fn classify_io_error(err: &std::io::Error) -> WriteFailureKind {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::StorageFull => WriteFailureKind::DiskFull,
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::NotConnected => {
            WriteFailureKind::ConnectionClosed
        }
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            WriteFailureKind::Transient
        }
        _ => {
            // `ENOSPC` surfaces as `Other` on some platforms; fall back to a
            // raw_os_error check (errno 28 on Linux/macOS).
            if err.raw_os_error() == Some(28) {
                WriteFailureKind::DiskFull
            } else {
                WriteFailureKind::Transient
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn display_includes_kind_context() {
        let err = LogForgeError::InvalidConfig("sampling_rate out of range".into());
        assert!(err.to_string().contains("sampling_rate out of range"));
    }

    #[test]
    fn classify_storage_full() {
        let err = io::Error::from(io::ErrorKind::StorageFull);
        assert_eq!(classify_io_error(&err), WriteFailureKind::DiskFull);
    }

    #[test]
    fn classify_broken_pipe_as_connection_closed() {
        let err = io::Error::from(io::ErrorKind::BrokenPipe);
        assert_eq!(
            classify_io_error(&err),
            WriteFailureKind::ConnectionClosed
        );
    }

    #[test]
    fn classify_interrupted_as_transient() {
        let err = io::Error::from(io::ErrorKind::Interrupted);
        assert_eq!(classify_io_error(&err), WriteFailureKind::Transient);
    }
}
