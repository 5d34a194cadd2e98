//! Syslog destination backend (component C7).
//!
//! State machine, backoff and wire format follow spec §4.8. The
//! `Disconnected → Connecting → Connected` cycle and capped exponential
//! reconnect are new to this crate (the teacher has no network backend to
//! generalize from); grounded instead in the teacher's background-thread
//! idiom (`backend/async.rs`) for how a long-lived worker owns its own
//! state machine off the hot path.

use super::Backend;
use crate::error::{classify_io_error, LogForgeError, Result, WriteFailureKind};
use std::io::Write;
use std::net::{TcpStream, UdpSocket};
use std::os::unix::net::UnixStream;
use std::process;
use std::time::{Duration, Instant};

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_FACTOR: u32 = 2;
const BACKOFF_CAP: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Disconnected,
    Connected,
}

enum Socket {
    Udp(UdpSocket),
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Socket {
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            Socket::Udp(sock) => sock.send(bytes).map(|_| ()),
            Socket::Tcp(stream) => stream.write_all(bytes),
            Socket::Unix(stream) => stream.write_all(bytes),
        }
    }
}

/// `(facility << 3) | severity`, per spec §4.8. Facility defaults to
/// `user` (1); severity is derived from the record level by the caller.
pub fn priority(facility: u8, severity: u8) -> u8 {
    (facility << 3) | (severity & 0x07)
}

/// Map an engine [`crate::level::Level`] to an RFC 5424 severity code.
pub fn severity_for(level: crate::level::Level) -> u8 {
    use crate::level::Level;
    match level {
        Level::Trace | Level::Debug => 7,
        Level::Info => 6,
        Level::Warn => 4,
        Level::Error => 3,
    }
}

pub struct SyslogBackend {
    network: String,
    address: String,
    tag: String,
    facility: u8,
    socket: Option<Socket>,
    state: ConnState,
    backoff: Duration,
    next_attempt: Instant,
}

impl SyslogBackend {
    pub fn new(network: impl Into<String>, address: impl Into<String>, tag: impl Into<String>) -> Self {
        let mut backend = SyslogBackend {
            network: network.into(),
            address: address.into(),
            tag: tag.into(),
            facility: 1, // "user"
            socket: None,
            state: ConnState::Disconnected,
            backoff: BACKOFF_BASE,
            next_attempt: Instant::now(),
        };
        let _ = backend.try_connect();
        backend
    }

    fn try_connect(&mut self) -> std::io::Result<()> {
        let socket = match self.network.as_str() {
            "udp" => {
                let sock = UdpSocket::bind("0.0.0.0:0")?;
                sock.connect(&self.address)?;
                Socket::Udp(sock)
            }
            "tcp" => Socket::Tcp(TcpStream::connect(&self.address)?),
            "unix" => Socket::Unix(UnixStream::connect(&self.address)?),
            other => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("unsupported syslog network '{other}'"),
                ))
            }
        };
        self.socket = Some(socket);
        self.state = ConnState::Connected;
        self.backoff = BACKOFF_BASE;
        Ok(())
    }

    fn mark_disconnected(&mut self) {
        self.socket = None;
        self.state = ConnState::Disconnected;
        self.next_attempt = Instant::now() + self.backoff;
        self.backoff = (self.backoff * BACKOFF_FACTOR).min(BACKOFF_CAP);
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.state == ConnState::Connected {
            return Ok(());
        }
        if Instant::now() < self.next_attempt {
            return Err(LogForgeError::BackendUnavailable(self.address.clone()));
        }
        match self.try_connect() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.mark_disconnected();
                Err(LogForgeError::BackendUnavailable(format!("{}: {err}", self.address)))
            }
        }
    }

    /// Wrap an already-formatted payload with the `<priority>timestamp
    /// tag[pid]: ` prefix spec §4.8 requires.
    pub fn frame(&self, severity: u8, payload: &[u8]) -> Vec<u8> {
        let pri = priority(self.facility, severity);
        let timestamp = chrono::Utc::now().format("%b %e %H:%M:%S").to_string();
        let mut out = format!("<{pri}>{timestamp} {}[{}]: ", self.tag, process::id()).into_bytes();
        out.extend_from_slice(payload);
        out
    }
}

impl Backend for SyslogBackend {
    fn write(&mut self, level: crate::level::Level, bytes: &[u8]) -> Result<()> {
        self.ensure_connected()?;
        let framed = self.frame(severity_for(level), bytes);
        let socket = self.socket.as_mut().expect("connected state implies a socket");
        match socket.send(&framed) {
            Ok(()) => Ok(()),
            Err(err) => {
                let kind = classify_io_error(&err);
                self.mark_disconnected();
                match kind {
                    WriteFailureKind::DiskFull => Err(LogForgeError::DiskFull(self.address.clone())),
                    _ => Err(LogForgeError::TransientIo(format!("{}: {err}", self.address))),
                }
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.socket = None;
        self.state = ConnState::Disconnected;
        Ok(())
    }
}
