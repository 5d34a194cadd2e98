//! The public ingress API (component C10).
//!
//! Grounded in the teacher's `logger.rs` level-method surface
//! (`trace/debug/info/warning/error`, one thin method per level
//! delegating to a shared log path) with the PyO3 binding layer stripped
//! and the shared path rebuilt around this engine's gate → sample →
//! enqueue pipeline instead of `tracing`'s macros.

use crate::compression::CompressionPool;
use crate::config::{FormatSetting, LoggerConfig};
use crate::destination::{Destination, DestinationUri};
use crate::diagnostics::{report, ErrorEvent, ErrorHandler, ErrorKind};
use crate::dispatcher::{Dispatcher, DestinationRegistry};
use crate::error::{LogForgeError, Result};
use crate::format::FormatKind;
use crate::level::Level;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::record::{ArgVec, LogRecord, StructuredEntry};
use crate::redact::Redactor;
use crate::state::LoggerState;
use crate::value::Value;
use ahash::AHashMap;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Worker count for the shared compression pool, started only when at
/// least one destination sets `compress`.
const COMPRESSION_WORKERS: usize = 2;

/// Cloneable handle to one logging engine instance. Cloning shares the
/// same queue, state and destinations (all held behind `Arc`) — this is
/// the object user code calls `info!`-style methods on.
#[derive(Clone)]
pub struct Logger {
    state: Arc<LoggerState>,
    /// Shared by every `Logger` clone (not cloned per-handle, unlike a
    /// bare `crossbeam_channel::Sender`) so that `close()` called from
    /// any clone disconnects the channel for all of them.
    sender: Arc<Mutex<Option<Sender<LogRecord>>>>,
    destinations: DestinationRegistry,
    metrics: Arc<Metrics>,
    dispatcher: Arc<DispatcherHandle>,
    /// Shared compression pool (component C8). Every `FileBackend` that
    /// compresses rotated files holds a clone of this same `Arc`, so the
    /// pool's own `Drop` joins its workers once every holder is gone.
    compression: Arc<CompressionPool>,
    /// User-registered callback for internal pipeline failures (ambient
    /// "logging of the logger itself" — the dispatcher can't log its own
    /// write failures through the pipeline it's reporting on). `None`
    /// routes events to stderr instead.
    error_handler: Option<ErrorHandler>,
}

/// Wraps the dispatcher's `JoinHandle` so the last `Logger` clone dropped
/// joins the background thread (`Drop` runs once, when the `Arc`'s count
/// hits zero).
struct DispatcherHandle(std::sync::Mutex<Option<Dispatcher>>);

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.0.lock().unwrap().take() {
            dispatcher.join();
        }
    }
}

impl Logger {
    /// Build a logger from a validated [`LoggerConfig`], opening every
    /// configured destination and starting the dispatcher thread. Internal
    /// pipeline failures print to stderr; use
    /// [`Logger::from_config_with_handler`] to intercept them instead.
    pub fn from_config(config: LoggerConfig) -> Result<Self> {
        Self::from_config_with_handler(config, None)
    }

    /// Like [`Logger::from_config`], but registers `error_handler` to
    /// receive internal pipeline failures (queue pressure, write errors,
    /// disk-full, rotation, compression, syslog reconnects) instead of
    /// having them printed to stderr.
    pub fn from_config_with_handler(config: LoggerConfig, error_handler: Option<ErrorHandler>) -> Result<Self> {
        let config = config.apply_env();
        config.validate()?;
        let level =
            Level::parse(&config.level).ok_or_else(|| LogForgeError::InvalidConfig(config.level.clone()))?;
        let format = config.format;
        let state = Arc::new(LoggerState::new(level, format));
        state.apply_sampling(&config.sampling);
        state.scalars.write().filters = crate::filter::build_filter_stack(&config.filters)?;

        let redactor = Arc::new(RwLock::new(build_redactor(&config.redaction)?));
        let metrics = Arc::new(Metrics::new());

        // Started unconditionally (its worker threads idle on `recv` until a
        // rotation submits a job) so any destination added later via
        // `add_destination` can turn on `compress` without reconstructing
        // the logger.
        let compression = Arc::new(CompressionPool::start(
            COMPRESSION_WORKERS,
            crate::compression::DEFAULT_QUEUE_CAPACITY,
            Arc::clone(&metrics),
            error_handler.clone(),
        ));

        let mut destinations = Vec::with_capacity(config.destinations.len());
        for destination_config in &config.destinations {
            destinations.push(Arc::new(open_destination(destination_config, &compression, &metrics)?));
        }
        let destinations: DestinationRegistry = Arc::new(RwLock::new(destinations));

        let (sender, receiver) = bounded::<LogRecord>(config.channel_capacity);
        let sender = Arc::new(Mutex::new(Some(sender)));
        let dispatcher = Dispatcher::spawn(
            receiver,
            Arc::clone(&destinations),
            Arc::clone(&redactor),
            Arc::clone(&metrics),
            error_handler.clone(),
        );

        {
            let mut scalars = state.scalars.write();
            for (key, value) in &config.global_fields {
                scalars.global_fields.insert(key.clone(), Value::String(value.clone()));
            }
        }

        Ok(Logger {
            state,
            sender,
            destinations,
            metrics,
            dispatcher: Arc::new(DispatcherHandle(std::sync::Mutex::new(Some(dispatcher)))),
            compression,
            error_handler,
        })
    }

    /// Default config pre-populated from the environment (spec §5/§6):
    /// `LOGFORGE_CHANNEL_SIZE` overrides `channel_capacity` here so it
    /// takes effect whether the caller passes this straight to
    /// [`Logger::from_config`] or tweaks it further first.
    pub fn builder() -> LoggerConfig {
        LoggerConfig::default().apply_env()
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        !self.state.is_closed() && level >= self.state.level()
    }

    pub fn set_level(&self, level: Level) {
        self.state.set_level(level);
    }

    /// Replace the producer-side filter stack wholesale (spec §4.10:
    /// scalars are applied as a unit, not merged field by field).
    pub fn set_filters(&self, specs: &[crate::filter::FilterSpec]) -> Result<()> {
        let stack = crate::filter::build_filter_stack(specs)?;
        self.state.scalars.write().filters = stack;
        Ok(())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Mark the logger closed, then block until every already-enqueued
    /// record has been dispatched and every destination has been flushed
    /// and closed (spec §4.1/§5): every ingress method becomes a silent
    /// no-op from this point, the shared queue sender is dropped so the
    /// dispatcher thread sees disconnect and drains its backlog, and this
    /// call joins that thread before returning.
    pub fn close(&self) {
        self.state.close();
        self.sender.lock().take();
        if let Some(dispatcher) = self.dispatcher.0.lock().unwrap().take() {
            dispatcher.join();
        }
    }

    /// Flush every destination's buffered writer without closing the
    /// logger (spec §4.1's durability note: the queue is the only
    /// in-memory buffer, durability requires `flush`).
    pub fn flush(&self) -> Result<()> {
        crate::dispatcher::flush_all(&self.destinations)
    }

    pub fn add_destination(&self, config: &crate::config::DestinationConfig) -> Result<()> {
        let mut destinations = self.destinations.write();
        if destinations.iter().any(|d| d.name == config.name) {
            return Err(LogForgeError::DuplicateDestination(config.name.clone()));
        }
        destinations.push(Arc::new(open_destination(config, &self.compression, &self.metrics)?));
        Ok(())
    }

    pub fn remove_destination(&self, name: &str) -> Result<()> {
        let mut destinations = self.destinations.write();
        let before = destinations.len();
        destinations.retain(|d| d.name != name);
        if destinations.len() == before {
            return Err(LogForgeError::UnknownDestination(name.to_string()));
        }
        Ok(())
    }

    pub fn set_destination_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let destinations = self.destinations.read();
        let destination =
            destinations.iter().find(|d| d.name == name).ok_or_else(|| LogForgeError::UnknownDestination(name.to_string()))?;
        destination.set_enabled(enabled);
        Ok(())
    }

    pub fn with_fields(&self, fields: AHashMap<String, Value>) -> BoundLogger {
        BoundLogger { logger: self.clone(), fields }
    }

    /// Bind a request/span context's extracted fields and gain
    /// deadline-awareness, per component C12.
    pub fn with_context<C: crate::context::ContextFields>(&self, context: &C) -> crate::context::ContextLogger {
        crate::context::ContextLogger::new(self.clone(), context)
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.log_plain(Level::Trace, message.into());
    }
    pub fn debug(&self, message: impl Into<String>) {
        self.log_plain(Level::Debug, message.into());
    }
    pub fn info(&self, message: impl Into<String>) {
        self.log_plain(Level::Info, message.into());
    }
    pub fn warn(&self, message: impl Into<String>) {
        self.log_plain(Level::Warn, message.into());
    }
    pub fn error(&self, message: impl Into<String>) {
        self.log_plain(Level::Error, message.into());
    }

    /// Lazy/printf-style variant: `format` and `args` are stored
    /// unevaluated and only expanded by the dispatcher (spec §4.1). The
    /// filter stack and sampler consult the raw format string rather than
    /// the expanded message, so this remains allocation-free when gated
    /// out.
    pub fn logf(&self, level: Level, format: impl Into<String>, args: ArgVec) {
        let format = format.into();
        let empty_fields = AHashMap::new();
        if !self.should_emit(level, &format, &empty_fields) {
            return;
        }
        self.enqueue(LogRecord::lazy(level, format, args));
    }

    /// Structured variant taking a message plus a fields map.
    pub fn log_structured(&self, level: Level, message: impl Into<String>, fields: AHashMap<String, Value>) {
        let message = message.into();
        if !self.should_emit(level, &message, &fields) {
            return;
        }
        let mut entry = StructuredEntry::new(level, message);
        entry.fields = self.merge_global_fields(fields);
        self.enqueue(LogRecord::structured(level, entry));
    }

    /// Pre-formatted bytes, passed straight through every formatter.
    /// Filters and the sampler see an empty message (there is no text to
    /// inspect before the destination's write).
    pub fn log_raw(&self, level: Level, bytes: Vec<u8>) {
        if !self.should_emit(level, "", &AHashMap::new()) {
            return;
        }
        self.enqueue(LogRecord::raw(level, bytes));
    }

    /// Context variant (spec §4.1): waits up to `deadline` for queue
    /// space instead of dropping immediately on a full queue.
    pub fn log_with_deadline(
        &self,
        level: Level,
        message: impl Into<String>,
        fields: AHashMap<String, Value>,
        deadline: Duration,
    ) -> Result<()> {
        let message = message.into();
        if !self.should_emit(level, &message, &fields) {
            return Ok(());
        }
        let mut entry = StructuredEntry::new(level, message);
        entry.fields = self.merge_global_fields(fields);
        let record = LogRecord::structured(level, entry);

        let started = Instant::now();
        let mut record = record;
        loop {
            match self.try_send(record) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => {
                    return Err(LogForgeError::LoggerClosed)
                }
                Err(TrySendError::Full(returned)) => {
                    if started.elapsed() >= deadline {
                        self.metrics.record_queue_full_drop();
                        report(
                            self.error_handler.as_ref(),
                            ErrorEvent::new(ErrorKind::Enqueue, "ingress queue full past deadline"),
                        );
                        return Err(LogForgeError::QueueFull);
                    }
                    record = returned;
                    std::thread::yield_now();
                }
            }
        }
    }

    fn log_plain(&self, level: Level, message: String) {
        if !self.should_emit(level, &message, &AHashMap::new()) {
            return;
        }
        let mut entry = StructuredEntry::new(level, message);
        entry.fields = self.merge_global_fields(AHashMap::new());
        self.enqueue(LogRecord::structured(level, entry));
    }

    fn merge_global_fields(&self, call_site: AHashMap<String, Value>) -> AHashMap<String, Value> {
        let mut merged = self.state.scalars.read().global_fields.clone();
        merged.extend(call_site);
        merged
    }

    /// Level gate, then filter stack, then sampler — in that order, per
    /// spec §4.2. Returns `false` without allocating a [`LogRecord`] for
    /// anything gated out.
    fn should_emit(&self, level: Level, message: &str, fields: &AHashMap<String, Value>) -> bool {
        if self.state.is_closed() {
            return false;
        }
        let scalars = self.state.scalars.read();
        if level < scalars.level {
            return false;
        }
        if !scalars.filters.evaluate(level, message, fields) {
            self.metrics.record_filtered_drop();
            return false;
        }
        if !scalars.sampler.should_pass(message) {
            self.metrics.record_sampled_drop();
            return false;
        }
        true
    }

    /// `try_send` through the shared sender slot, treating an
    /// already-`close()`d logger (slot emptied) the same as a
    /// disconnected channel.
    fn try_send(&self, record: LogRecord) -> std::result::Result<(), TrySendError<LogRecord>> {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.try_send(record),
            None => Err(TrySendError::Disconnected(record)),
        }
    }

    fn enqueue(&self, record: LogRecord) {
        if self.try_send(record).is_err() {
            self.metrics.record_queue_full_drop();
            report(self.error_handler.as_ref(), ErrorEvent::new(ErrorKind::Enqueue, "ingress queue full"));
        }
    }
}

fn build_redactor(config: &crate::config::RedactionConfig) -> Result<Redactor> {
    let mut redactor = match &config.placeholder {
        Some(placeholder) => Redactor::with_placeholder(placeholder.clone()),
        None => Redactor::new(),
    };
    for pattern in &config.patterns {
        let compiled = regex::Regex::new(pattern)
            .map_err(|e| LogForgeError::InvalidConfig(format!("bad redaction pattern '{pattern}': {e}")))?;
        redactor.add_pattern(compiled);
    }
    Ok(redactor)
}

fn open_destination(
    config: &crate::config::DestinationConfig,
    compression: &Arc<CompressionPool>,
    metrics: &Arc<Metrics>,
) -> Result<Destination> {
    let format = match config.format {
        FormatSetting::Text => FormatKind::Text,
        FormatSetting::Json => FormatKind::Json,
    };
    let min_level = Level::parse(&config.min_level)
        .ok_or_else(|| LogForgeError::InvalidConfig(format!("unknown min_level '{}'", config.min_level)))?;

    let backend: Box<dyn crate::destination::Backend> = match crate::destination::parse_uri(&config.uri)? {
        DestinationUri::File { path } => {
            let options = crate::destination::file::FileOptions {
                max_size: config.max_size_bytes,
                max_files: config.max_files,
                locked: config.locked,
                compress: config.compress,
                ..Default::default()
            };
            let pool = if config.compress { Some(Arc::clone(compression)) } else { None };
            Box::new(crate::destination::file::FileBackend::open(path, options, pool, Some(Arc::clone(metrics)))?)
        }
        DestinationUri::Syslog { network, address } => {
            Box::new(crate::destination::syslog::SyslogBackend::new(network, address, "logforge"))
        }
    };

    let mut destination = Destination::new(config.name.clone(), backend, format, min_level);
    destination.filters = crate::filter::build_filter_stack(&config.filters)?;
    Ok(destination)
}

/// A logger handle with a fixed set of fields merged into every call
/// (the non-context half of component C12; [`crate::context::ContextLogger`]
/// adds cancellation/deadline awareness on top of this).
pub struct BoundLogger {
    logger: Logger,
    fields: AHashMap<String, Value>,
}

impl BoundLogger {
    pub fn info(&self, message: impl Into<String>) {
        self.logger.log_structured(Level::Info, message, self.fields.clone());
    }
    pub fn warn(&self, message: impl Into<String>) {
        self.logger.log_structured(Level::Warn, message, self.fields.clone());
    }
    pub fn error(&self, message: impl Into<String>) {
        self.logger.log_structured(Level::Error, message, self.fields.clone());
    }
    pub fn with_fields(&self, extra: AHashMap<String, Value>) -> BoundLogger {
        let mut fields = self.fields.clone();
        fields.extend(extra);
        BoundLogger { logger: self.logger.clone(), fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DestinationConfig;

    fn text_destination(name: &str, path: &std::path::Path) -> DestinationConfig {
        DestinationConfig {
            name: name.to_string(),
            uri: format!("file://{}", path.display()),
            format: FormatSetting::Text,
            min_level: "trace".to_string(),
            max_size_bytes: 1_000_000,
            max_files: 3,
            locked: false,
            compress: false,
            filters: Vec::new(),
        }
    }

    #[test]
    fn below_threshold_records_never_enqueue() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LoggerConfig::default();
        config.level = "warn".to_string();
        config.destinations.push(text_destination("primary", &dir.path().join("app.log")));
        let logger = Logger::from_config(config).unwrap();

        logger.info("should be dropped");
        logger.close();
        logger.flush().unwrap();

        let snap = logger.metrics();
        assert_eq!(snap.messages_logged_by_level[Level::Info.index()], 0);
    }

    #[test]
    fn closed_logger_drops_everything_silently() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LoggerConfig::default();
        config.destinations.push(text_destination("primary", &dir.path().join("app.log")));
        let logger = Logger::from_config(config).unwrap();
        logger.close();
        logger.error("after close");
        assert!(!logger.is_enabled(Level::Error));
    }

    #[test]
    fn bound_logger_merges_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LoggerConfig::default();
        config.destinations.push(text_destination("primary", &dir.path().join("app.log")));
        let logger = Logger::from_config(config).unwrap();

        let mut fields = AHashMap::new();
        fields.insert("request_id".to_string(), Value::from("abc"));
        let bound = logger.with_fields(fields);
        bound.info("handled");

        std::thread::sleep(Duration::from_millis(50));
        logger.flush().unwrap();
        let contents = std::fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert!(contents.contains("request_id=abc"));
    }

    #[test]
    fn duplicate_destination_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LoggerConfig::default();
        config.destinations.push(text_destination("primary", &dir.path().join("app.log")));
        let logger = Logger::from_config(config).unwrap();
        let err = logger.add_destination(&text_destination("primary", &dir.path().join("app2.log")));
        assert!(matches!(err, Err(LogForgeError::DuplicateDestination(_))));
    }

    #[test]
    fn queue_full_is_reported_to_the_registered_error_handler() {
        use std::sync::Mutex;

        let dir = tempfile::tempdir().unwrap();
        let mut config = LoggerConfig::default();
        config.channel_capacity = 1;
        config.destinations.push(text_destination("primary", &dir.path().join("app.log")));

        let events: Arc<Mutex<Vec<ErrorKind>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&events);
        let handler: ErrorHandler = Arc::new(move |event| captured.lock().unwrap().push(event.kind));
        let logger = Logger::from_config_with_handler(config, Some(handler)).unwrap();

        for i in 0..2_000 {
            logger.info(format!("message {i}"));
        }

        logger.flush().unwrap();
        assert!(events.lock().unwrap().iter().any(|kind| *kind == ErrorKind::Enqueue));
    }
}
