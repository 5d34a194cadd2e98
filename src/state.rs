//! Shared, per-logger-instance state (data model `LoggerState`).
//!
//! One [`LoggerState`] backs one [`crate::logger::Logger`] — unlike the
//! teacher's single global `Lazy<RwLock<LoggerState>>` singleton
//! (`config/state.rs`), the engine supports multiple independent logger
//! instances (spec data model: "singleton per logger instance"), so the
//! `RwLock<RwLock<...>>` pattern here is instance-owned and handed out
//! behind an `Arc` instead of living in a `static`.

use crate::config::{FormatSetting, SamplingConfig};
use crate::filter::FilterStack;
use crate::level::Level;
use crate::sampler::Sampler;
use crate::value::Value;
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mutable configuration fields guarded by one lock, read on every
/// producer-thread call and written only by management calls and the
/// dynamic config watcher.
pub struct Scalars {
    pub level: Level,
    pub format: FormatSetting,
    pub global_fields: AHashMap<String, Value>,
    pub filters: FilterStack,
    pub sampler: Sampler,
}

impl Scalars {
    fn new(level: Level, format: FormatSetting) -> Self {
        Scalars {
            level,
            format,
            global_fields: AHashMap::new(),
            filters: FilterStack::new(),
            sampler: Sampler::none(),
        }
    }
}

/// The logger's full mutable state: destinations live in their own
/// `RwLock<Vec<...>>` (component registry churns independently of
/// scalar config changes) so a destination add/remove never blocks a
/// level read. The active redactor lives in its own `Arc<RwLock<...>>`
/// shared directly with the dispatcher (`logger.rs`), not here, since
/// only the dispatcher thread ever reads it.
pub struct LoggerState {
    pub scalars: RwLock<Scalars>,
    /// Monotonic `false → true`; never reset (spec data model invariant).
    pub closed: AtomicBool,
}

impl LoggerState {
    pub fn new(level: Level, format: FormatSetting) -> Self {
        LoggerState {
            scalars: RwLock::new(Scalars::new(level, format)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn level(&self) -> Level {
        self.scalars.read().level
    }

    pub fn set_level(&self, level: Level) {
        self.scalars.write().level = level;
    }

    pub fn apply_sampling(&self, sampling: &SamplingConfig) {
        use crate::config::SamplingStrategy;
        let sampler = match sampling.strategy {
            SamplingStrategy::None => Sampler::none(),
            SamplingStrategy::Random => Sampler::random(sampling.rate),
            SamplingStrategy::Interval => Sampler::interval(sampling.interval),
            SamplingStrategy::Consistent => Sampler::consistent(sampling.rate),
        };
        self.scalars.write().sampler = sampler;
    }
}
