//! Declarative logger configuration and dynamic-config deltas.
//!
//! Grounded in the other-pack `ultra-logger::config::LoggerConfig`
//! nested-struct/`Default`/`validate` shape, retargeted from that crate's
//! transport/buffer knobs to this engine's destinations/sampling/redaction
//! surface.

use crate::error::{LogForgeError, Result};
use crate::filter::FilterSpec;
use crate::level::Level;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Environment variable overriding the ingress queue capacity (spec §5's
/// "configuration value (default on the order of 100–1000)").
pub const CHANNEL_SIZE_ENV: &str = "LOGFORGE_CHANNEL_SIZE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub level: String,
    pub format: FormatSetting,
    pub channel_capacity: usize,
    pub sampling: SamplingConfig,
    pub redaction: RedactionConfig,
    pub destinations: Vec<DestinationConfig>,
    pub global_fields: HashMap<String, String>,
    /// Producer-side filter stack (component C4), evaluated on every
    /// record before it's enqueued, ahead of per-destination filters.
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: "info".to_string(),
            format: FormatSetting::Text,
            channel_capacity: 1000,
            sampling: SamplingConfig::default(),
            redaction: RedactionConfig::default(),
            destinations: Vec::new(),
            global_fields: HashMap::new(),
            filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatSetting {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub strategy: SamplingStrategy,
    pub rate: f64,
    pub interval: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig { strategy: SamplingStrategy::None, rate: 1.0, interval: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingStrategy {
    None,
    Random,
    Interval,
    Consistent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactionConfig {
    pub placeholder: Option<String>,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub name: String,
    pub uri: String,
    pub format: FormatSetting,
    pub min_level: String,
    pub max_size_bytes: u64,
    pub max_files: usize,
    pub locked: bool,
    pub compress: bool,
    /// This destination's own filter stack (spec §3 Destination.filters),
    /// evaluated after the producer-side stack and after redaction.
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

/// One batch of changes applied atomically by the dynamic config watcher
/// (spec §4.10): scalars first, then destination actions in
/// `remove/disable` → `add/enable` order (an Open Question resolution —
/// see project notes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDelta {
    pub level: Option<String>,
    pub format: Option<FormatSetting>,
    pub sampling: Option<SamplingConfig>,
    pub global_fields: Option<HashMap<String, String>>,
    /// When present, replaces the whole producer-side filter stack
    /// (spec §4.10: scalars are applied as a unit, not merged field by
    /// field).
    pub filters: Option<Vec<FilterSpec>>,
    pub destination_actions: Vec<DestinationAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationAction {
    pub name: String,
    pub kind: DestinationActionKind,
    /// Required for `Add`; ignored otherwise.
    pub config: Option<DestinationConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationActionKind {
    Add,
    Remove,
    Enable,
    Disable,
}

impl LoggerConfig {
    /// Apply environment overrides on top of whatever was loaded from
    /// file or `Default`.
    pub fn apply_env(mut self) -> Self {
        if let Ok(raw) = std::env::var(CHANNEL_SIZE_ENV) {
            if let Ok(parsed) = raw.parse::<usize>() {
                self.channel_capacity = parsed;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if Level::parse(&self.level).is_none() {
            return Err(LogForgeError::InvalidConfig(format!("unknown level '{}'", self.level)));
        }
        if self.channel_capacity == 0 {
            return Err(LogForgeError::InvalidConfig("channel_capacity must be > 0".into()));
        }
        validate_sampling(&self.sampling)?;
        validate_filters(&self.filters)?;
        for destination in &self.destinations {
            validate_destination(destination)?;
        }
        let mut seen = std::collections::HashSet::new();
        for destination in &self.destinations {
            if !seen.insert(destination.name.as_str()) {
                return Err(LogForgeError::DuplicateDestination(destination.name.clone()));
            }
        }
        Ok(())
    }
}

fn validate_sampling(sampling: &SamplingConfig) -> Result<()> {
    if !(0.0..=1.0).contains(&sampling.rate) {
        return Err(LogForgeError::InvalidConfig(format!(
            "sampling rate {} out of range [0, 1]",
            sampling.rate
        )));
    }
    if sampling.interval == 0 {
        return Err(LogForgeError::InvalidConfig("sampling interval must be > 0".into()));
    }
    Ok(())
}

fn validate_destination(destination: &DestinationConfig) -> Result<()> {
    if Level::parse(&destination.min_level).is_none() {
        return Err(LogForgeError::InvalidConfig(format!(
            "destination '{}' has unknown min_level '{}'",
            destination.name, destination.min_level
        )));
    }
    crate::destination::parse_uri(&destination.uri)?;
    validate_filters(&destination.filters)?;
    Ok(())
}

/// Each spec must build a real [`crate::filter::Filter`] — catches a bad
/// regex or unknown level name at validation time instead of at
/// construction.
fn validate_filters(specs: &[FilterSpec]) -> Result<()> {
    for spec in specs {
        spec.build()?;
    }
    Ok(())
}

/// Validate a delta the same way a full config is validated, so the
/// watcher never applies a partially-invalid change (spec §4.10).
pub fn validate_delta(delta: &ConfigDelta) -> Result<()> {
    if let Some(level) = &delta.level {
        if Level::parse(level).is_none() {
            return Err(LogForgeError::InvalidConfig(format!("unknown level '{level}'")));
        }
    }
    if let Some(sampling) = &delta.sampling {
        validate_sampling(sampling)?;
    }
    if let Some(filters) = &delta.filters {
        validate_filters(filters)?;
    }
    for action in &delta.destination_actions {
        if action.kind == DestinationActionKind::Add {
            match &action.config {
                Some(config) => validate_destination(config)?,
                None => {
                    return Err(LogForgeError::InvalidConfig(format!(
                        "add action for '{}' is missing a destination config",
                        action.name
                    )))
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(LoggerConfig::default().validate().is_ok());
    }

    #[test]
    fn unknown_level_is_rejected() {
        let mut config = LoggerConfig::default();
        config.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(LogForgeError::InvalidConfig(_))));
    }

    #[test]
    fn out_of_range_sampling_rate_is_rejected() {
        let mut config = LoggerConfig::default();
        config.sampling.rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_destination_names_are_rejected() {
        let mut config = LoggerConfig::default();
        let dest = DestinationConfig {
            name: "primary".to_string(),
            uri: "file:///tmp/app.log".to_string(),
            format: FormatSetting::Text,
            min_level: "info".to_string(),
            max_size_bytes: 1024,
            max_files: 3,
            locked: false,
            compress: false,
            filters: Vec::new(),
        };
        config.destinations.push(dest.clone());
        config.destinations.push(dest);
        assert!(matches!(config.validate(), Err(LogForgeError::DuplicateDestination(_))));
    }

    #[test]
    fn env_override_updates_channel_capacity() {
        unsafe {
            std::env::set_var(CHANNEL_SIZE_ENV, "4096");
        }
        let config = LoggerConfig::default().apply_env();
        unsafe {
            std::env::remove_var(CHANNEL_SIZE_ENV);
        }
        assert_eq!(config.channel_capacity, 4096);
    }

    #[test]
    fn delta_requires_config_for_add_action() {
        let delta = ConfigDelta {
            destination_actions: vec![DestinationAction {
                name: "extra".to_string(),
                kind: DestinationActionKind::Add,
                config: None,
            }],
            ..Default::default()
        };
        assert!(validate_delta(&delta).is_err());
    }
}
