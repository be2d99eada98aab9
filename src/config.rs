//! Runtime settings.
//!
//! Settings come from an optional TOML file and `PLCWATCH_*` environment
//! variables (environment wins). Command-line flags are applied on top by
//! the binary.
//!
//! ```toml
//! idle_after = "20s"
//! stopped_after = "30s"
//! tick_interval = "1s"
//! legacy_tracking = false
//! machines = ["siemens_s7-1200", "omron"]
//! page_limit = 10
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, Map};
use plcwatch_sdk::LivenessThresholds;
use plcwatch_types::{KeyError, MachineKey};
use serde::Deserialize;
use thiserror::Error;

use crate::data::duration::parse_duration;
use crate::data::DEFAULT_PAGE_LIMIT;
use crate::registry::StaticRegistry;

const ENV_PREFIX: &str = "PLCWATCH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duration for {field}: {value:?} ({reason})")]
    InvalidDuration {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("idle_after ({idle:?}) must be shorter than stopped_after ({stopped:?})")]
    InvertedThresholds { idle: Duration, stopped: Duration },

    #[error("tick_interval must be greater than zero")]
    ZeroTick,

    #[error("invalid machine {name:?} in registry: {source}")]
    InvalidMachine { name: String, source: KeyError },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub idle_after: String,
    pub stopped_after: String,
    pub tick_interval: String,
    /// Also log raw `plc_running` flips as a second event provenance.
    pub legacy_tracking: bool,
    /// Registry of known machines, as `brand_model` keys or bare brands.
    pub machines: Vec<String>,
    pub page_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            idle_after: "20s".to_string(),
            stopped_after: "30s".to_string(),
            tick_interval: "1s".to_string(),
            legacy_tracking: false,
            machines: Vec::new(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Settings {
    /// Load settings from `path` (if given) and the process environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with_env(path, None)
    }

    fn load_with_env(path: Option<&Path>, env: Option<Map<String, String>>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("machines")
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check every derived value once so later accessors cannot fail on
    /// a loaded configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds()?;
        self.tick_interval()?;
        self.registry()?;
        Ok(())
    }

    pub fn thresholds(&self) -> Result<LivenessThresholds, ConfigError> {
        let thresholds = LivenessThresholds {
            idle_after: duration_field("idle_after", &self.idle_after)?,
            stopped_after: duration_field("stopped_after", &self.stopped_after)?,
        };
        if !thresholds.is_valid() {
            return Err(ConfigError::InvertedThresholds {
                idle: thresholds.idle_after,
                stopped: thresholds.stopped_after,
            });
        }
        Ok(thresholds)
    }

    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        let tick = duration_field("tick_interval", &self.tick_interval)?;
        if tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        Ok(tick)
    }

    pub fn registry(&self) -> Result<StaticRegistry, ConfigError> {
        let machines = self
            .machines
            .iter()
            .map(|name| {
                MachineKey::parse(name).map_err(|source| ConfigError::InvalidMachine {
                    name: name.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StaticRegistry::new(machines))
    }
}

fn duration_field(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).map_err(|e| ConfigError::InvalidDuration {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
