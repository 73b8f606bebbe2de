//! Meter configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::meter::controller::DEFAULT_TICK_INTERVAL;
use crate::meter::replay::DEFAULT_MAX_GAP_SECS;
use crate::sources::FieldsConfiguration;
use crate::Tariff;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed on parse the configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid tariff: {0}")]
    InvalidTariff(String),
    #[error("tick interval must be greater than zero")]
    InvalidTickInterval,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockOptions {
    pub tick_interval_ms: u64,
}

impl Default for ClockOptions {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    pub currency: String,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            currency: "¥".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayOptions {
    /// Gaps between fixes longer than this count as a pause
    pub max_gap_secs: u64,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            max_gap_secs: DEFAULT_MAX_GAP_SECS,
        }
    }
}

/// Whole configuration file; every section is optional
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub tariff: Tariff,
    pub clock: ClockOptions,
    pub display: DisplayOptions,
    pub replay: ReplayOptions,
    pub fields: FieldsConfiguration,
}

impl MeterConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // an empty document deserializes to unit, not to a mapping
        let conf: MeterConfig = if yaml.trim().is_empty() {
            MeterConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };

        conf.validate()?;

        Ok(conf)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tariff.validate().map_err(ConfigError::InvalidTariff)?;

        if self.clock.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidTickInterval);
        }

        Ok(())
    }
}
