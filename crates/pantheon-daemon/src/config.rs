use pantheon_models::PantheonConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::DaemonError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    #[serde(flatten)]
    pub pantheon: PantheonConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl DaemonConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DaemonError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DaemonError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| DaemonError::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would spin the timer loop or abandon every round.
    pub fn validate(&self) -> Result<(), DaemonError> {
        if self.schedule.interval_seconds == 0 {
            return Err(DaemonError::Config(
                "schedule.interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.pantheon.council.round_timeout_seconds == 0 {
            return Err(DaemonError::Config(
                "council.round_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    /// Run rounds on a timer. When off, rounds only run on trigger.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between scheduled rounds.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Seconds to wait after startup before the first round.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: u64,
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_seconds)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_seconds: default_interval(),
            initial_delay_seconds: default_initial_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP API listens on.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    1800
}

fn default_initial_delay() -> u64 {
    120
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}
