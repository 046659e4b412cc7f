use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{BeatSyncError, Result};

const MAX_TICK_RATE_HZ: f64 = 1000.0;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Reads a JSON config file. Missing fields fall back to their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.sync.validate()?;
        Ok(config)
    }
}

/// Settings for the tick driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How often the driver samples the clock and emits a snapshot.
    pub tick_rate_hz: f64,
    /// Stop ticking once the clock passes the last analysed event.
    pub stop_at_end: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            stop_at_end: true,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        let rate = self.tick_rate_hz;
        if !rate.is_finite() || rate <= 0.0 || rate > MAX_TICK_RATE_HZ {
            return Err(BeatSyncError::InvalidConfig(format!(
                "tick rate must be within (0, {MAX_TICK_RATE_HZ}] Hz, got {rate}"
            )));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }
}

/// Configuration specific to log output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}
