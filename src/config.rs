//! Configuration management for EvHub
//!
//! This module handles loading, validation, and management of the hub
//! configuration from YAML files.

use crate::error::{EvHubError, Result};
use crate::states::{ChargerNativeStateMap, ChargerType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hub identity, charger type and schedule
    pub hub: HubConfig,

    /// Charge controller timing
    pub controller: ControllerConfig,

    /// Charger session orchestration and current ramping
    pub charger: ChargerConfig,

    /// Raw charger state tokens per logical bucket
    pub native_states: ChargerNativeStateMap,

    /// Power sensor watchdog
    pub power_guard: PowerGuardConfig,

    /// Session history
    pub session: SessionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Hub-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Name used as a prefix in log output
    pub name: String,

    /// Which classification variant the controller runs
    pub charger_type: ChargerType,

    /// Lite installations have no house power sensor
    pub lite: bool,

    /// Hours of the day (0-23) during which charging is not allowed
    pub non_hours: Vec<u32>,

    /// IANA timezone used to evaluate the hour of day
    pub timezone: String,

    /// Interval between periodic status recomputations in milliseconds
    pub tick_interval_ms: u64,
}

/// Charge controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Idle time after which a charger without a "done" token is considered done
    pub done_timeout_secs: u64,

    /// Minimum spacing between repeated done-inference debug messages
    pub debug_log_cooldown_secs: u64,
}

/// Charger orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargerConfig {
    /// Minimum time between two outbound charger commands
    pub call_cooldown_secs: u64,

    /// Interval between two current updates while charging
    pub loop_cycle_secs: u64,

    /// How long the ramp loop waits for the charger switch to report on
    pub turn_on_timeout_secs: u64,

    /// Poll interval while waiting for the charger switch
    pub turn_on_poll_secs: u64,

    /// Whether the charger accepts current updates at all
    pub allow_update_current: bool,

    /// Push `termination_amps` once when the ramp loop ends
    pub update_current_on_termination: bool,

    /// Current pushed on termination when enabled
    pub termination_amps: u8,

    /// The switch alone tells whether the charger is active
    pub powerswitch_controls_charging: bool,
}

/// Power sensor watchdog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerGuardConfig {
    /// Seconds without a house power update before the guard reports dead
    pub timeout_secs: u64,
}

/// Session history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// JSON file the finished sessions are written to and loaded from
    pub history_file: Option<String>,

    /// Number of finished sessions kept in memory and on disk
    pub max_history: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file (its directory receives the rotated files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl ControllerConfig {
    pub const fn done_timeout(&self) -> Duration {
        Duration::from_secs(self.done_timeout_secs)
    }

    pub const fn debug_log_cooldown(&self) -> Duration {
        Duration::from_secs(self.debug_log_cooldown_secs)
    }
}

impl ChargerConfig {
    pub const fn call_cooldown(&self) -> Duration {
        Duration::from_secs(self.call_cooldown_secs)
    }

    pub const fn loop_cycle(&self) -> Duration {
        Duration::from_secs(self.loop_cycle_secs)
    }

    pub const fn turn_on_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_on_timeout_secs)
    }

    pub const fn turn_on_poll(&self) -> Duration {
        Duration::from_secs(self.turn_on_poll_secs)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "evhub_config.yaml",
            "/data/evhub_config.yaml",
            "/etc/evhub/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(hour) = self.hub.non_hours.iter().find(|h| **h > 23) {
            return Err(EvHubError::validation(
                "hub.non_hours".to_string(),
                format!("hour {} out of range 0-23", hour),
            ));
        }

        if self.hub.tick_interval_ms == 0 {
            return Err(EvHubError::validation(
                "hub.tick_interval_ms",
                "Must be greater than 0",
            ));
        }

        if self.hub.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(EvHubError::validation(
                "hub.timezone".to_string(),
                format!("unknown timezone '{}'", self.hub.timezone),
            ));
        }

        if self.charger.termination_amps == 0 {
            return Err(EvHubError::validation(
                "charger.termination_amps",
                "Must be greater than 0",
            ));
        }

        if self.charger.loop_cycle_secs == 0 {
            return Err(EvHubError::validation(
                "charger.loop_cycle_secs",
                "Must be greater than 0",
            ));
        }

        if self.charger.turn_on_poll_secs == 0 {
            return Err(EvHubError::validation(
                "charger.turn_on_poll_secs",
                "Must be greater than 0",
            ));
        }

        if self.session.max_history == 0 {
            return Err(EvHubError::validation(
                "session.max_history",
                "Must be greater than 0",
            ));
        }

        if self.power_guard.timeout_secs == 0 {
            return Err(EvHubError::validation(
                "power_guard.timeout_secs",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}
