//! Capability interfaces the decision core depends on
//!
//! Each port is narrow so it can be backed by live sensors in production and
//! by a few lines of mock state in tests.

use crate::error::Result;
use std::time::Duration;

/// A raw reading of the house power sensor
#[derive(Debug, Clone, PartialEq)]
pub enum SensorReading {
    Numeric(f64),
    Text(String),
}

impl SensorReading {
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }
}

/// Hub-wide flags
pub trait HubContext: Send + Sync {
    /// Charging enabled by the user
    fn is_enabled(&self) -> bool;
    /// The surrounding hub has finished its own setup
    fn is_initialized(&self) -> bool;
    /// Lite installations run without a house power sensor
    fn is_lite(&self) -> bool;
    /// Latest raw value of the house power sensor, if any
    fn power_sensor_reading(&self) -> Option<SensorReading>;
    /// Charging is unconditionally allowed right now (e.g. free energy)
    fn is_free_charge(&self) -> bool;
}

/// Live view of the charger hardware
#[async_trait::async_trait]
pub trait ChargerStateSource: Send + Sync {
    /// Raw state token reported by the charger integration
    async fn charger_state(&self) -> Result<Option<String>>;
    /// Charger (or outlet) switch reports on
    fn switch_on(&self) -> bool;
    /// Power drawn by the car in watts
    fn car_power_watts(&self) -> f64;
}

/// Watchdog over the house power sensor
pub trait PowerGuard: Send + Sync {
    /// The power sensor has been stale for longer than the guard timeout
    fn is_dead(&self) -> bool;
    /// The guard timeout, reported in user-facing messages
    fn total_timer(&self) -> Duration;
    /// Whether raising/lowering the charger to `new_amps` is safe now
    fn allow_adjustment(&self, new_amps: u8) -> bool;
}

/// Which hours forbid charging
pub trait ScheduleOracle: Send + Sync {
    /// Hour of day (0-23) in the hub's timezone
    fn current_hour(&self) -> u32;
    fn is_non_hour(&self, hour: u32) -> bool;
    /// A manual timer override lifts non-hour restrictions
    fn timer_override(&self) -> bool;
}

/// Peak-threshold heuristics
pub trait ThresholdOracle: Send + Sync {
    /// Predicted consumption leaves room to start charging
    fn below_start_threshold(&self) -> bool;
    /// Predicted consumption requires charging to stop
    fn above_stop_threshold(&self) -> bool;
}

/// Amperage the charger should be set to under present conditions
pub trait CurrentPlanner: Send + Sync {
    fn desired_amps(&self) -> u8;
}

/// Commands the orchestrator can send to a charger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargerCommand {
    On,
    Off,
    Pause,
    Resume,
    UpdateCurrent { amps: u8 },
}

impl ChargerCommand {
    pub const fn name(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::UpdateCurrent { .. } => "updatecurrent",
        }
    }
}

/// Brand-specific charger integration
#[async_trait::async_trait]
pub trait ChargerAdapter: Send + Sync {
    async fn call(&self, command: ChargerCommand) -> Result<()>;
}

/// Lifecycle hooks of the accounting session.
///
/// `terminate` may block on I/O and is run off the async scheduler.
pub trait SessionHooks: Send + Sync {
    fn reset(&self);
    fn terminate(&self) -> Result<()>;
}
