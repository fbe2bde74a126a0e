//! In-memory sensor store
//!
//! Outer plumbing (entity listeners, the stdin feed of the binary, tests)
//! pushes values in; the decision core reads them back through its ports.

use crate::error::{EvHubError, Result};
use crate::ports::{
    ChargerStateSource, CurrentPlanner, HubContext, PowerGuard, SensorReading, ThresholdOracle,
};
use serde::Deserialize;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct SensorValues {
    enabled: bool,
    hub_initialized: bool,
    lite: bool,
    power_reading: Option<SensorReading>,
    last_power_update: Option<Instant>,
    charger_state: Option<String>,
    charger_available: bool,
    switch_on: bool,
    car_power_w: f64,
    below_start: bool,
    above_stop: bool,
    free_charge: bool,
    desired_amps: u8,
    max_allowed_amps: Option<u8>,
}

/// One partial update, e.g. a JSON line `{"charger_state":"charging"}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorUpdate {
    pub enabled: Option<bool>,
    pub hub_initialized: Option<bool>,
    pub house_power_w: Option<f64>,
    pub charger_state: Option<String>,
    pub charger_available: Option<bool>,
    pub switch_on: Option<bool>,
    pub car_power_w: Option<f64>,
    pub below_start_threshold: Option<bool>,
    pub above_stop_threshold: Option<bool>,
    pub free_charge: Option<bool>,
    pub desired_amps: Option<u8>,
    pub max_allowed_amps: Option<u8>,
}

/// Thread-safe store backing every read-only port of the core
#[derive(Debug)]
pub struct SharedSensors {
    values: RwLock<SensorValues>,
    guard_timeout: Duration,
}

impl SharedSensors {
    pub fn new(lite: bool, guard_timeout: Duration) -> Self {
        Self {
            values: RwLock::new(SensorValues {
                enabled: true,
                hub_initialized: false,
                lite,
                power_reading: None,
                last_power_update: None,
                charger_state: None,
                charger_available: true,
                switch_on: false,
                car_power_w: 0.0,
                below_start: false,
                above_stop: false,
                free_charge: false,
                desired_amps: 6,
                max_allowed_amps: None,
            }),
            guard_timeout,
        }
    }

    fn read<T>(&self, f: impl FnOnce(&SensorValues) -> T) -> T {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        f(&values)
    }

    fn write(&self, f: impl FnOnce(&mut SensorValues)) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut values);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.write(|v| v.enabled = enabled);
    }

    pub fn set_hub_initialized(&self, initialized: bool) {
        self.write(|v| v.hub_initialized = initialized);
    }

    /// Record a numeric house power reading and feed the guard
    pub fn update_power(&self, watts: f64) {
        self.write(|v| {
            v.power_reading = Some(SensorReading::Numeric(watts));
            v.last_power_update = Some(Instant::now());
        });
    }

    /// Record a raw (possibly non-numeric) power sensor state
    pub fn set_power_reading(&self, reading: Option<SensorReading>) {
        self.write(|v| v.power_reading = reading);
    }

    pub fn set_charger_state(&self, raw: Option<&str>) {
        self.write(|v| {
            v.charger_state = raw.map(str::to_string);
            v.charger_available = true;
        });
    }

    /// Mark the charger state entity unavailable; reads fail until reset
    pub fn set_charger_available(&self, available: bool) {
        self.write(|v| v.charger_available = available);
    }

    pub fn set_switch(&self, on: bool) {
        self.write(|v| v.switch_on = on);
    }

    pub fn set_car_power(&self, watts: f64) {
        self.write(|v| v.car_power_w = watts);
    }

    pub fn set_thresholds(&self, below_start: bool, above_stop: bool) {
        self.write(|v| {
            v.below_start = below_start;
            v.above_stop = above_stop;
        });
    }

    pub fn set_free_charge(&self, free: bool) {
        self.write(|v| v.free_charge = free);
    }

    pub fn set_desired_amps(&self, amps: u8) {
        self.write(|v| v.desired_amps = amps);
    }

    /// Ceiling the power guard allows; `None` allows everything
    pub fn set_max_allowed_amps(&self, amps: Option<u8>) {
        self.write(|v| v.max_allowed_amps = amps);
    }

    /// Apply a partial update
    pub fn apply(&self, update: SensorUpdate) {
        if let Some(watts) = update.house_power_w {
            self.update_power(watts);
        }
        if let Some(raw) = update.charger_state.as_deref() {
            self.set_charger_state(Some(raw));
        }
        self.write(|v| {
            if let Some(enabled) = update.enabled {
                v.enabled = enabled;
            }
            if let Some(initialized) = update.hub_initialized {
                v.hub_initialized = initialized;
            }
            if let Some(available) = update.charger_available {
                v.charger_available = available;
            }
            if let Some(on) = update.switch_on {
                v.switch_on = on;
            }
            if let Some(watts) = update.car_power_w {
                v.car_power_w = watts;
            }
            if let Some(below) = update.below_start_threshold {
                v.below_start = below;
            }
            if let Some(above) = update.above_stop_threshold {
                v.above_stop = above;
            }
            if let Some(free) = update.free_charge {
                v.free_charge = free;
            }
            if let Some(amps) = update.desired_amps {
                v.desired_amps = amps;
            }
            if update.max_allowed_amps.is_some() {
                v.max_allowed_amps = update.max_allowed_amps;
            }
        });
    }
}

impl HubContext for SharedSensors {
    fn is_enabled(&self) -> bool {
        self.read(|v| v.enabled)
    }

    fn is_initialized(&self) -> bool {
        self.read(|v| v.hub_initialized)
    }

    fn is_lite(&self) -> bool {
        self.read(|v| v.lite)
    }

    fn power_sensor_reading(&self) -> Option<SensorReading> {
        self.read(|v| v.power_reading.clone())
    }

    fn is_free_charge(&self) -> bool {
        self.read(|v| v.free_charge)
    }
}

#[async_trait::async_trait]
impl ChargerStateSource for SharedSensors {
    async fn charger_state(&self) -> Result<Option<String>> {
        self.read(|v| {
            if v.charger_available {
                Ok(v.charger_state.clone())
            } else {
                Err(EvHubError::sensor("charger state entity unavailable"))
            }
        })
    }

    fn switch_on(&self) -> bool {
        self.read(|v| v.switch_on)
    }

    fn car_power_watts(&self) -> f64 {
        self.read(|v| v.car_power_w)
    }
}

impl PowerGuard for SharedSensors {
    fn is_dead(&self) -> bool {
        self.read(|v| {
            !v.lite
                && v
                    .last_power_update
                    .is_some_and(|at| at.elapsed() > self.guard_timeout)
        })
    }

    fn total_timer(&self) -> Duration {
        self.guard_timeout
    }

    fn allow_adjustment(&self, new_amps: u8) -> bool {
        self.read(|v| v.max_allowed_amps.is_none_or(|max| new_amps <= max))
    }
}

impl ThresholdOracle for SharedSensors {
    fn below_start_threshold(&self) -> bool {
        self.read(|v| v.below_start)
    }

    fn above_stop_threshold(&self) -> bool {
        self.read(|v| v.above_stop)
    }
}

impl CurrentPlanner for SharedSensors {
    fn desired_amps(&self) -> u8 {
        self.read(|v| v.desired_amps)
    }
}
