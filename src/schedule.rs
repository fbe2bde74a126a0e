//! Non-hour schedule evaluated in the hub's timezone

use crate::config::HubConfig;
use crate::error::{EvHubError, Result};
use crate::ports::ScheduleOracle;
use chrono::{TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Hours of the day during which charging is blocked, plus a manual override
#[derive(Debug)]
pub struct HourSchedule {
    non_hours: BTreeSet<u32>,
    timezone: Tz,
    timer_override: AtomicBool,
}

impl HourSchedule {
    pub fn new(non_hours: impl IntoIterator<Item = u32>, timezone: Tz) -> Self {
        Self {
            non_hours: non_hours.into_iter().collect(),
            timezone,
            timer_override: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &HubConfig) -> Result<Self> {
        let timezone = config.timezone.parse::<Tz>().map_err(|_| {
            EvHubError::validation(
                "hub.timezone".to_string(),
                format!("unknown timezone '{}'", config.timezone),
            )
        })?;
        Ok(Self::new(config.non_hours.iter().copied(), timezone))
    }

    /// Lift (or restore) the non-hour restriction
    pub fn set_timer_override(&self, active: bool) {
        self.timer_override.store(active, Ordering::SeqCst);
    }

    /// Hour of `instant` in the schedule's timezone
    pub fn hour_at(&self, instant: chrono::DateTime<Utc>) -> u32 {
        self.timezone.from_utc_datetime(&instant.naive_utc()).hour()
    }
}

impl ScheduleOracle for HourSchedule {
    fn current_hour(&self) -> u32 {
        self.hour_at(Utc::now())
    }

    fn is_non_hour(&self, hour: u32) -> bool {
        self.non_hours.contains(&hour)
    }

    fn timer_override(&self) -> bool {
        self.timer_override.load(Ordering::SeqCst)
    }
}
