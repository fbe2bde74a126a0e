use super::{ChargeController, Classification, ControllerState};
use crate::error::Result;
use crate::states::{ChargeControllerStatus, ChargerStateBucket};

/// Below this draw the car is considered idle
const IDLE_POWER_WATTS: f64 = 1.0;

impl ChargeController {
    /// Classification for chargers with a native state entity.
    ///
    /// Rule order (first match wins):
    /// - hub disabled -> Disabled
    /// - done token -> Done
    /// - idle token -> Idle (clears the done flag)
    /// - power guard dead -> Error
    /// - hub already done -> Done
    /// - non-hour without override -> Stop
    /// - connected token -> connected sub-check
    /// - charging token -> charging sub-check
    ///
    /// `None` when nothing matched.
    pub(super) async fn classify_generic(
        &self,
        state: &mut ControllerState,
    ) -> Result<Option<Classification>> {
        if !self.ports.hub.is_enabled() {
            return Ok(Some(Classification::touch(ChargeControllerStatus::Disabled)));
        }
        let raw = self
            .ports
            .charger
            .charger_state()
            .await?
            .unwrap_or_default();
        let states = &self.native_states;

        if states.contains(ChargerStateBucket::Done, &raw) {
            self.done.set(true);
            return Ok(Some(Classification::keep(ChargeControllerStatus::Done)));
        }
        if states.contains(ChargerStateBucket::Idle, &raw) {
            if self.done.get() {
                self.done.set(false);
            }
            return Ok(Some(Classification::touch(ChargeControllerStatus::Idle)));
        }
        if self.ports.guard.is_dead() {
            return Ok(Some(Classification::touch(ChargeControllerStatus::Error)));
        }
        if self.done.get() {
            return Ok(Some(Classification::keep(ChargeControllerStatus::Done)));
        }
        if self.in_blocked_hour() {
            return Ok(Some(Classification::touch(ChargeControllerStatus::Stop)));
        }
        if states.contains(ChargerStateBucket::Connected, &raw) {
            return Ok(Some(self.connected_substatus(state, Some(&raw))));
        }
        if states.contains(ChargerStateBucket::Charging, &raw) {
            return Ok(Some(Classification::touch(self.charging_substatus())));
        }
        Ok(None)
    }

    /// Classification for smart outlets (switch plus power meter)
    pub(super) fn classify_outlet(&self, state: &mut ControllerState) -> Classification {
        if !self.ports.hub.is_enabled() {
            return Classification::touch(ChargeControllerStatus::Disabled);
        }
        if self.done.get() {
            return Classification::touch(ChargeControllerStatus::Done);
        }
        if self.in_blocked_hour() {
            return Classification::touch(ChargeControllerStatus::Stop);
        }
        if self.ports.charger.switch_on() && self.ports.charger.car_power_watts() < IDLE_POWER_WATTS
        {
            return self.connected_substatus(state, None);
        }
        Classification::touch(self.charging_substatus())
    }

    /// Classification when there is no controllable charger
    pub(super) fn classify_no_charger(&self) -> Classification {
        if !self.ports.hub.is_enabled() {
            return Classification::touch(ChargeControllerStatus::Disabled);
        }
        if self.in_blocked_hour() {
            return Classification::touch(ChargeControllerStatus::Stop);
        }
        Classification::touch(ChargeControllerStatus::Start)
    }

    /// Car is plugged in but not drawing power: decide between Done, Start and Stop
    fn connected_substatus(
        &self,
        state: &mut ControllerState,
        raw_state: Option<&str>,
    ) -> Classification {
        if let Some(raw) = raw_state
            && self.ports.charger.car_power_watts() < IDLE_POWER_WATTS
            && self.is_done_locked(state, raw)
        {
            return Classification::keep(ChargeControllerStatus::Done);
        }
        if self.ports.thresholds.below_start_threshold() || self.ports.hub.is_free_charge() {
            return Classification::touch(ChargeControllerStatus::Start);
        }
        Classification::touch(ChargeControllerStatus::Stop)
    }

    /// Car is charging: keep going unless the peak threshold says stop
    fn charging_substatus(&self) -> ChargeControllerStatus {
        if self.ports.thresholds.above_stop_threshold() && !self.ports.hub.is_free_charge() {
            ChargeControllerStatus::Stop
        } else {
            ChargeControllerStatus::Start
        }
    }

    fn in_blocked_hour(&self) -> bool {
        let schedule = &self.ports.schedule;
        schedule.is_non_hour(schedule.current_hour()) && !schedule.timer_override()
    }
}
