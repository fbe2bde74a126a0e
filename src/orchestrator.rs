//! Charger session orchestrator
//!
//! Turns controller status changes into charger commands. At most one
//! outbound command is issued per transition, and no command goes out within
//! the call cooldown of the previous one.

use crate::config::ChargerConfig;
use crate::controller::ChargeController;
use crate::events::{DoneFlag, HubEvent};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::ports::{
    ChargerAdapter, ChargerCommand, ChargerStateSource, CurrentPlanner, HubContext, PowerGuard,
    SessionHooks,
};
use crate::states::{ChargeControllerStatus, ChargerStateBucket, ChargerType};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

mod params;
mod ramp;

pub use params::ChargerParams;
use ramp::{CurrentRamp, RampHandle};

const OVERTAKE_START_MESSAGE: &str =
    "Detected charger running outside of session, overtaking command.";
const OVERTAKE_PAUSE_MESSAGE: &str =
    "Detected charger running outside of session, overtaking command and pausing.";

/// Collaborators the orchestrator reads from or sends commands to
#[derive(Clone)]
pub struct OrchestratorPorts {
    pub hub: Arc<dyn HubContext>,
    pub charger: Arc<dyn ChargerStateSource>,
    pub guard: Arc<dyn PowerGuard>,
    pub planner: Arc<dyn CurrentPlanner>,
    pub adapter: Arc<dyn ChargerAdapter>,
    pub session: Arc<dyn SessionHooks>,
}

/// Orchestrates one charger on behalf of one controller
pub struct SessionOrchestrator {
    controller: Arc<ChargeController>,
    ports: OrchestratorPorts,
    done: Arc<DoneFlag>,
    options: ChargerConfig,
    params: Arc<Mutex<ChargerParams>>,
    ramp: Mutex<Option<RampHandle>>,
    logger: StructuredLogger,
}

impl SessionOrchestrator {
    pub fn new(
        hub_name: &str,
        controller: Arc<ChargeController>,
        ports: OrchestratorPorts,
        done: Arc<DoneFlag>,
        options: ChargerConfig,
    ) -> Self {
        let logger = get_logger_with_context(LogContext::new("charger").with_hub(hub_name));
        Self {
            controller,
            ports,
            done,
            options,
            params: Arc::new(Mutex::new(ChargerParams::default())),
            ramp: Mutex::new(None),
            logger,
        }
    }

    /// Snapshot of the orchestrator bookkeeping
    pub async fn params(&self) -> ChargerParams {
        self.params.lock().await.clone()
    }

    /// Whether the charger is physically delivering (or offering) power
    pub fn charger_active(&self) -> bool {
        let switch_on = self.ports.charger.switch_on();
        if self.options.powerswitch_controls_charging {
            return switch_on;
        }
        switch_on && self.ports.charger.car_power_watts() > 0.0
    }

    /// React to one bus event
    pub async fn handle_event(&self, event: HubEvent) {
        match event {
            HubEvent::StatusChanged(_) => self.on_status_changed().await,
            HubEvent::PowerCanaryDead => self.on_power_canary_dead().await,
            HubEvent::UpdateLatestChargerStart
            | HubEvent::ChargerEnabledChanged
            | HubEvent::HubInitialized
            | HubEvent::TimerActivated
            | HubEvent::ChargerDoneChanged(_) => {}
        }
    }

    /// Decide what the charger should do for the controller's current status
    pub async fn on_status_changed(&self) {
        if self.controller.charger_type() == ChargerType::NoCharger {
            return;
        }
        if self.params.lock().await.charger_state_mismatch {
            self.pause_charger(Some(
                "Charger still reported charging after the last stop, retrying pause.",
            ))
            .await;
        }

        let status = self.controller.current_status();
        let guard_dead = self.ports.guard.is_dead();

        if self.ports.hub.is_enabled() && !guard_dead {
            self.reset_session(status).await;
            let ChargerParams {
                running,
                session_active,
                ..
            } = self.params().await;

            match status {
                ChargeControllerStatus::Start => {
                    if !running {
                        if self.charger_active() {
                            self.overtake_charger(OVERTAKE_START_MESSAGE).await;
                        } else {
                            self.start_charger().await;
                        }
                    }
                }
                ChargeControllerStatus::Stop | ChargeControllerStatus::Idle => {
                    if self.charger_active() {
                        let message =
                            (!running && !session_active).then_some(OVERTAKE_PAUSE_MESSAGE);
                        self.pause_charger(message).await;
                    }
                }
                ChargeControllerStatus::Done => {
                    // The controller raises the done flag before publishing Done,
                    // so an open session is what marks "not yet terminated".
                    if running || session_active {
                        self.terminate_charger(Some("Going to terminate since the charger is done."))
                            .await;
                    }
                }
                ChargeControllerStatus::Connected
                | ChargeControllerStatus::Charging
                | ChargeControllerStatus::Disabled
                | ChargeControllerStatus::Error => {
                    self.logger
                        .debug(&format!("No charger action for controller status {}", status));
                }
            }
        } else if self.charger_active() && self.params.lock().await.running {
            let message = if guard_dead {
                self.guard_message()
            } else {
                OVERTAKE_PAUSE_MESSAGE.to_string()
            };
            self.pause_charger(Some(message.as_str())).await;
        }
    }

    /// The power guard went stale: pause regardless of the controller status
    pub async fn on_power_canary_dead(&self) {
        let message = self.guard_message();
        self.pause_charger(Some(message.as_str())).await;
    }

    /// Stop the ramp loop, e.g. when the hub shuts down
    pub async fn shutdown(&self) {
        self.stop_ramp().await;
    }

    fn guard_message(&self) -> String {
        format!(
            "Your power sensor has failed to update for more than {} seconds. Charging is paused until it comes alive again.",
            self.ports.guard.total_timer().as_secs()
        )
    }

    async fn reset_session(&self, status: ChargeControllerStatus) {
        if !self.params.lock().await.session_active && status != ChargeControllerStatus::Done {
            self.ports.session.reset();
        }
    }

    async fn call_ok(&self) -> bool {
        let cooldown = self.options.call_cooldown();
        self.params
            .lock()
            .await
            .latest_charger_call
            .is_none_or(|at| at.elapsed() > cooldown)
    }

    async fn start_charger(&self) {
        if !self.call_ok().await {
            self.logger
                .debug("Start requested within the call cooldown, skipping");
            return;
        }
        let session_active = self.params.lock().await.session_active;
        let command = if session_active {
            ChargerCommand::Resume
        } else {
            ChargerCommand::On
        };
        // State only follows an accepted call
        if !self.call_charger(command).await {
            return;
        }
        self.update_internal_state_on().await;
        self.params.lock().await.session_active = true;
        self.post_start_charger().await;
    }

    async fn overtake_charger(&self, message: &str) {
        self.logger.debug(message);
        self.update_internal_state_on().await;
        self.params.lock().await.session_active = true;
        self.post_start_charger().await;
    }

    async fn post_start_charger(&self) {
        self.controller.touch_latest_charger_start().await;
        if self.options.allow_update_current && !self.ports.hub.is_free_charge() {
            self.start_ramp().await;
        }
    }

    async fn terminate_charger(&self, message: Option<&str>) {
        if let Some(message) = message {
            self.logger.debug(message);
        }
        if !self.call_ok().await {
            self.logger
                .debug("Terminate requested within the call cooldown, skipping");
            return;
        }

        let session = Arc::clone(&self.ports.session);
        match tokio::task::spawn_blocking(move || session.terminate()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self
                .logger
                .debug(&format!("Session terminate reported: {}", e)),
            Err(e) => self
                .logger
                .warn(&format!("Session terminate task failed: {}", e)),
        }

        self.update_internal_state_off().await;
        self.params.lock().await.session_active = false;
        self.call_charger(ChargerCommand::Off).await;
        self.done.announce_done();
    }

    async fn pause_charger(&self, message: Option<&str>) {
        if let Some(message) = message {
            self.logger.debug(message);
        }
        if !self.call_ok().await {
            self.logger
                .debug("Pause requested within the call cooldown, skipping");
            return;
        }
        if self.done.get() || self.controller.current_status() == ChargeControllerStatus::Idle {
            self.terminate_charger(None).await;
        } else {
            self.update_internal_state_off().await;
            self.call_charger(ChargerCommand::Pause).await;
        }
    }

    /// Send one command; `false` when the adapter rejected it
    async fn call_charger(&self, command: ChargerCommand) -> bool {
        self.logger
            .debug(&format!("Calling charger {}", command.name()));
        match self.ports.adapter.call(command).await {
            Ok(()) => {
                self.params.lock().await.latest_charger_call = Some(Instant::now());
                true
            }
            Err(e) => {
                self.logger
                    .warn(&format!("Charger {} call failed: {}", command.name(), e));
                false
            }
        }
    }

    async fn update_internal_state_on(&self) {
        {
            let mut params = self.params.lock().await;
            params.running = true;
            params.disable_current_updates = false;
        }
        self.logger.debug("Internal charger has been started");
    }

    async fn update_internal_state_off(&self) {
        self.params.lock().await.disable_current_updates = true;

        let raw = match self.ports.charger.charger_state().await {
            Ok(raw) => raw.unwrap_or_default(),
            Err(e) => {
                self.logger
                    .debug(&format!("Charger state unreadable while stopping: {}", e));
                String::new()
            }
        };
        let still_charging = !raw.is_empty()
            && self
                .controller
                .native_states()
                .contains(ChargerStateBucket::Charging, &raw);

        if still_charging {
            self.params.lock().await.charger_state_mismatch = true;
            self.logger.debug(&format!(
                "Tried to stop connected charger, but it's reporting: {} as state. Retrying stop-attempt.",
                raw
            ));
        } else {
            {
                let mut params = self.params.lock().await;
                params.running = false;
                params.charger_state_mismatch = false;
            }
            self.stop_ramp().await;
            self.logger.debug("Internal charger has been stopped");
        }
    }

    async fn start_ramp(&self) {
        let ramp = CurrentRamp::new(
            Arc::clone(&self.params),
            Arc::clone(&self.ports.charger),
            Arc::clone(&self.ports.guard),
            Arc::clone(&self.ports.planner),
            Arc::clone(&self.ports.adapter),
            &self.options,
            self.logger.clone(),
        );
        let previous = self.ramp.lock().await.replace(ramp.spawn());
        if let Some(previous) = previous {
            previous.token.cancel();
        }
    }

    async fn stop_ramp(&self) {
        if let Some(handle) = self.ramp.lock().await.take() {
            handle.token.cancel();
            if handle.task.is_finished() {
                self.logger.trace("Ramp loop had already finished");
            }
        }
    }

    /// Whether a ramp loop is currently alive
    pub async fn ramp_active(&self) -> bool {
        self.ramp
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished() && !handle.token.is_cancelled())
    }
}
