//! Charge controller state machine
//!
//! The controller turns the hub flags, the charger's raw state and the
//! power/schedule oracles into one `ChargeControllerStatus` per tick. A
//! change of status is published on the event bus; everything else about a
//! tick (including failures) stays inside the controller.

use crate::config::ControllerConfig;
use crate::events::{DoneFlag, EventBus, HubEvent};
use crate::logging::{LogContext, LogThrottle, StructuredLogger, get_logger_with_context};
use crate::ports::{ChargerStateSource, HubContext, PowerGuard, ScheduleOracle, ThresholdOracle};
use crate::states::{ChargeControllerStatus, ChargerNativeStateMap, ChargerType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;

mod variants;


/// Oracles the controller reads on every tick
#[derive(Clone)]
pub struct ControllerPorts {
    pub hub: Arc<dyn HubContext>,
    pub charger: Arc<dyn ChargerStateSource>,
    pub guard: Arc<dyn PowerGuard>,
    pub schedule: Arc<dyn ScheduleOracle>,
    pub thresholds: Arc<dyn ThresholdOracle>,
}

/// Outcome of one classification: the status and whether the
/// latest-charger-start timestamp should be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Classification {
    pub status: ChargeControllerStatus,
    pub touch_timer: bool,
}

impl Classification {
    const fn touch(status: ChargeControllerStatus) -> Self {
        Self {
            status,
            touch_timer: true,
        }
    }

    const fn keep(status: ChargeControllerStatus) -> Self {
        Self {
            status,
            touch_timer: false,
        }
    }
}

/// Mutable controller state guarded by one lock per tick
struct ControllerState {
    is_initialized: bool,
    latest_charger_start: Instant,
    done_debug_log: LogThrottle,
}

/// The charge controller
pub struct ChargeController {
    name: String,
    charger_type: ChargerType,
    native_states: ChargerNativeStateMap,
    ports: ControllerPorts,
    done: Arc<DoneFlag>,
    bus: EventBus,
    done_timeout: Duration,
    state: Mutex<ControllerState>,
    status_tx: watch::Sender<ChargeControllerStatus>,
    logger: StructuredLogger,
}

impl ChargeController {
    /// Create a controller; it stays inert until initialized
    pub fn new(
        hub_name: &str,
        charger_type: ChargerType,
        native_states: ChargerNativeStateMap,
        ports: ControllerPorts,
        done: Arc<DoneFlag>,
        bus: EventBus,
        config: &ControllerConfig,
    ) -> Self {
        let logger = get_logger_with_context(
            LogContext::new("controller")
                .with_hub(hub_name)
                .with_field("charger_type", format!("{:?}", charger_type)),
        );
        logger.debug(&format!(
            "Native state buckets: {:?}",
            native_states.summary()
        ));
        let (status_tx, _) = watch::channel(ChargeControllerStatus::Idle);

        Self {
            name: format!("{} Charger controller", hub_name),
            charger_type,
            native_states,
            ports,
            done,
            bus,
            done_timeout: config.done_timeout(),
            state: Mutex::new(ControllerState {
                is_initialized: false,
                latest_charger_start: Instant::now(),
                done_debug_log: LogThrottle::new(config.debug_log_cooldown()),
            }),
            status_tx,
            logger,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn charger_type(&self) -> ChargerType {
        self.charger_type
    }

    pub const fn native_states(&self) -> &ChargerNativeStateMap {
        &self.native_states
    }

    /// Status held since the last change
    pub fn current_status(&self) -> ChargeControllerStatus {
        *self.status_tx.borrow()
    }

    /// Watch the status without going through the event bus
    pub fn subscribe_status(&self) -> watch::Receiver<ChargeControllerStatus> {
        self.status_tx.subscribe()
    }

    /// Whether the controller has seen what it needs to start classifying
    pub async fn is_initialized(&self) -> bool {
        let mut state = self.state.lock().await;
        self.is_initialized_locked(&mut state)
    }

    /// Re-probe the power sensor (or lite flag) and initialize if possible
    pub async fn check_initialized(&self) -> bool {
        let mut state = self.state.lock().await;
        self.check_initialized_locked(&mut state)
    }

    fn is_initialized_locked(&self, state: &mut ControllerState) -> bool {
        if !self.ports.hub.is_initialized() {
            return false;
        }
        if !state.is_initialized {
            return self.check_initialized_locked(state);
        }
        true
    }

    fn check_initialized_locked(&self, state: &mut ControllerState) -> bool {
        if state.is_initialized {
            return true;
        }
        let ready = self.ports.hub.is_lite()
            || self
                .ports
                .hub
                .power_sensor_reading()
                .is_some_and(|reading| reading.is_numeric());
        if ready {
            state.is_initialized = true;
            self.logger
                .info("Charge controller is initialized and ready to work");
        }
        ready
    }

    /// Refresh the latest-charger-start timestamp while the hub is enabled
    pub async fn touch_latest_charger_start(&self) {
        let mut state = self.state.lock().await;
        self.touch_locked(&mut state);
    }

    fn touch_locked(&self, state: &mut ControllerState) {
        if self.ports.hub.is_enabled() {
            state.latest_charger_start = Instant::now();
        }
    }

    /// Time of the last timer touch
    pub async fn latest_charger_start(&self) -> Instant {
        self.state.lock().await.latest_charger_start
    }

    /// Reclassify the overall status.
    ///
    /// A no-op until initialized. Errors and unmatched inputs keep the
    /// previous status.
    pub async fn recompute_status(&self) {
        let mut state = self.state.lock().await;
        if !self.is_initialized_locked(&mut state) {
            return;
        }

        let classified = match self.charger_type {
            ChargerType::Generic => self.classify_generic(&mut state).await,
            ChargerType::Outlet => Ok(Some(self.classify_outlet(&mut state))),
            ChargerType::NoCharger => Ok(Some(self.classify_no_charger())),
        };

        match classified {
            Ok(Some(classification)) => {
                if classification.touch_timer {
                    self.touch_locked(&mut state);
                }
                self.set_status(classification.status);
            }
            Ok(None) => {
                self.logger.debug(&format!(
                    "Charger state matched no classification, keeping {}",
                    self.current_status()
                ));
            }
            Err(e) => {
                self.logger
                    .debug(&format!("Error while computing charge status: {}", e));
            }
        }
    }

    fn set_status(&self, status: ChargeControllerStatus) {
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            self.logger.debug(&format!("Status changed to {}", status));
            self.bus.publish(HubEvent::StatusChanged(status));
        }
    }

    /// Whether the charger should be considered done given its raw state.
    ///
    /// With a non-empty done bucket only a matching token counts. Without
    /// one, done is inferred once the latest timer touch is older than the
    /// idle timeout. A positive answer raises the hub's done flag, which is
    /// published only when it actually flips.
    pub async fn is_done(&self, raw_state: &str) -> bool {
        let mut state = self.state.lock().await;
        self.is_done_locked(&mut state, raw_state)
    }

    fn is_done_locked(&self, state: &mut ControllerState, raw_state: &str) -> bool {
        if self.native_states.done.is_empty() {
            if state.latest_charger_start.elapsed() > self.done_timeout {
                if state.done_debug_log.allow() {
                    self.logger.debug(&format!(
                        "'is_done' reported that charger is Done because of idle-charging for more than {} seconds",
                        self.done_timeout.as_secs()
                    ));
                }
                return self.report_done();
            }
        } else if self.native_states.done.contains(raw_state) {
            if state.done_debug_log.allow() {
                self.logger.debug(
                    "'is_done' reported that charger is Done based on current charger state",
                );
            }
            return self.report_done();
        }
        false
    }

    fn report_done(&self) -> bool {
        self.done.set(true);
        true
    }

    /// React to one bus event
    pub async fn handle_event(&self, event: HubEvent) {
        match event {
            HubEvent::UpdateLatestChargerStart => self.touch_latest_charger_start().await,
            HubEvent::ChargerEnabledChanged => {
                self.touch_latest_charger_start().await;
                self.recompute_status().await;
            }
            HubEvent::HubInitialized => {
                self.check_initialized().await;
            }
            HubEvent::TimerActivated => self.recompute_status().await,
            HubEvent::PowerCanaryDead
            | HubEvent::StatusChanged(_)
            | HubEvent::ChargerDoneChanged(_) => {}
        }
    }
}
