#![allow(dead_code)]

use evhub::config::{ChargerConfig, ControllerConfig};
use evhub::controller::{ChargeController, ControllerPorts};
use evhub::error::{EvHubError, Result};
use evhub::events::{DoneFlag, EventBus, HubEvent};
use evhub::orchestrator::{OrchestratorPorts, SessionOrchestrator};
use evhub::ports::{ChargerAdapter, ChargerCommand, SessionHooks};
use evhub::schedule::HourSchedule;
use evhub::sensors::SharedSensors;
use evhub::{ChargeControllerStatus, ChargerNativeStateMap, ChargerType};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub const GUARD_TIMEOUT: Duration = Duration::from_secs(300);

/// Adapter that records every command it is asked to send
#[derive(Default)]
pub struct RecordingAdapter {
    calls: Mutex<Vec<ChargerCommand>>,
    failing: AtomicBool,
}

impl RecordingAdapter {
    pub fn calls(&self) -> Vec<ChargerCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, command: ChargerCommand) -> usize {
        self.calls().into_iter().filter(|c| *c == command).count()
    }

    pub fn current_updates(&self) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ChargerCommand::UpdateCurrent { amps } => Some(amps),
                _ => None,
            })
            .collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ChargerAdapter for RecordingAdapter {
    async fn call(&self, command: ChargerCommand) -> Result<()> {
        self.calls.lock().unwrap().push(command);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EvHubError::charger("service call rejected"));
        }
        Ok(())
    }
}

/// Session hooks that only count invocations
#[derive(Default)]
pub struct MockSession {
    pub resets: AtomicUsize,
    pub terminates: AtomicUsize,
}

impl SessionHooks for MockSession {
    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn terminate(&self) -> Result<()> {
        self.terminates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn native_states() -> ChargerNativeStateMap {
    ChargerNativeStateMap::from_lists(
        &["disconnected"],
        &["awaiting_start"],
        &["charging"],
        &["completed"],
    )
}

/// Orchestrator config without the ramp loop and with the default cooldown
pub fn charger_config() -> ChargerConfig {
    ChargerConfig {
        allow_update_current: false,
        ..ChargerConfig::default()
    }
}

pub struct Harness {
    pub sensors: Arc<SharedSensors>,
    pub schedule: Arc<HourSchedule>,
    pub adapter: Arc<RecordingAdapter>,
    pub session: Arc<MockSession>,
    pub done: Arc<DoneFlag>,
    pub bus: EventBus,
    pub events: broadcast::Receiver<HubEvent>,
    pub controller: Arc<ChargeController>,
    pub orchestrator: SessionOrchestrator,
}

impl Harness {
    pub fn new(charger_type: ChargerType, options: ChargerConfig) -> Self {
        let sensors = Arc::new(SharedSensors::new(false, GUARD_TIMEOUT));
        sensors.set_hub_initialized(true);
        sensors.update_power(1500.0);
        let schedule = Arc::new(HourSchedule::new(Vec::new(), chrono_tz::UTC));
        let adapter = Arc::new(RecordingAdapter::default());
        let session = Arc::new(MockSession::default());
        let bus = EventBus::new();
        let events = bus.subscribe();
        let done = Arc::new(DoneFlag::new(bus.clone()));

        let controller = Arc::new(ChargeController::new(
            "test",
            charger_type,
            native_states(),
            ControllerPorts {
                hub: sensors.clone(),
                charger: sensors.clone(),
                guard: sensors.clone(),
                schedule: schedule.clone(),
                thresholds: sensors.clone(),
            },
            Arc::clone(&done),
            bus.clone(),
            &ControllerConfig::default(),
        ));
        let orchestrator = SessionOrchestrator::new(
            "test",
            Arc::clone(&controller),
            OrchestratorPorts {
                hub: sensors.clone(),
                charger: sensors.clone(),
                guard: sensors.clone(),
                planner: sensors.clone(),
                adapter: adapter.clone(),
                session: session.clone(),
            },
            Arc::clone(&done),
            options,
        );

        Self {
            sensors,
            schedule,
            adapter,
            session,
            done,
            bus,
            events,
            controller,
            orchestrator,
        }
    }

    pub fn generic() -> Self {
        Self::new(ChargerType::Generic, charger_config())
    }

    /// Reclassify, then let the orchestrator react to the resulting status
    pub async fn step(&self) -> ChargeControllerStatus {
        self.controller.recompute_status().await;
        self.orchestrator.on_status_changed().await;
        self.controller.current_status()
    }

    /// Car plugged in, waiting, with room under the peak
    pub fn plug_in_ready(&self) {
        self.sensors.set_charger_state(Some("awaiting_start"));
        self.sensors.set_thresholds(true, false);
    }

    /// Move time forward while keeping the power sensor alive
    pub async fn advance(&self, by: Duration) {
        tokio::time::advance(by).await;
        self.sensors.update_power(1500.0);
    }

    pub fn drain_events(&mut self) -> Vec<HubEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
