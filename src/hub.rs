//! Hub wiring
//!
//! A `Hub` owns the event bus, the done flag, the controller and the
//! orchestrator of one charger. `run` drives the periodic tick, watches the
//! power guard for the alive to dead edge and dispatches bus events to each
//! component on its own task.

use crate::config::Config;
use crate::controller::{ChargeController, ControllerPorts};
use crate::error::{EvHubError, Result};
use crate::events::{DoneFlag, EventBus, HubEvent};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::orchestrator::{OrchestratorPorts, SessionOrchestrator};
use crate::ports::{
    ChargerAdapter, ChargerStateSource, CurrentPlanner, HubContext, PowerGuard, ScheduleOracle,
    SessionHooks, ThresholdOracle,
};
use crate::schedule::HourSchedule;
use crate::sensors::SharedSensors;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Every collaborator a hub needs
#[derive(Clone)]
pub struct HubPorts {
    pub hub: Arc<dyn HubContext>,
    pub charger: Arc<dyn ChargerStateSource>,
    pub guard: Arc<dyn PowerGuard>,
    pub schedule: Arc<dyn ScheduleOracle>,
    pub thresholds: Arc<dyn ThresholdOracle>,
    pub planner: Arc<dyn CurrentPlanner>,
    pub adapter: Arc<dyn ChargerAdapter>,
    pub session: Arc<dyn SessionHooks>,
}

impl HubPorts {
    /// Back every read-only port with one sensor store
    pub fn from_sensors(
        sensors: Arc<SharedSensors>,
        schedule: Arc<HourSchedule>,
        adapter: Arc<dyn ChargerAdapter>,
        session: Arc<dyn SessionHooks>,
    ) -> Self {
        Self {
            hub: sensors.clone(),
            charger: sensors.clone(),
            guard: sensors.clone(),
            schedule,
            thresholds: sensors.clone(),
            planner: sensors,
            adapter,
            session,
        }
    }
}

struct Subscriptions {
    controller: broadcast::Receiver<HubEvent>,
    orchestrator: broadcast::Receiver<HubEvent>,
}

/// One energy hub controlling one charger
pub struct Hub {
    name: String,
    bus: EventBus,
    done: Arc<DoneFlag>,
    controller: Arc<ChargeController>,
    orchestrator: Arc<SessionOrchestrator>,
    guard: Arc<dyn PowerGuard>,
    tick_interval: Duration,
    subscriptions: Mutex<Option<Subscriptions>>,
    logger: StructuredLogger,
}

impl Hub {
    /// Build the hub from configuration; receivers are subscribed here so
    /// that no event published before `run` is lost.
    pub fn new(config: &Config, ports: HubPorts) -> Self {
        let name = config.hub.name.clone();
        let bus = EventBus::new();
        let done = Arc::new(DoneFlag::new(bus.clone()));

        let controller = Arc::new(ChargeController::new(
            &name,
            config.hub.charger_type,
            config.native_states.clone(),
            ControllerPorts {
                hub: Arc::clone(&ports.hub),
                charger: Arc::clone(&ports.charger),
                guard: Arc::clone(&ports.guard),
                schedule: Arc::clone(&ports.schedule),
                thresholds: Arc::clone(&ports.thresholds),
            },
            Arc::clone(&done),
            bus.clone(),
            &config.controller,
        ));

        let orchestrator = Arc::new(SessionOrchestrator::new(
            &name,
            Arc::clone(&controller),
            OrchestratorPorts {
                hub: ports.hub,
                charger: ports.charger,
                guard: Arc::clone(&ports.guard),
                planner: ports.planner,
                adapter: ports.adapter,
                session: ports.session,
            },
            Arc::clone(&done),
            config.charger.clone(),
        ));

        let subscriptions = Subscriptions {
            controller: bus.subscribe(),
            orchestrator: bus.subscribe(),
        };
        let logger = get_logger_with_context(LogContext::new("hub").with_hub(&name));

        Self {
            name,
            bus,
            done,
            controller,
            orchestrator,
            guard: ports.guard,
            tick_interval: Duration::from_millis(config.hub.tick_interval_ms),
            subscriptions: Mutex::new(Some(subscriptions)),
            logger,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn controller(&self) -> &Arc<ChargeController> {
        &self.controller
    }

    pub fn orchestrator(&self) -> &Arc<SessionOrchestrator> {
        &self.orchestrator
    }

    /// Cached "charger done" flag
    pub fn charger_done(&self) -> bool {
        self.done.get()
    }

    /// Publish an event on the hub bus
    pub fn publish(&self, event: HubEvent) -> usize {
        self.logger.trace(&format!("Publishing '{}'", event.name()));
        self.bus.publish(event)
    }

    /// Run until `shutdown` is cancelled. May only be called once.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let Some(subscriptions) = self.subscriptions.lock().await.take() else {
            return Err(EvHubError::generic("hub is already running"));
        };
        self.logger.info("Starting hub main loop");

        let dispatch = shutdown.child_token();
        let controller = Arc::clone(&self.controller);
        let controller_task = spawn_dispatch(
            "controller",
            subscriptions.controller,
            dispatch.clone(),
            self.logger.clone(),
            move |event| {
                let controller = Arc::clone(&controller);
                async move { controller.handle_event(event).await }
            },
        );
        let orchestrator = Arc::clone(&self.orchestrator);
        let orchestrator_task = spawn_dispatch(
            "orchestrator",
            subscriptions.orchestrator,
            dispatch.clone(),
            self.logger.clone(),
            move |event| {
                let orchestrator = Arc::clone(&orchestrator);
                async move { orchestrator.handle_event(event).await }
            },
        );

        let mut tick = interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut guard_was_dead = false;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
                _ = tick.tick() => {
                    let guard_dead = self.guard.is_dead();
                    if guard_dead && !guard_was_dead {
                        self.logger.warn("Power sensor went stale, pausing charger");
                        self.bus.publish(HubEvent::PowerCanaryDead);
                    } else if !guard_dead && guard_was_dead {
                        self.logger.info("Power sensor is alive again");
                    }
                    guard_was_dead = guard_dead;
                    self.bus.publish(HubEvent::TimerActivated);
                }
            }
        }

        dispatch.cancel();
        for (component, task) in [
            ("controller", controller_task),
            ("orchestrator", orchestrator_task),
        ] {
            if let Err(e) = task.await {
                self.logger
                    .error(&format!("{} dispatch task failed: {}", component, e));
            }
        }
        self.orchestrator.shutdown().await;
        self.logger.info("Hub stopped");
        Ok(())
    }
}

fn spawn_dispatch<F, Fut>(
    component: &'static str,
    mut rx: broadcast::Receiver<HubEvent>,
    token: CancellationToken,
    logger: StructuredLogger,
    handler: F,
) -> JoinHandle<()>
where
    F: Fn(HubEvent) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(event) => handler(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        logger.warn(&format!("{} skipped {} events", component, skipped));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}
