use anyhow::Result;
use evhub::error::Result as HubResult;
use evhub::ports::{ChargerAdapter, ChargerCommand};
use evhub::schedule::HourSchedule;
use evhub::sensors::{SensorUpdate, SharedSensors};
use evhub::session::SessionTracker;
use evhub::{Config, Hub, HubEvent, HubPorts};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Adapter for running without charger hardware: commands are only logged
struct LoggingChargerAdapter;

#[async_trait::async_trait]
impl ChargerAdapter for LoggingChargerAdapter {
    async fn call(&self, command: ChargerCommand) -> HubResult<()> {
        match command {
            ChargerCommand::UpdateCurrent { amps } => {
                info!(command = command.name(), amps, "Charger command");
            }
            _ => info!(command = command.name(), "Charger command"),
        }
        Ok(())
    }
}

fn load_config() -> Result<Config> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)?,
        None => Config::load()?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    evhub::logging::init_logging(&config.logging)?;

    info!(
        version = env!("APP_VERSION"),
        hub = %config.hub.name,
        "EvHub starting up"
    );

    let sensors = Arc::new(SharedSensors::new(
        config.hub.lite,
        Duration::from_secs(config.power_guard.timeout_secs),
    ));
    let schedule = Arc::new(HourSchedule::from_config(&config.hub)?);
    let sessions = Arc::new(SessionTracker::from_config(&config.session));
    if let Err(e) = sessions.load_history() {
        warn!("Failed to load session history: {}", e);
    }

    let hub = Arc::new(Hub::new(
        &config,
        HubPorts::from_sensors(
            Arc::clone(&sensors),
            schedule,
            Arc::new(LoggingChargerAdapter),
            sessions,
        ),
    ));

    let shutdown = CancellationToken::new();
    let status_task = {
        let controller = Arc::clone(hub.controller());
        let mut status = controller.subscribe_status();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let current = *status.borrow_and_update();
                        info!(hub = controller.name(), status = %current, "Controller status");
                    }
                }
            }
        })
    };
    let hub_task = {
        let hub = Arc::clone(&hub);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { hub.run(shutdown).await })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => feed_line(&hub, &sensors, &line),
                Ok(None) => {
                    info!("Sensor feed closed");
                    break;
                }
                Err(e) => {
                    error!("Failed to read sensor feed: {}", e);
                    break;
                }
            },
        }
    }

    shutdown.cancel();
    if let Err(e) = status_task.await {
        warn!("Status logger task failed: {}", e);
    }
    match hub_task.await {
        Ok(Ok(())) => {
            info!("Hub shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("Hub failed with error: {}", e);
            Err(anyhow::anyhow!("Hub error: {}", e))
        }
        Err(e) => Err(anyhow::anyhow!("Hub task failed: {}", e)),
    }
}

/// Apply one JSON sensor update and notify the hub
fn feed_line(hub: &Hub, sensors: &SharedSensors, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let update: SensorUpdate = match serde_json::from_str(line) {
        Ok(update) => update,
        Err(e) => {
            warn!("Ignoring malformed sensor update: {}", e);
            return;
        }
    };

    if let Some(raw) = update.charger_state.as_deref() {
        let bucket = hub.controller().native_states().classify(raw);
        debug!(state = raw, bucket = ?bucket, "Charger state update");
    }

    let initialized = update.hub_initialized == Some(true);
    let enabled_changed = update.enabled.is_some();
    sensors.apply(update);

    if initialized {
        hub.publish(HubEvent::HubInitialized);
    }
    if enabled_changed {
        hub.publish(HubEvent::ChargerEnabledChanged);
    } else {
        hub.publish(HubEvent::TimerActivated);
    }
}
