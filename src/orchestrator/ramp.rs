use super::ChargerParams;
use crate::config::ChargerConfig;
use crate::logging::StructuredLogger;
use crate::ports::{ChargerAdapter, ChargerCommand, ChargerStateSource, CurrentPlanner, PowerGuard};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A running ramp loop and the token that stops it
pub(super) struct RampHandle {
    pub token: CancellationToken,
    pub task: JoinHandle<()>,
}

/// Periodically pushes the planned amperage while a session runs
pub(super) struct CurrentRamp {
    params: Arc<Mutex<ChargerParams>>,
    charger: Arc<dyn ChargerStateSource>,
    guard: Arc<dyn PowerGuard>,
    planner: Arc<dyn CurrentPlanner>,
    adapter: Arc<dyn ChargerAdapter>,
    loop_cycle: Duration,
    turn_on_timeout: Duration,
    turn_on_poll: Duration,
    termination_amps: Option<u8>,
    logger: StructuredLogger,
}

impl CurrentRamp {
    pub fn new(
        params: Arc<Mutex<ChargerParams>>,
        charger: Arc<dyn ChargerStateSource>,
        guard: Arc<dyn PowerGuard>,
        planner: Arc<dyn CurrentPlanner>,
        adapter: Arc<dyn ChargerAdapter>,
        options: &ChargerConfig,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            params,
            charger,
            guard,
            planner,
            adapter,
            loop_cycle: options.loop_cycle(),
            turn_on_timeout: options.turn_on_timeout(),
            turn_on_poll: options.turn_on_poll(),
            termination_amps: options
                .update_current_on_termination
                .then_some(options.termination_amps),
            logger,
        }
    }

    /// Spawn the loop on the current runtime
    pub fn spawn(self) -> RampHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.run(token.clone()));
        RampHandle { token, task }
    }

    pub async fn run(self, token: CancellationToken) {
        if !self.wait_turn_on(&token).await {
            self.logger
                .debug("Charger did not report on, current updates skipped");
            return;
        }

        while self.should_continue(&token).await {
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.loop_cycle) => {}
            }
            if !self.should_continue(&token).await {
                break;
            }

            let amps = self.planner.desired_amps();
            let updates_disabled = self.params.lock().await.disable_current_updates;
            if updates_disabled {
                continue;
            }
            if !self.guard.allow_adjustment(amps) {
                self.logger
                    .debug(&format!("Power guard rejected {} A, keeping current", amps));
                continue;
            }
            self.push_current(amps).await;
        }

        if let Some(amps) = self.termination_amps {
            self.push_current(amps).await;
        }
    }

    async fn should_continue(&self, token: &CancellationToken) -> bool {
        !token.is_cancelled() && self.charger.switch_on() && self.params.lock().await.running
    }

    async fn wait_turn_on(&self, token: &CancellationToken) -> bool {
        let deadline = Instant::now() + self.turn_on_timeout;
        loop {
            if self.charger.switch_on() {
                return true;
            }
            if token.is_cancelled() || Instant::now() >= deadline {
                return false;
            }
            tokio::select! {
                () = token.cancelled() => return false,
                () = tokio::time::sleep(self.turn_on_poll) => {}
            }
        }
    }

    async fn push_current(&self, amps: u8) {
        let command = ChargerCommand::UpdateCurrent { amps };
        self.logger
            .debug(&format!("Calling charger updatecurrent with {} A", amps));
        if let Err(e) = self.adapter.call(command).await {
            self.logger
                .warn(&format!("Current update to {} A failed: {}", amps, e));
        }
    }
}
