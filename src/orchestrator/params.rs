use tokio::time::Instant;

/// Bookkeeping owned by the orchestrator
#[derive(Debug, Clone, Default)]
pub struct ChargerParams {
    /// The hub believes it has the charger running
    pub running: bool,
    /// A charge session has been opened and not yet terminated
    pub session_active: bool,
    /// The ramp loop must not push current updates
    pub disable_current_updates: bool,
    /// A stop was requested but the charger still reports charging
    pub charger_state_mismatch: bool,
    /// When the last outbound command succeeded
    pub latest_charger_call: Option<Instant>,
}
