//! Charging session tracking for EvHub
//!
//! A session spans one charge attempt from start to terminate. The
//! orchestrator only drives the lifecycle (`reset` / `terminate`); this
//! module keeps the record and an optional JSON history on disk.

use crate::config::SessionConfig;
use crate::error::{EvHubError, Result};
use crate::logging::get_logger;
use crate::ports::SessionHooks;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Charging session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargingSession {
    /// Unique session ID
    pub id: String,

    /// Start time of the session
    pub start_time: DateTime<Utc>,

    /// End time of the session (if completed)
    pub end_time: Option<DateTime<Utc>>,

    /// Session status
    pub status: SessionStatus,
}

/// Session status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Session is currently active
    Active,

    /// Session completed
    Completed,
}

#[derive(Debug, Default)]
struct TrackerState {
    current: Option<ChargingSession>,
    history: VecDeque<ChargingSession>,
}

/// Keeps the current session and a bounded history of finished ones
pub struct SessionTracker {
    state: Mutex<TrackerState>,
    max_history_size: usize,
    history_path: Option<PathBuf>,
    logger: crate::logging::StructuredLogger,
}

impl SessionTracker {
    /// Create a tracker that keeps at most `max_history_size` finished sessions
    pub fn new(max_history_size: usize) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            max_history_size,
            history_path: None,
            logger: get_logger("session"),
        }
    }

    /// Tracker sized and backed by the `session` config section
    pub fn from_config(config: &SessionConfig) -> Self {
        let tracker = Self::new(config.max_history);
        match &config.history_file {
            Some(path) => tracker.with_history_file(path),
            None => tracker,
        }
    }

    /// Also write the history as JSON to `path` on every terminate
    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = Some(path.into());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Currently open session, if any
    pub fn current(&self) -> Option<ChargingSession> {
        self.lock().current.clone()
    }

    /// Most recently finished session
    pub fn last(&self) -> Option<ChargingSession> {
        self.lock().history.back().cloned()
    }

    /// Finished sessions, oldest first
    pub fn history(&self) -> Vec<ChargingSession> {
        self.lock().history.iter().cloned().collect()
    }

    /// Session summary for status reporting
    pub fn stats(&self) -> serde_json::Value {
        let state = self.lock();
        match state.current {
            Some(ref session) => serde_json::json!({
                "session_active": true,
                "session_id": session.id,
                "session_duration_min": (Utc::now() - session.start_time).num_minutes(),
                "completed_sessions": state.history.len(),
            }),
            None => serde_json::json!({
                "session_active": false,
                "session_id": serde_json::Value::Null,
                "session_duration_min": serde_json::Value::Null,
                "completed_sessions": state.history.len(),
            }),
        }
    }

    /// Load a previously written history file
    pub fn load_history(&self) -> Result<()> {
        let Some(path) = &self.history_path else {
            return Ok(());
        };
        if !path.exists() {
            self.logger.info("No session history file found, starting empty");
            return Ok(());
        }
        let contents = std::fs::read_to_string(path)?;
        let sessions: Vec<ChargingSession> = serde_json::from_str(&contents)?;
        let mut state = self.lock();
        state.history = sessions.into_iter().collect();
        while state.history.len() > self.max_history_size {
            state.history.pop_front();
        }
        Ok(())
    }

    fn save_history(&self, history: &VecDeque<ChargingSession>) -> Result<()> {
        if let Some(path) = &self.history_path {
            let contents = serde_json::to_string_pretty(history)?;
            std::fs::write(path, contents)?;
            self.logger.debug("Saved session history to disk");
        }
        Ok(())
    }
}

impl SessionHooks for SessionTracker {
    fn reset(&self) {
        let session = ChargingSession {
            id: uuid::Uuid::new_v4().to_string(),
            start_time: Utc::now(),
            end_time: None,
            status: SessionStatus::Active,
        };
        self.logger
            .debug(&format!("Opened charging session {}", session.id));
        self.lock().current = Some(session);
    }

    fn terminate(&self) -> Result<()> {
        let history = {
            let mut state = self.lock();
            let mut session = state
                .current
                .take()
                .ok_or_else(|| EvHubError::session("No active session to terminate"))?;
            session.end_time = Some(Utc::now());
            session.status = SessionStatus::Completed;
            self.logger
                .info(&format!("Terminated charging session {}", session.id));

            state.history.push_back(session);
            while state.history.len() > self.max_history_size {
                state.history.pop_front();
            }
            state.history.clone()
        };
        self.save_history(&history)
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}
