use super::*;

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            name: "evhub".to_string(),
            charger_type: ChargerType::Generic,
            lite: false,
            non_hours: Vec::new(),
            timezone: "UTC".to_string(),
            tick_interval_ms: 1000,
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            done_timeout_secs: 180,
            debug_log_cooldown_secs: 60,
        }
    }
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            call_cooldown_secs: 60,
            loop_cycle_secs: 60,
            turn_on_timeout_secs: 300,
            turn_on_poll_secs: 5,
            allow_update_current: true,
            update_current_on_termination: false,
            termination_amps: 6,
            powerswitch_controls_charging: false,
        }
    }
}

impl Default for PowerGuardConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_file: None,
            max_history: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/evhub.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}
