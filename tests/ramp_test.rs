mod common;

use common::{Harness, charger_config};
use evhub::ChargeControllerStatus as Status;
use evhub::ChargerType;
use evhub::config::ChargerConfig;
use evhub::ports::ChargerCommand;
use std::time::Duration;

fn ramp_config() -> ChargerConfig {
    ChargerConfig {
        allow_update_current: true,
        ..charger_config()
    }
}

/// Start a session and switch the charger on so the ramp loop gets going
async fn started(options: ChargerConfig) -> Harness {
    let h = Harness::new(ChargerType::Generic, options);
    h.sensors.set_charger_state(Some("charging"));
    h.sensors.set_thresholds(true, false);
    h.sensors.set_desired_amps(10);
    assert_eq!(h.step().await, Status::Start);
    h.sensors.set_switch(true);
    h.sensors.set_car_power(3000.0);
    h
}

#[tokio::test(start_paused = true)]
async fn pushes_desired_current_every_cycle() {
    let h = started(ramp_config()).await;
    assert!(h.orchestrator.ramp_active().await);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(h.adapter.current_updates(), vec![10]);

    h.sensors.set_desired_amps(13);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.adapter.current_updates(), vec![10, 13]);
}

#[tokio::test(start_paused = true)]
async fn guard_rejection_keeps_current() {
    let h = started(ramp_config()).await;
    h.sensors.set_max_allowed_amps(Some(8));

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(h.adapter.current_updates().is_empty());

    h.sensors.set_desired_amps(8);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.adapter.current_updates(), vec![8]);
}

#[tokio::test(start_paused = true)]
async fn no_updates_once_disabled() {
    let h = started(ramp_config()).await;
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(h.adapter.current_updates(), vec![10]);

    // The charger keeps reporting "charging", so the session stays running
    // while current updates are disabled.
    h.sensors.set_thresholds(false, true);
    h.sensors.update_power(1500.0);
    assert_eq!(h.step().await, Status::Stop);
    assert!(h.orchestrator.params().await.disable_current_updates);

    tokio::time::sleep(Duration::from_secs(200)).await;
    assert_eq!(h.adapter.current_updates(), vec![10]);
    assert!(h.orchestrator.ramp_active().await);
}

#[tokio::test(start_paused = true)]
async fn pause_stops_the_loop_and_pushes_termination_current() {
    let options = ChargerConfig {
        update_current_on_termination: true,
        termination_amps: 6,
        ..ramp_config()
    };
    let h = started(options).await;
    tokio::time::sleep(Duration::from_secs(61)).await;

    h.sensors.set_charger_state(Some("awaiting_start"));
    h.sensors.set_thresholds(false, false);
    h.sensors.update_power(1500.0);
    assert_eq!(h.step().await, Status::Stop);
    assert!(!h.orchestrator.ramp_active().await);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.adapter.current_updates(), vec![10, 6]);
    assert!(h.adapter.calls().contains(&ChargerCommand::Pause));

    tokio::time::sleep(Duration::from_secs(180)).await;
    assert_eq!(h.adapter.current_updates(), vec![10, 6]);
}

#[tokio::test(start_paused = true)]
async fn free_charge_skips_the_ramp() {
    let h = Harness::new(ChargerType::Generic, ramp_config());
    h.sensors.set_charger_state(Some("charging"));
    h.sensors.set_free_charge(true);
    assert_eq!(h.step().await, Status::Start);
    assert!(!h.orchestrator.ramp_active().await);
}

#[tokio::test(start_paused = true)]
async fn loop_gives_up_when_charger_never_turns_on() {
    let h = Harness::new(ChargerType::Generic, ramp_config());
    h.sensors.set_charger_state(Some("charging"));
    h.sensors.set_thresholds(true, false);
    h.step().await;

    tokio::time::sleep(Duration::from_secs(301)).await;
    assert!(!h.orchestrator.ramp_active().await);
    assert!(h.adapter.current_updates().is_empty());
}
