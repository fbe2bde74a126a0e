mod common;

use common::{Harness, charger_config};
use evhub::ChargeControllerStatus as Status;
use evhub::ChargerType;
use evhub::events::HubEvent;
use evhub::ports::ChargerCommand;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn start_issues_on_exactly_once() {
    let h = Harness::generic();
    h.plug_in_ready();

    assert_eq!(h.step().await, Status::Start);
    assert_eq!(h.adapter.calls(), vec![ChargerCommand::On]);
    let params = h.orchestrator.params().await;
    assert!(params.running);
    assert!(params.session_active);

    h.advance(Duration::from_secs(120)).await;
    h.step().await;
    assert_eq!(h.adapter.calls(), vec![ChargerCommand::On]);
    assert_eq!(h.session.resets.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn commands_within_cooldown_collapse() {
    let h = Harness::generic();
    h.plug_in_ready();
    h.step().await;

    h.sensors.set_switch(true);
    h.sensors.set_car_power(3000.0);
    h.sensors.set_thresholds(false, false);
    h.advance(Duration::from_secs(10)).await;
    assert_eq!(h.step().await, Status::Stop);
    assert_eq!(h.adapter.calls(), vec![ChargerCommand::On]);
    assert!(h.orchestrator.params().await.running);

    h.advance(Duration::from_secs(55)).await;
    h.orchestrator.on_status_changed().await;
    assert_eq!(
        h.adapter.calls(),
        vec![ChargerCommand::On, ChargerCommand::Pause]
    );
    assert!(!h.orchestrator.params().await.running);
}

#[tokio::test(start_paused = true)]
async fn restart_within_session_resumes() {
    let h = Harness::generic();
    h.plug_in_ready();
    h.step().await;

    h.sensors.set_switch(true);
    h.sensors.set_car_power(3000.0);
    h.sensors.set_thresholds(false, false);
    h.advance(Duration::from_secs(61)).await;
    h.step().await;

    h.sensors.set_car_power(0.0);
    h.sensors.set_thresholds(true, false);
    h.advance(Duration::from_secs(61)).await;
    assert_eq!(h.step().await, Status::Start);

    assert_eq!(
        h.adapter.calls(),
        vec![
            ChargerCommand::On,
            ChargerCommand::Pause,
            ChargerCommand::Resume
        ]
    );
    assert!(h.orchestrator.params().await.running);
}

#[tokio::test(start_paused = true)]
async fn externally_started_charger_is_overtaken() {
    let h = Harness::generic();
    h.plug_in_ready();
    h.sensors.set_switch(true);
    h.sensors.set_car_power(3000.0);

    assert_eq!(h.step().await, Status::Start);
    assert!(h.adapter.calls().is_empty());
    let params = h.orchestrator.params().await;
    assert!(params.running);
    assert!(params.session_active);
}

#[tokio::test(start_paused = true)]
async fn done_terminates_the_session_once() {
    let mut h = Harness::generic();
    h.plug_in_ready();
    h.step().await;
    h.drain_events();

    h.advance(Duration::from_secs(61)).await;
    h.sensors.set_charger_state(Some("completed"));
    assert_eq!(h.step().await, Status::Done);

    assert_eq!(h.adapter.calls(), vec![ChargerCommand::On, ChargerCommand::Off]);
    assert_eq!(h.session.terminates.load(Ordering::SeqCst), 1);
    let params = h.orchestrator.params().await;
    assert!(!params.running);
    assert!(!params.session_active);
    assert!(h.done.get());
    let done_broadcasts = h
        .drain_events()
        .into_iter()
        .filter(|e| *e == HubEvent::ChargerDoneChanged(true))
        .count();
    assert_eq!(done_broadcasts, 2);

    h.advance(Duration::from_secs(61)).await;
    h.step().await;
    assert_eq!(h.session.terminates.load(Ordering::SeqCst), 1);
    assert_eq!(h.adapter.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn idle_with_active_charger_terminates() {
    let h = Harness::generic();
    h.plug_in_ready();
    h.step().await;

    h.advance(Duration::from_secs(61)).await;
    h.sensors.set_switch(true);
    h.sensors.set_car_power(3000.0);
    h.sensors.set_charger_state(Some("disconnected"));
    assert_eq!(h.step().await, Status::Idle);

    assert_eq!(h.adapter.calls(), vec![ChargerCommand::On, ChargerCommand::Off]);
    assert_eq!(h.session.terminates.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn charger_still_charging_after_pause_is_retried() {
    let h = Harness::generic();
    h.sensors.set_charger_state(Some("charging"));
    h.sensors.set_thresholds(true, false);
    assert_eq!(h.step().await, Status::Start);

    h.sensors.set_switch(true);
    h.sensors.set_car_power(3000.0);
    h.sensors.set_thresholds(false, true);
    h.advance(Duration::from_secs(61)).await;
    assert_eq!(h.step().await, Status::Stop);

    let params = h.orchestrator.params().await;
    assert!(params.charger_state_mismatch);
    assert!(params.running);
    assert!(params.disable_current_updates);

    h.sensors.set_charger_state(Some("awaiting_start"));
    h.sensors.set_thresholds(false, false);
    h.advance(Duration::from_secs(61)).await;
    assert_eq!(h.step().await, Status::Stop);

    assert_eq!(
        h.adapter.calls(),
        vec![
            ChargerCommand::On,
            ChargerCommand::Pause,
            ChargerCommand::Pause
        ]
    );
    let params = h.orchestrator.params().await;
    assert!(!params.charger_state_mismatch);
    assert!(!params.running);
}

#[tokio::test(start_paused = true)]
async fn disabling_the_hub_mid_session_pauses() {
    let h = Harness::new(ChargerType::Outlet, charger_config());
    h.sensors.set_switch(true);
    h.sensors.set_thresholds(true, false);
    assert_eq!(h.step().await, Status::Start);
    assert_eq!(h.adapter.calls(), vec![ChargerCommand::On]);

    h.sensors.set_car_power(3000.0);
    h.advance(Duration::from_secs(61)).await;
    h.sensors.set_enabled(false);
    assert_eq!(h.step().await, Status::Disabled);

    assert_eq!(
        h.adapter.calls(),
        vec![ChargerCommand::On, ChargerCommand::Pause]
    );
    assert!(!h.orchestrator.params().await.running);
}

#[tokio::test(start_paused = true)]
async fn failed_call_does_not_start_the_cooldown() {
    let h = Harness::generic();
    h.adapter.set_failing(true);
    h.plug_in_ready();
    h.step().await;

    let params = h.orchestrator.params().await;
    assert!(params.latest_charger_call.is_none());
    assert!(!params.running);
    assert!(!params.session_active);
    assert_eq!(h.adapter.calls(), vec![ChargerCommand::On]);
}

#[tokio::test(start_paused = true)]
async fn failed_start_is_retried_on_the_next_start() {
    let h = Harness::generic();
    h.adapter.set_failing(true);
    h.plug_in_ready();
    assert_eq!(h.step().await, Status::Start);

    h.adapter.set_failing(false);
    h.sensors.set_thresholds(false, false);
    h.advance(Duration::from_secs(120)).await;
    assert_eq!(h.step().await, Status::Stop);
    assert_eq!(h.adapter.calls(), vec![ChargerCommand::On]);

    h.sensors.set_thresholds(true, false);
    h.advance(Duration::from_secs(120)).await;
    assert_eq!(h.step().await, Status::Start);

    assert_eq!(h.adapter.calls(), vec![ChargerCommand::On, ChargerCommand::On]);
    let params = h.orchestrator.params().await;
    assert!(params.running);
    assert!(params.session_active);
    assert!(params.latest_charger_call.is_some());
}

#[tokio::test(start_paused = true)]
async fn no_charger_variant_never_commands() {
    let h = Harness::new(ChargerType::NoCharger, charger_config());
    assert_eq!(h.step().await, Status::Start);
    h.sensors.set_enabled(false);
    assert_eq!(h.step().await, Status::Disabled);
    assert!(h.adapter.calls().is_empty());
}

#[tokio::test]
async fn charger_activity_respects_powerswitch_setting() {
    let h = Harness::generic();
    h.sensors.set_switch(true);
    assert!(!h.orchestrator.charger_active());
    h.sensors.set_car_power(1200.0);
    assert!(h.orchestrator.charger_active());

    let options = evhub::config::ChargerConfig {
        powerswitch_controls_charging: true,
        ..charger_config()
    };
    let switched = Harness::new(ChargerType::Generic, options);
    switched.sensors.set_switch(true);
    assert!(switched.orchestrator.charger_active());
}
