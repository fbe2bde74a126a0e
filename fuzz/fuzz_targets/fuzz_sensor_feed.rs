#![no_main]
use evhub::ports::{ChargerStateSource, CurrentPlanner, PowerGuard};
use evhub::sensors::{SensorUpdate, SharedSensors};
use libfuzzer_sys::fuzz_target;
use std::time::Duration;

fuzz_target!(|data: &[u8]| {
    // One stdin line of the binary's sensor feed
    let Ok(update) = serde_json::from_slice::<SensorUpdate>(data) else {
        return;
    };

    let sensors = SharedSensors::new(false, Duration::from_secs(300));
    sensors.apply(update);
    let _ = sensors.switch_on();
    let _ = sensors.car_power_watts();
    let _ = sensors.allow_adjustment(sensors.desired_amps());
    let _ = sensors.is_dead();
});
