#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = serde_yaml::from_str::<evhub::Config>(text) {
        // Validation must reject bad values without panicking
        let _ = config.validate();
        for token in config.native_states.idle.iter().chain(&config.native_states.done) {
            let _ = config.native_states.classify(token);
        }
    }
});
