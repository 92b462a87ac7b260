//! Fuzz target: TOML configuration
//!
//! Feeds arbitrary text to the config parser and verifies:
//! - No panics while parsing or validating
//! - Anything that validates can drive a supervisor tick
//!
//! cargo fuzz run fuzz_config_toml

#![no_main]

use irrigation::adapters::log_sink::LogNotificationSink;
use irrigation::adapters::sim::{SimLink, SimValvePin};
use irrigation::adapters::time::SimClock;
use irrigation::app::ports::SensorPort;
use irrigation::app::supervisor::IrrigationSupervisor;
use irrigation::config::IrrigationConfig;
use irrigation::drivers::valve::ValveActuator;
use irrigation::error::SensorError;
use irrigation::sensors::SensorSnapshot;
use libfuzzer_sys::fuzz_target;

struct Dry;

impl SensorPort for Dry {
    fn read_all(&mut self) -> Result<SensorSnapshot, SensorError> {
        Ok(SensorSnapshot {
            ambient_temperature: 25.0,
            ambient_humidity: 50.0,
            soil_humidity: [10.0; 3],
        })
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = toml::from_str::<IrrigationConfig>(text) else {
        return;
    };
    if config.validate().is_err() {
        return;
    }

    let pins = (0..config.valve_count).map(|_| SimValvePin::new());
    let valves = ValveActuator::new(pins, config.valve_active_low).unwrap();
    let sup = IrrigationSupervisor::new(config, valves, LogNotificationSink::new(), SimClock::new())
        .expect("validated config must build a supervisor");
    let out = sup.evaluate_and_act(&mut Dry, &SimLink::new(true));
    assert!(out.next_interval.as_secs() > 0);
});
