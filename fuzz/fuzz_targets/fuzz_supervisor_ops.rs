//! Fuzz target: supervisor command/tick interleavings
//!
//! Decodes the input as a byte-coded operation stream and verifies after
//! every step:
//! - The valve is open exactly while the state is ACTIVE
//! - The safety lock is set exactly while in EMERGENCY_STOP
//!
//! cargo fuzz run fuzz_supervisor_ops

#![no_main]

use std::time::Duration;

use irrigation::adapters::log_sink::LogNotificationSink;
use irrigation::adapters::sim::{SimLink, SimValvePin};
use irrigation::adapters::time::SimClock;
use irrigation::app::commands::IrrigationCommand;
use irrigation::app::ports::SensorPort;
use irrigation::app::supervisor::IrrigationSupervisor;
use irrigation::config::IrrigationConfig;
use irrigation::drivers::valve::ValveActuator;
use irrigation::error::SensorError;
use irrigation::fsm::IrrigationState;
use irrigation::sensors::SensorSnapshot;
use libfuzzer_sys::fuzz_target;

struct Script(Result<SensorSnapshot, SensorError>);

impl SensorPort for Script {
    fn read_all(&mut self) -> Result<SensorSnapshot, SensorError> {
        self.0
    }
}

fuzz_target!(|data: &[u8]| {
    let pin = SimValvePin::new();
    let valves = ValveActuator::new([pin.clone()], false).unwrap();
    let clock = SimClock::new();
    let sup = IrrigationSupervisor::new(
        IrrigationConfig::default(),
        valves,
        LogNotificationSink::new(),
        clock.clone(),
    )
    .unwrap();
    let link = SimLink::new(true);

    for pair in data.chunks_exact(2) {
        let (op, arg) = (pair[0], pair[1]);
        match op % 7 {
            0 => {
                let snapshot = SensorSnapshot {
                    ambient_temperature: f32::from(arg % 60),
                    ambient_humidity: 50.0,
                    soil_humidity: [f32::from(arg % 101); 3],
                };
                let _ = sup.evaluate_and_act(&mut Script(Ok(snapshot)), &link);
            }
            1 => {
                let _ = sup.evaluate_and_act(&mut Script(Err(SensorError::ReadFailed)), &link);
            }
            2 => {
                let _ = sup.execute_command(IrrigationCommand::Start, u16::from(arg));
            }
            3 => {
                let _ = sup.execute_command(IrrigationCommand::Stop, 0);
            }
            4 => {
                let _ = sup.execute_command(IrrigationCommand::EmergencyStop, 0);
            }
            5 => {
                sup.clear_safety_lock();
            }
            _ => {
                link.set_connected(arg & 1 == 0);
                clock.advance(Duration::from_secs(u64::from(arg) * 60));
            }
        }

        let status = sup.get_status();
        let active = status.state == IrrigationState::Active;
        assert_eq!(pin.is_high(), active);
        assert_eq!(status.safety_lock, status.state == IrrigationState::EmergencyStop);
    }
});
