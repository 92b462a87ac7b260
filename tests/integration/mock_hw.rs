//! Mock adapters for integration tests.
//!
//! Scripted sensors and a recording notification sink, both cheap `Clone`
//! handles so a test keeps control after the supervisor or worker takes
//! ownership.  Valve pins, uplink and clock come from the crate's own
//! simulation adapters.

use std::sync::Arc;

use irrigation::adapters::sim::{SimLink, SimValvePin};
use irrigation::adapters::time::SimClock;
use irrigation::app::ports::{NotificationSink, SensorPort};
use irrigation::app::supervisor::IrrigationSupervisor;
use irrigation::config::IrrigationConfig;
use irrigation::drivers::valve::ValveActuator;
use irrigation::error::{NotifyError, SensorError};
use irrigation::sensors::SensorSnapshot;
use parking_lot::Mutex;

// ── Scripted sensors ──────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Script {
    snapshot: SensorSnapshot,
    failing: bool,
}

#[derive(Debug, Clone)]
pub struct ScriptedSensors {
    script: Arc<Mutex<Script>>,
}

#[allow(dead_code)]
impl ScriptedSensors {
    pub fn new(soil: f32, temperature: f32) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                snapshot: SensorSnapshot {
                    ambient_temperature: temperature,
                    ambient_humidity: 50.0,
                    soil_humidity: [soil; 3],
                },
                failing: false,
            })),
        }
    }

    pub fn set_soil(&self, pct: f32) {
        self.script.lock().snapshot.soil_humidity = [pct; 3];
    }

    pub fn set_probes(&self, probes: [f32; 3]) {
        self.script.lock().snapshot.soil_humidity = probes;
    }

    pub fn set_temperature(&self, celsius: f32) {
        self.script.lock().snapshot.ambient_temperature = celsius;
    }

    pub fn fail(&self, failing: bool) {
        self.script.lock().failing = failing;
    }
}

impl SensorPort for ScriptedSensors {
    fn read_all(&mut self) -> Result<SensorSnapshot, SensorError> {
        let script = *self.script.lock();
        if script.failing {
            Err(SensorError::ReadFailed)
        } else {
            Ok(script.snapshot)
        }
    }
}

// ── Recording sink ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub event_type: String,
    pub soil_avg: f32,
    pub humidity: f32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<Sent>>>,
    reject: Arc<Mutex<bool>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event types in delivery order.
    pub fn events(&self) -> Vec<String> {
        self.sent.lock().iter().map(|s| s.event_type.clone()).collect()
    }

    pub fn last(&self) -> Option<Sent> {
        self.sent.lock().last().cloned()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|s| s.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    /// Refuse every delivery (attempts are still recorded).
    pub fn reject_all(&self, reject: bool) {
        *self.reject.lock() = reject;
    }
}

impl NotificationSink for RecordingSink {
    fn send(
        &self,
        event_type: &str,
        soil_avg: f32,
        humidity: f32,
        temperature: f32,
    ) -> Result<(), NotifyError> {
        self.sent.lock().push(Sent {
            event_type: event_type.to_owned(),
            soil_avg,
            humidity,
            temperature,
        });
        if *self.reject.lock() {
            Err(NotifyError::Disconnected)
        } else {
            Ok(())
        }
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub type Supervisor = IrrigationSupervisor<SimValvePin, RecordingSink, SimClock>;

pub struct Rig {
    pub sup: Arc<Supervisor>,
    pub sensors: ScriptedSensors,
    pub link: SimLink,
    pub sink: RecordingSink,
    pub clock: SimClock,
    pub pins: Vec<SimValvePin>,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: IrrigationConfig) -> Self {
        let pins: Vec<SimValvePin> = (0..config.valve_count).map(|_| SimValvePin::new()).collect();
        let valves = ValveActuator::new(pins.clone(), config.valve_active_low).unwrap();
        let sink = RecordingSink::new();
        let clock = SimClock::new();
        let sup = IrrigationSupervisor::new(config, valves, sink.clone(), clock.clone()).unwrap();
        Self {
            sup: Arc::new(sup),
            sensors: ScriptedSensors::new(45.0, 22.0),
            link: SimLink::new(true),
            sink,
            clock,
            pins,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(IrrigationConfig::default())
    }

    /// One evaluation tick with the scripted inputs.
    pub fn tick(&mut self) -> irrigation::app::supervisor::TickOutcome {
        self.sup.evaluate_and_act(&mut self.sensors, &self.link)
    }

    pub fn advance_secs(&self, secs: u64) {
        self.clock.advance(std::time::Duration::from_secs(secs));
    }

    pub fn advance_mins(&self, mins: u64) {
        self.advance_secs(mins * 60);
    }

    /// Level of the primary valve's relay output.
    pub fn valve_open(&self) -> bool {
        self.pins[0].is_high()
    }
}
