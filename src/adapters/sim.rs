//! Simulated hardware for host runs and tests.
//!
//! - [`SimValvePin`]: an `embedded-hal` output pin whose level can be
//!   probed and whose writes can be made to fail.
//! - [`SimSensors`]: a soil/ambient model that wets while the probed valve
//!   pin is open and dries otherwise.
//! - [`SimLink`]: a switchable uplink.
//!
//! All three are cheap `Clone` handles over shared state so a test (or the
//! simulator CLI) can keep a probe while the supervisor owns the original.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};
use log::debug;
use parking_lot::Mutex;

use crate::app::ports::{ClockPort, ConnectivityPort, SensorPort};
use crate::config::MAX_SOIL_SENSORS;
use crate::error::SensorError;
use crate::sensors::SensorSnapshot;

// ───────────────────────────────────────────────────────────────
// Valve pin
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPinError;

impl digital::Error for SimPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimValvePin {
    level: Arc<AtomicBool>,
    fail: Arc<AtomicBool>,
}

impl SimValvePin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current electrical level.
    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }

    /// Make every following write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::Release);
    }

    fn write(&self, high: bool) -> Result<(), SimPinError> {
        if self.fail.load(Ordering::Acquire) {
            return Err(SimPinError);
        }
        self.level.store(high, Ordering::Release);
        Ok(())
    }
}

impl ErrorType for SimValvePin {
    type Error = SimPinError;
}

impl OutputPin for SimValvePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

// ───────────────────────────────────────────────────────────────
// Environment model
// ───────────────────────────────────────────────────────────────

/// Soil gain per minute of open valve (percentage points).
const WETTING_PER_MIN: f32 = 2.0;
/// Soil loss per minute at 20 °C (percentage points).
const DRYING_PER_MIN: f32 = 0.05;
/// Reading noise amplitude (±).
const NOISE_PCT: f32 = 0.3;

#[derive(Debug, Clone, Copy)]
struct Environment {
    soil: [f32; MAX_SOIL_SENSORS],
    temperature: f32,
    humidity: f32,
    failing_reads: u32,
}

/// Shared handle to the simulated field.
#[derive(Debug, Clone)]
pub struct SimEnvironment {
    inner: Arc<Mutex<Environment>>,
}

impl SimEnvironment {
    pub fn new(soil_pct: f32, temperature: f32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Environment {
                soil: [soil_pct; MAX_SOIL_SENSORS],
                temperature,
                humidity: 50.0,
                failing_reads: 0,
            })),
        }
    }

    pub fn set_temperature(&self, celsius: f32) {
        self.inner.lock().temperature = celsius;
    }

    pub fn set_soil(&self, pct: f32) {
        self.inner.lock().soil = [pct; MAX_SOIL_SENSORS];
    }

    /// The next `n` reads fail with [`SensorError::ReadFailed`].
    pub fn fail_reads(&self, n: u32) {
        self.inner.lock().failing_reads = n;
    }

    pub fn soil_avg(&self) -> f32 {
        let soil = self.inner.lock().soil;
        soil.iter().sum::<f32>() / soil.len() as f32
    }
}

/// Sensor model driven by elapsed clock time and the valve level.
pub struct SimSensors<K> {
    env: SimEnvironment,
    valve: SimValvePin,
    clock: K,
    rng: fastrand::Rng,
    last_ms: Option<u64>,
}

impl<K: ClockPort> SimSensors<K> {
    /// `valve` is a probe on the pin that waters this field.
    pub fn new(env: SimEnvironment, valve: SimValvePin, clock: K, seed: u64) -> Self {
        Self {
            env,
            valve,
            clock,
            rng: fastrand::Rng::with_seed(seed),
            last_ms: None,
        }
    }

    fn advance_model(&mut self, env: &mut Environment) {
        let now = self.clock.now_ms();
        let minutes = self
            .last_ms
            .map_or(0.0, |last| now.saturating_sub(last) as f32 / 60_000.0);
        self.last_ms = Some(now);
        if minutes <= 0.0 {
            return;
        }

        let delta = if self.valve.is_high() {
            WETTING_PER_MIN * minutes
        } else {
            // Heat speeds up evaporation.
            let heat = (1.0 + (env.temperature - 20.0) / 20.0).clamp(0.5, 3.0);
            -DRYING_PER_MIN * heat * minutes
        };
        for probe in &mut env.soil {
            *probe = (*probe + delta).clamp(0.0, 100.0);
        }
    }
}

impl<K: ClockPort> SensorPort for SimSensors<K> {
    fn read_all(&mut self) -> Result<SensorSnapshot, SensorError> {
        let env_handle = self.env.clone();
        let mut env = env_handle.inner.lock();
        self.advance_model(&mut env);

        if env.failing_reads > 0 {
            env.failing_reads -= 1;
            debug!("SIM: injected read failure ({} left)", env.failing_reads);
            return Err(SensorError::ReadFailed);
        }

        let mut soil = env.soil;
        for probe in &mut soil {
            let noise = (self.rng.f32() * 2.0 - 1.0) * NOISE_PCT;
            *probe = (*probe + noise).clamp(0.0, 100.0);
        }
        Ok(SensorSnapshot {
            ambient_temperature: env.temperature,
            ambient_humidity: env.humidity,
            soil_humidity: soil,
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Uplink
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SimLink {
    connected: Arc<AtomicBool>,
}

impl SimLink {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(connected)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

impl ConnectivityPort for SimLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
