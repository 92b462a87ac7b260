//! Sensor data model: the snapshot the supervisor evaluates each tick.
//!
//! Raw sampling lives behind [`SensorPort`](crate::app::ports::SensorPort);
//! this module only validates calibrated values and derives the soil
//! statistics the state machine works on.

use serde::{Deserialize, Serialize};

use crate::config::MAX_SOIL_SENSORS;
use crate::error::SensorError;

/// Plausible ambient range for the DHT-class sensors used on the device.
const AMBIENT_TEMP_RANGE_C: core::ops::RangeInclusive<f32> = -40.0..=85.0;

/// A point-in-time snapshot of every sensor in the system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    /// Ambient air temperature (°C).
    pub ambient_temperature: f32,
    /// Ambient relative humidity (%).
    pub ambient_humidity: f32,
    /// Calibrated soil moisture per probe (%).
    pub soil_humidity: [f32; MAX_SOIL_SENSORS],
}

/// Average and maximum over the wired soil probes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SoilStats {
    pub avg: f32,
    pub max: f32,
}

impl SensorSnapshot {
    /// Reject NaN and physically impossible values before any decision is
    /// made on them.
    pub fn validate(&self, soil_sensor_count: u8) -> Result<(), SensorError> {
        if !self.ambient_temperature.is_finite()
            || !AMBIENT_TEMP_RANGE_C.contains(&self.ambient_temperature)
        {
            return Err(SensorError::OutOfRange);
        }
        if !self.ambient_humidity.is_finite() || !(0.0..=100.0).contains(&self.ambient_humidity) {
            return Err(SensorError::OutOfRange);
        }
        let wired = self.wired(soil_sensor_count);
        if wired.iter().any(|v| !v.is_finite() || !(0.0..=100.0).contains(v)) {
            return Err(SensorError::OutOfRange);
        }
        Ok(())
    }

    /// Mean and max of the first `soil_sensor_count` probes.
    pub fn soil_stats(&self, soil_sensor_count: u8) -> SoilStats {
        let wired = self.wired(soil_sensor_count);
        let sum: f32 = wired.iter().sum();
        let max = wired.iter().copied().fold(f32::MIN, f32::max);
        SoilStats {
            avg: sum / wired.len() as f32,
            max,
        }
    }

    fn wired(&self, soil_sensor_count: u8) -> &[f32] {
        let n = (soil_sensor_count as usize).clamp(1, MAX_SOIL_SENSORS);
        &self.soil_humidity[..n]
    }
}

// ---------------------------------------------------------------------------
// Calibration data model
// ---------------------------------------------------------------------------

/// Two-point calibration of a capacitive soil probe.
///
/// Capacitive probes read *lower* when wet, so `wet_raw < dry_raw` is the
/// usual case, but inverted probes are accepted as long as the two points
/// differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoilCalibration {
    /// Raw reading in air / bone-dry soil (0 %).
    pub dry_raw: u16,
    /// Raw reading in saturated soil (100 %).
    pub wet_raw: u16,
}

impl Default for SoilCalibration {
    fn default() -> Self {
        // 12-bit ADC, typical capacitive v1.2 probe.
        Self {
            dry_raw: 3000,
            wet_raw: 1200,
        }
    }
}

impl SoilCalibration {
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.dry_raw == self.wet_raw {
            return Err(SensorError::OutOfRange);
        }
        Ok(())
    }

    /// Map a raw reading onto 0–100 %, clamped at both ends.
    pub fn percent(&self, raw: u16) -> f32 {
        let dry = f32::from(self.dry_raw);
        let wet = f32::from(self.wet_raw);
        let pct = (dry - f32::from(raw)) / (dry - wet) * 100.0;
        pct.clamp(0.0, 100.0)
    }
}
