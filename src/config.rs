//! Irrigation configuration parameters.
//!
//! All tunable parameters for the decision core.  Loaded once at start-up
//! through a [`ConfigPort`](crate::app::ports::ConfigPort); the core never
//! hot-reloads them.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Highest number of valve outputs the state bitmask can represent.
pub const MAX_VALVES: usize = 8;

/// Number of soil probes carried by a [`SensorSnapshot`](crate::sensors::SensorSnapshot).
pub const MAX_SOIL_SENSORS: usize = 3;

/// Core irrigation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrigationConfig {
    // --- Soil thresholds (%) ---
    /// Soil average at or below which irrigation starts.
    pub soil_critical_pct: f32,
    /// Soil average at or above which a session has reached its target.
    pub soil_optimal_pct: f32,
    /// Any single probe at or above this forces an immediate stop.
    pub soil_max_pct: f32,
    /// How many of the three soil channels are wired (1–3).
    pub soil_sensor_count: u8,

    // --- Thermal thresholds (°C) ---
    /// Thermal protection is released once ambient drops below this.
    pub temp_warning_c: f32,
    /// Ambient temperature that stops irrigation.
    pub temp_thermal_stop_c: f32,

    // --- Session limits (minutes) ---
    /// Upper bound for any single session.
    pub max_session_minutes: u16,
    /// Session length used when a start command does not specify one.
    pub default_session_minutes: u16,
    /// Minimum pause between the end of one session and the next start.
    pub min_interval_minutes: u16,
    /// Total irrigation allowed per calendar day.
    pub max_daily_minutes: u16,

    // --- Watchdog (minutes) ---
    /// Hard backstop on session length.
    pub session_timeout_minutes: u16,
    /// Advisory: valve open this long raises a notification.
    pub valve_timeout_minutes: u16,
    /// Operator override lapses after this long without a command.
    pub mqtt_override_timeout_minutes: u16,

    // --- Valves ---
    /// Number of wired valve outputs.
    pub valve_count: u8,
    /// Valve opened by automatic and commanded sessions.
    pub primary_valve: u8,
    /// Relay board switches on a LOW level.
    pub valve_active_low: bool,

    // --- Offline operation ---
    /// Allow autonomous starts while disconnected.
    pub offline_mode_enabled: bool,

    // --- Cadence ---
    /// Evaluation period while connected (seconds).
    pub online_interval_secs: u32,
    /// Consecutive offline ticks that still run at the online period.
    pub offline_stabilization_ticks: u32,
    /// Poll granularity of the offline sleep (seconds).
    pub offline_poll_secs: u32,
}

impl Default for IrrigationConfig {
    fn default() -> Self {
        Self {
            // Soil
            soil_critical_pct: 35.0,
            soil_optimal_pct: 60.0,
            soil_max_pct: 80.0,
            soil_sensor_count: 3,

            // Thermal
            temp_warning_c: 32.0,
            temp_thermal_stop_c: 40.0,

            // Sessions
            max_session_minutes: 15,
            default_session_minutes: 15,
            min_interval_minutes: 30,
            max_daily_minutes: 120,

            // Watchdog
            session_timeout_minutes: 120,
            valve_timeout_minutes: 40,
            mqtt_override_timeout_minutes: 30,

            // Valves
            valve_count: 1,
            primary_valve: 0,
            valve_active_low: false,

            offline_mode_enabled: true,

            // Cadence
            online_interval_secs: 60,
            offline_stabilization_ticks: 10,
            offline_poll_secs: 10,
        }
    }
}

impl IrrigationConfig {
    /// Range-check every field and the threshold ordering.
    ///
    /// Invalid values are rejected, never clamped: a misconfigured
    /// `soil_max_pct` or `temp_thermal_stop_c` would silently disable a
    /// safety stop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let soil = [self.soil_critical_pct, self.soil_optimal_pct, self.soil_max_pct];
        if soil.iter().any(|v| !v.is_finite() || !(0.0..=100.0).contains(v)) {
            return Err(ConfigError::ValidationFailed(
                "soil thresholds must be finite and within 0–100 %",
            ));
        }
        if !(self.soil_critical_pct < self.soil_optimal_pct
            && self.soil_optimal_pct < self.soil_max_pct)
        {
            return Err(ConfigError::ValidationFailed(
                "soil thresholds must satisfy critical < optimal < max",
            ));
        }
        if !(1..=MAX_SOIL_SENSORS as u8).contains(&self.soil_sensor_count) {
            return Err(ConfigError::ValidationFailed("soil_sensor_count must be 1–3"));
        }
        if !self.temp_warning_c.is_finite() || !self.temp_thermal_stop_c.is_finite() {
            return Err(ConfigError::ValidationFailed("thermal thresholds must be finite"));
        }
        if self.temp_warning_c >= self.temp_thermal_stop_c {
            return Err(ConfigError::ValidationFailed(
                "temp_warning_c must be < temp_thermal_stop_c",
            ));
        }
        if self.max_session_minutes == 0 {
            return Err(ConfigError::ValidationFailed("max_session_minutes must be > 0"));
        }
        if self.default_session_minutes == 0 {
            return Err(ConfigError::ValidationFailed(
                "default_session_minutes must be > 0",
            ));
        }
        if self.max_daily_minutes < self.max_session_minutes {
            return Err(ConfigError::ValidationFailed(
                "max_daily_minutes must be >= max_session_minutes",
            ));
        }
        if self.session_timeout_minutes == 0
            || self.valve_timeout_minutes == 0
            || self.mqtt_override_timeout_minutes == 0
        {
            return Err(ConfigError::ValidationFailed("watchdog timeouts must be > 0"));
        }
        if self.valve_count == 0 || self.valve_count as usize > MAX_VALVES {
            return Err(ConfigError::ValidationFailed("valve_count must be 1–8"));
        }
        if self.primary_valve >= self.valve_count {
            return Err(ConfigError::ValidationFailed(
                "primary_valve must be < valve_count",
            ));
        }
        if self.online_interval_secs == 0 || self.offline_poll_secs == 0 {
            return Err(ConfigError::ValidationFailed("cadence periods must be > 0"));
        }
        Ok(())
    }

    /// Session length in seconds for a requested duration.  `0` means
    /// "unspecified" and maps to the default; the result never exceeds
    /// `max_session_minutes`.
    pub fn clamp_session_secs(&self, requested_minutes: u16) -> u32 {
        let minutes = if requested_minutes == 0 {
            self.default_session_minutes
        } else {
            requested_minutes
        };
        u32::from(minutes.min(self.max_session_minutes)) * 60
    }

    pub fn max_daily_secs(&self) -> u32 {
        u32::from(self.max_daily_minutes) * 60
    }

    pub fn min_interval_secs(&self) -> u32 {
        u32::from(self.min_interval_minutes) * 60
    }
}
