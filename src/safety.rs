//! Safety watchdog.
//!
//! The watchdog is evaluated **every tick before the state machine** and
//! produces a fresh alert bitmask.  It owns nothing but three baseline
//! timestamps; [`SafetyWatchdog::check`] is a pure function of its inputs.
//!
//! ## Alert lifecycle
//!
//! 1. The supervisor stamps a baseline when a session starts, a valve opens
//!    or an operator command arrives (`reset_*`).
//! 2. Each tick it builds [`WatchdogInputs`] from those baselines and the
//!    latest readings, and calls `check`.
//! 3. The state handlers read the resulting [`WatchdogAlerts`] and decide
//!    which stop, if any, to take.
//!
//! Alerts are not latched: a condition that clears simply stops being
//! reported on the next check.

use core::fmt;

use serde::Serialize;

use crate::config::IrrigationConfig;

/// One watchdog condition.  Discriminants are the bit positions in
/// [`WatchdogAlerts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyAlert {
    /// Session running longer than the hard backstop.
    SessionTimeout = 0b0000_0001,
    /// Valve open longer than the advisory limit.
    ValveTimeout = 0b0000_0010,
    /// Operator override idle; control returns to autonomous mode.
    MqttOverrideTimeout = 0b0000_0100,
    /// Ambient temperature at or above thermal stop.
    TemperatureCritical = 0b0000_1000,
    /// A soil probe at or above the over-moisture threshold.
    Overmoisture = 0b0001_0000,
    /// Rain sensor tripped (reserved, no sensor fitted yet).
    RainDetected = 0b0010_0000,
}

impl SafetyAlert {
    pub const ALL: [Self; 6] = [
        Self::SessionTimeout,
        Self::ValveTimeout,
        Self::MqttOverrideTimeout,
        Self::TemperatureCritical,
        Self::Overmoisture,
        Self::RainDetected,
    ];

    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionTimeout => write!(f, "session timeout"),
            Self::ValveTimeout => write!(f, "valve timeout"),
            Self::MqttOverrideTimeout => write!(f, "override timeout"),
            Self::TemperatureCritical => write!(f, "temperature critical"),
            Self::Overmoisture => write!(f, "over-moisture"),
            Self::RainDetected => write!(f, "rain detected"),
        }
    }
}

/// Output of [`SafetyWatchdog::check`]: six independent flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WatchdogAlerts(u8);

impl WatchdogAlerts {
    pub const NONE: Self = Self(0);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b0011_1111)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn has(self, alert: SafetyAlert) -> bool {
        self.0 & alert.mask() != 0
    }

    pub fn any(self) -> bool {
        self.0 != 0
    }

    /// Flags set here but not in `previous`.
    pub fn raised_since(self, previous: Self) -> Self {
        Self(self.0 & !previous.0)
    }

    /// Individual alerts currently set.
    pub fn iter(self) -> impl Iterator<Item = SafetyAlert> {
        SafetyAlert::ALL.into_iter().filter(move |a| self.has(*a))
    }

    pub fn session_timeout(self) -> bool {
        self.has(SafetyAlert::SessionTimeout)
    }

    pub fn valve_timeout(self) -> bool {
        self.has(SafetyAlert::ValveTimeout)
    }

    pub fn mqtt_override_timeout(self) -> bool {
        self.has(SafetyAlert::MqttOverrideTimeout)
    }

    pub fn temperature_critical(self) -> bool {
        self.has(SafetyAlert::TemperatureCritical)
    }

    pub fn overmoisture(self) -> bool {
        self.has(SafetyAlert::Overmoisture)
    }

    pub fn rain_detected(self) -> bool {
        self.has(SafetyAlert::RainDetected)
    }

    fn set(&mut self, alert: SafetyAlert, condition: bool) {
        if condition {
            self.0 |= alert.mask();
        }
    }
}

/// Value type built fresh for every check.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WatchdogInputs {
    pub session_secs: u32,
    pub valve_open_secs: u32,
    pub mqtt_idle_secs: u32,
    pub temperature_c: f32,
    pub soil_avg: f32,
    /// Highest single soil probe.  Over-moisture is judged per probe.
    pub soil_max: f32,
    /// Reserved for a rain gauge input.
    pub rain: bool,
}

/// Thresholds the watchdog compares against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchdogLimits {
    pub session_timeout_secs: u32,
    pub valve_timeout_secs: u32,
    pub mqtt_override_timeout_secs: u32,
    pub temperature_critical_c: f32,
    pub overmoisture_pct: f32,
}

impl Default for WatchdogLimits {
    fn default() -> Self {
        Self {
            session_timeout_secs: 120 * 60,
            valve_timeout_secs: 40 * 60,
            mqtt_override_timeout_secs: 30 * 60,
            temperature_critical_c: 40.0,
            overmoisture_pct: 80.0,
        }
    }
}

impl From<&IrrigationConfig> for WatchdogLimits {
    fn from(c: &IrrigationConfig) -> Self {
        Self {
            session_timeout_secs: u32::from(c.session_timeout_minutes) * 60,
            valve_timeout_secs: u32::from(c.valve_timeout_minutes) * 60,
            mqtt_override_timeout_secs: u32::from(c.mqtt_override_timeout_minutes) * 60,
            temperature_critical_c: c.temp_thermal_stop_c,
            overmoisture_pct: c.soil_max_pct,
        }
    }
}

/// Safety watchdog.
#[derive(Debug, Clone)]
pub struct SafetyWatchdog {
    limits: WatchdogLimits,
    session_start_ms: Option<u64>,
    valve_open_ms: Option<u64>,
    mqtt_command_ms: Option<u64>,
}

impl SafetyWatchdog {
    pub fn new(limits: WatchdogLimits) -> Self {
        Self {
            limits,
            session_start_ms: None,
            valve_open_ms: None,
            mqtt_command_ms: None,
        }
    }

    pub fn limits(&self) -> &WatchdogLimits {
        &self.limits
    }

    /// Stamp the session baseline.  Call once per session start.
    pub fn reset_session(&mut self, now_ms: u64) {
        self.session_start_ms = Some(now_ms);
    }

    /// Stamp the valve-open baseline.  Call once per valve open.
    pub fn reset_valve_timer(&mut self, now_ms: u64) {
        self.valve_open_ms = Some(now_ms);
    }

    /// Stamp the operator-override baseline.  Call once per remote command.
    pub fn reset_mqtt_timer(&mut self, now_ms: u64) {
        self.mqtt_command_ms = Some(now_ms);
    }

    /// Forget the session and valve baselines once the valve is closed.
    pub fn clear_session(&mut self) {
        self.session_start_ms = None;
        self.valve_open_ms = None;
    }

    /// Forget the override baseline once control is autonomous again.
    pub fn clear_mqtt_timer(&mut self) {
        self.mqtt_command_ms = None;
    }

    /// Build inputs from the stamped baselines.  An unstamped baseline
    /// contributes a zero duration.
    pub fn inputs(&self, now_ms: u64, temperature_c: f32, soil_avg: f32, soil_max: f32) -> WatchdogInputs {
        let since = |base: Option<u64>| {
            base.map_or(0, |b| (now_ms.saturating_sub(b) / 1000).min(u64::from(u32::MAX)) as u32)
        };
        WatchdogInputs {
            session_secs: since(self.session_start_ms),
            valve_open_secs: since(self.valve_open_ms),
            mqtt_idle_secs: since(self.mqtt_command_ms),
            temperature_c,
            soil_avg,
            soil_max,
            rain: false,
        }
    }

    /// Evaluate every limit against `inputs`.  Pure: no baseline changes.
    pub fn check(&self, inputs: &WatchdogInputs) -> WatchdogAlerts {
        let l = &self.limits;
        let mut alerts = WatchdogAlerts::NONE;

        alerts.set(SafetyAlert::SessionTimeout, inputs.session_secs >= l.session_timeout_secs);
        alerts.set(SafetyAlert::ValveTimeout, inputs.valve_open_secs >= l.valve_timeout_secs);
        alerts.set(
            SafetyAlert::MqttOverrideTimeout,
            self.mqtt_command_ms.is_some() && inputs.mqtt_idle_secs >= l.mqtt_override_timeout_secs,
        );
        alerts.set(
            SafetyAlert::TemperatureCritical,
            inputs.temperature_c >= l.temperature_critical_c,
        );
        alerts.set(
            SafetyAlert::Overmoisture,
            inputs.soil_max.max(inputs.soil_avg) >= l.overmoisture_pct,
        );
        alerts.set(SafetyAlert::RainDetected, inputs.rain);
        alerts
    }
}

impl Default for SafetyWatchdog {
    fn default() -> Self {
        Self::new(WatchdogLimits::default())
    }
}
