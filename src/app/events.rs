//! Outbound notification events.
//!
//! The supervisor emits these through the
//! [`NotificationSink`](super::ports::NotificationSink) port once the
//! session lock has been released.

use core::fmt;

use serde::Serialize;

/// Event types delivered to the notification sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    IrrigationOn,
    IrrigationOff,
    SensorError,
    ThermalProtection,
    EmergencyStop,
    /// Advisory: valve open past the valve-timeout limit.
    ValveTimeout,
}

impl NotificationKind {
    /// Event type string passed to [`NotificationSink::send`](super::ports::NotificationSink::send).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IrrigationOn => "irrigation_on",
            Self::IrrigationOff => "irrigation_off",
            Self::SensorError => "sensor_error",
            Self::ThermalProtection => "thermal_protection",
            Self::EmergencyStop => "emergency_stop",
            Self::ValveTimeout => "valve_timeout",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
