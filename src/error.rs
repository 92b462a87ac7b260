//! Unified error types for the irrigation core.
//!
//! Every variant is `Copy` so errors can be passed through the supervisor,
//! the state handlers and the valve bank without allocation.  Safety
//! violations are deliberately absent: they stop irrigation locally and
//! surface as transitions and notifications, never as caller errors.

use core::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Command rejections
// ---------------------------------------------------------------------------

/// Returned synchronously by
/// [`IrrigationSupervisor::execute_command`](crate::app::supervisor::IrrigationSupervisor::execute_command).
/// A rejected command leaves the session state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrigationError {
    /// Emergency stop latched the safety lock; an explicit unlock is required.
    SafetyLocked,
    /// The minimum pause between sessions has not elapsed yet.
    IntervalNotElapsed { remaining_secs: u32 },
    /// Today's accumulated runtime already meets the daily cap.
    DailyLimitReached,
    /// Ambient temperature is above the thermal-stop threshold.
    ThermalProtection,
    /// Sensors are failing; irrigating blind is not allowed.
    SensorFault,
    /// The valve driver refused the write.
    Actuator(ActuatorError),
}

impl fmt::Display for IrrigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SafetyLocked => write!(f, "safety lock active (emergency stop)"),
            Self::IntervalNotElapsed { remaining_secs } => {
                write!(f, "minimum session interval not elapsed ({remaining_secs}s left)")
            }
            Self::DailyLimitReached => write!(f, "daily irrigation limit reached"),
            Self::ThermalProtection => write!(f, "thermal protection active"),
            Self::SensorFault => write!(f, "sensor fault"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
        }
    }
}

impl std::error::Error for IrrigationError {}

impl From<ActuatorError> for IrrigationError {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The bus transaction or ADC conversion failed.
    ReadFailed,
    /// Reading is outside the physically plausible range (or NaN).
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "sensor read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl std::error::Error for SensorError {}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
    /// No valve is wired at this index.
    UnknownValve(u8),
    /// More valve outputs than the bitmask can represent.
    TooManyValves,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::UnknownValve(id) => write!(f, "unknown valve {id}"),
            Self::TooManyValves => write!(f, "too many valve outputs"),
        }
    }
}

impl std::error::Error for ActuatorError {}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyError {
    /// No uplink to deliver the event over.
    Disconnected,
    /// The remote side refused or dropped the event.
    Rejected,
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "uplink disconnected"),
            Self::Rejected => write!(f, "notification rejected"),
        }
    }
}

impl std::error::Error for NotifyError {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from [`ConfigPort`](crate::app::ports::ConfigPort) and
/// [`IrrigationConfig::validate`](crate::config::IrrigationConfig::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config could not be read or parsed.
    Corrupted,
    /// A field failed range or ordering validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
