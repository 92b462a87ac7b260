//! Port traits: the hexagonal boundary between the decision core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ IrrigationSupervisor (domain)
//! ```
//!
//! Sensors, connectivity, notifications, time and configuration are all
//! collaborators.  The [`IrrigationSupervisor`](super::supervisor::IrrigationSupervisor)
//! consumes them through generics, so the core never touches a bus, a
//! socket or a file directly.

use core::time::Duration;

use crate::config::IrrigationConfig;
use crate::error::{ConfigError, NotifyError, SensorError};
use crate::sensors::SensorSnapshot;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Blocking "read all sensors" call.  Runs outside the session lock.
pub trait SensorPort {
    /// Sample every sensor and return calibrated values.
    fn read_all(&mut self) -> Result<SensorSnapshot, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port
// ───────────────────────────────────────────────────────────────

/// Uplink state.  Drives the online/offline mode selection.
pub trait ConnectivityPort {
    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Notification sink (driven adapter: domain → MQTT / log / ...)
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget event delivery.
///
/// Called after the session lock is released.  Errors are logged by the
/// supervisor and never change irrigation state.
pub trait NotificationSink: Send + Sync {
    fn send(
        &self,
        event_type: &str,
        soil_avg: f32,
        humidity: f32,
        temperature: f32,
    ) -> Result<(), NotifyError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source shared by the supervisor and the worker.
pub trait ClockPort: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin.  Never goes backwards.
    fn now_ms(&self) -> u64;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);

    /// Calendar day index for daily-runtime rollover.  `None` while the
    /// wall clock is not synchronised; the daily counter is then kept.
    fn day_number(&self) -> Option<u32> {
        None
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads configuration once at start-up.
///
/// Implementations MUST validate before returning: an out-of-range
/// threshold is rejected with [`ConfigError::ValidationFailed`], never
/// clamped.
pub trait ConfigPort {
    fn load(&self) -> Result<IrrigationConfig, ConfigError>;
}
