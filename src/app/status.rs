//! Read-side views of the supervisor: status snapshots, per-tick
//! evaluation records and the decision vocabulary they share.
//!
//! Everything here derives `Serialize` so a diagnostics collaborator can
//! render it however it likes.  No wire schema is implied.

use core::fmt;

use serde::Serialize;

use crate::error::IrrigationError;
use crate::fsm::IrrigationState;
use crate::offline::OfflineLevel;
use crate::safety::WatchdogAlerts;

// ───────────────────────────────────────────────────────────────
// Mode and decisions
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingMode {
    #[default]
    Online,
    Offline,
}

impl OperatingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    OverMoisture,
    ThermalCritical,
    SessionTimeout,
    DailyLimit,
    DurationElapsed,
    TargetReached,
    ManualStop,
    EmergencyStop,
    SensorError,
    /// The valve refused to open; the session was abandoned.
    ValveFault,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OverMoisture => "over_moisture",
            Self::ThermalCritical => "thermal_critical",
            Self::SessionTimeout => "session_timeout",
            Self::DailyLimit => "daily_limit",
            Self::DurationElapsed => "duration_elapsed",
            Self::TargetReached => "target_reached",
            Self::ManualStop => "manual_stop",
            Self::EmergencyStop => "emergency_stop",
            Self::SensorError => "sensor_error",
            Self::ValveFault => "valve_fault",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one evaluation tick concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "action", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    /// Nothing to do.
    #[default]
    Hold,
    /// Soil is dry enough to irrigate.
    Start,
    /// A session is running and should keep running.
    Continue,
    /// A running session should end.
    Stop(StopReason),
}

// ───────────────────────────────────────────────────────────────
// Evaluation record
// ───────────────────────────────────────────────────────────────

/// Snapshot of one evaluation tick, kept as `last_evaluation`.
///
/// `executed == false` with a `Start`/`Stop` decision means the tick only
/// recommended it: the supervisor was online, an operator override held
/// control, or a guard (`blocked_by`) refused it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub timestamp_ms: u64,
    pub state: IrrigationState,
    pub mode: OperatingMode,
    pub sensor_ok: bool,
    pub soil_avg: f32,
    pub soil_max: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub offline_level: OfflineLevel,
    /// Set on offline ticks only.
    pub offline_reason: Option<heapless::String<64>>,
    pub alerts: WatchdogAlerts,
    pub decision: Decision,
    pub executed: bool,
    pub blocked_by: Option<IrrigationError>,
}

// ───────────────────────────────────────────────────────────────
// Status
// ───────────────────────────────────────────────────────────────

/// Running counters.  Volatile: lost on restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionStats {
    pub session_count: u32,
    pub today_runtime_seconds: u32,
    pub total_runtime_seconds: u64,
    pub last_stop_reason: Option<StopReason>,
}

/// Full status returned by
/// [`IrrigationSupervisor::get_status`](super::supervisor::IrrigationSupervisor::get_status).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrrigationStatus {
    pub state: IrrigationState,
    pub mode: OperatingMode,
    pub is_irrigating: bool,
    pub active_valve: Option<u8>,
    pub valve_bitmask: u8,
    pub safety_lock: bool,
    pub thermal_protection_active: bool,
    pub operator_override: bool,
    pub session_elapsed_seconds: u32,
    pub planned_session_seconds: u32,
    pub offline_level: OfflineLevel,
    pub consecutive_offline_ticks: u32,
    pub stats: SessionStats,
    pub last_evaluation: Option<EvaluationRecord>,
}
