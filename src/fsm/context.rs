//! Shared mutable context threaded through every FSM handler.
//!
//! `SupervisorContext` is the blackboard the state handlers read from and
//! write to: the latest readings and watchdog alerts, the session
//! bookkeeping, configuration, and a small queue of [`Action`]s the
//! supervisor applies to the valve bank and the notification sink once
//! the handlers return.

use log::{error, info};

use crate::app::events::NotificationKind;
use crate::app::status::{Decision, OperatingMode, SessionStats, StopReason};
use crate::config::IrrigationConfig;
use crate::error::IrrigationError;
use crate::offline::OfflineLevel;
use crate::safety::{SafetyWatchdog, WatchdogAlerts, WatchdogInputs, WatchdogLimits};
use crate::sensors::{SensorSnapshot, SoilStats};

/// Capacity of the action queue.  The longest chain (ACTIVE exit followed
/// by an EMERGENCY_STOP or ERROR enter) queues four.
pub const MAX_ACTIONS: usize = 8;

// ---------------------------------------------------------------------------
// Actions (written by handlers; applied by the supervisor)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    OpenValve(u8),
    CloseValve(u8),
    /// Unconditional close of every valve.
    CloseAll,
    Notify(NotificationKind),
}

// ---------------------------------------------------------------------------
// SupervisorContext
// ---------------------------------------------------------------------------

pub struct SupervisorContext {
    // -- Timing --
    pub ticks_in_state: u64,
    pub total_ticks: u64,
    /// Clock reading for the operation in progress.
    pub now_ms: u64,

    // -- Inputs --
    pub snapshot: SensorSnapshot,
    pub soil: SoilStats,
    /// The last sensor read failed or returned implausible values.
    pub sensor_fault: bool,
    pub alerts: WatchdogAlerts,
    pub mode: OperatingMode,
    pub offline_level: OfflineLevel,
    pub consecutive_offline_ticks: u32,
    /// An operator command arrived and its override has not lapsed.
    pub operator_override: bool,

    // -- Session --
    pub session_start_ms: Option<u64>,
    pub planned_session_secs: u32,
    pub active_valve: Option<u8>,
    pub last_session_end_ms: Option<u64>,
    pub valve_timeout_notified: bool,
    pub safety_lock: bool,
    pub thermal_protection_active: bool,
    /// Reason for the next ACTIVE exit, consumed by `active_exit`.
    pub stop_reason: Option<StopReason>,
    pub stats: SessionStats,
    pub day_number: Option<u32>,

    // -- Per-tick outputs --
    pub decision: Decision,
    pub executed: bool,
    pub blocked_by: Option<IrrigationError>,
    pub actions: heapless::Vec<Action, MAX_ACTIONS>,

    pub config: IrrigationConfig,
    pub watchdog: SafetyWatchdog,
}

impl SupervisorContext {
    pub fn new(config: IrrigationConfig) -> Self {
        let watchdog = SafetyWatchdog::new(WatchdogLimits::from(&config));
        Self {
            ticks_in_state: 0,
            total_ticks: 0,
            now_ms: 0,
            snapshot: SensorSnapshot::default(),
            soil: SoilStats { avg: 0.0, max: 0.0 },
            sensor_fault: false,
            alerts: WatchdogAlerts::NONE,
            mode: OperatingMode::Online,
            offline_level: OfflineLevel::Normal,
            consecutive_offline_ticks: 0,
            operator_override: false,
            session_start_ms: None,
            planned_session_secs: 0,
            active_valve: None,
            last_session_end_ms: None,
            valve_timeout_notified: false,
            safety_lock: false,
            thermal_protection_active: false,
            stop_reason: None,
            stats: SessionStats::default(),
            day_number: None,
            decision: Decision::Hold,
            executed: false,
            blocked_by: None,
            actions: heapless::Vec::new(),
            config,
            watchdog,
        }
    }

    // -- Inputs ------------------------------------------------------------

    /// Record a validated snapshot.
    pub fn observe(&mut self, snapshot: SensorSnapshot) {
        self.soil = snapshot.soil_stats(self.config.soil_sensor_count);
        self.snapshot = snapshot;
        self.sensor_fault = false;
    }

    pub fn watchdog_inputs(&self) -> WatchdogInputs {
        self.watchdog.inputs(
            self.now_ms,
            self.snapshot.ambient_temperature,
            self.soil.avg,
            self.soil.max,
        )
    }

    /// Reset the per-tick outputs before `Fsm::tick`.
    pub fn begin_tick(&mut self) {
        self.decision = Decision::Hold;
        self.executed = false;
        self.blocked_by = None;
    }

    /// Reset today's runtime when the calendar day changes.
    pub fn roll_day(&mut self, day: Option<u32>) {
        let Some(day) = day else { return };
        match self.day_number {
            Some(prev) if prev != day => {
                info!(
                    "New day ({prev} -> {day}): daily runtime {}s reset",
                    self.stats.today_runtime_seconds
                );
                self.stats.today_runtime_seconds = 0;
            }
            _ => {}
        }
        self.day_number = Some(day);
    }

    /// An operator command arrived: stamp the override timer and hand
    /// discretionary control to the operator.
    pub fn claim_operator_override(&mut self) {
        self.watchdog.reset_mqtt_timer(self.now_ms);
        if !self.operator_override {
            info!("Operator override active");
        }
        self.operator_override = true;
    }

    /// The override timer fired: autonomous control resumes.
    pub fn release_operator_override(&mut self) {
        self.watchdog.clear_mqtt_timer();
        if self.operator_override {
            info!("Operator override lapsed, autonomous control resumes");
        }
        self.operator_override = false;
    }

    // -- Session -----------------------------------------------------------

    pub fn session_elapsed_secs(&self) -> u32 {
        self.session_start_ms.map_or(0, |start| {
            (self.now_ms.saturating_sub(start) / 1000).min(u64::from(u32::MAX)) as u32
        })
    }

    /// Today's runtime including the session in progress.
    pub fn daily_runtime_secs(&self) -> u32 {
        self.stats
            .today_runtime_seconds
            .saturating_add(self.session_elapsed_secs())
    }

    /// Seconds until the open valve hits its planned duration or the daily
    /// cap, whichever comes first.  `None` while no session runs.
    pub fn session_remaining_secs(&self) -> Option<u32> {
        self.session_start_ms?;
        let planned = self.planned_session_secs.saturating_sub(self.session_elapsed_secs());
        let daily = self
            .config
            .max_daily_secs()
            .saturating_sub(self.daily_runtime_secs());
        Some(planned.min(daily))
    }

    /// The irrigation start rule: dry soil, or an offline urgency level
    /// that calls for water.  Never while a probe is already saturated.
    pub fn wants_start(&self) -> bool {
        if self.alerts.overmoisture() {
            return false;
        }
        self.soil.avg <= self.config.soil_critical_pct
            || (self.mode == OperatingMode::Offline && self.offline_level.requires_irrigation())
    }

    /// Guards shared by `START` and autonomous starts.
    pub fn start_guard(&self) -> Result<(), IrrigationError> {
        if self.safety_lock {
            return Err(IrrigationError::SafetyLocked);
        }
        if self.thermal_protection_active || self.alerts.temperature_critical() {
            return Err(IrrigationError::ThermalProtection);
        }
        if self.sensor_fault {
            return Err(IrrigationError::SensorFault);
        }
        if let Some(end) = self.last_session_end_ms {
            let since = (self.now_ms.saturating_sub(end) / 1000).min(u64::from(u32::MAX)) as u32;
            let min = self.config.min_interval_secs();
            if since < min {
                return Err(IrrigationError::IntervalNotElapsed {
                    remaining_secs: min - since,
                });
            }
        }
        if self.stats.today_runtime_seconds >= self.config.max_daily_secs() {
            return Err(IrrigationError::DailyLimitReached);
        }
        Ok(())
    }

    /// Authority for discretionary stops (target reached).  Online the
    /// tick only recommends; actuation goes through the command entry point.
    pub fn has_authority(&self) -> bool {
        match self.mode {
            OperatingMode::Offline => true,
            OperatingMode::Online => false,
        }
    }

    /// Authority for autonomous starts: offline only, and only once a
    /// recent operator command has lapsed.
    pub fn may_start_autonomously(&self) -> bool {
        match self.mode {
            OperatingMode::Offline => self.config.offline_mode_enabled && !self.operator_override,
            OperatingMode::Online => false,
        }
    }

    /// Record an executed stop; `active_exit` consumes the reason.
    pub fn stop(&mut self, reason: StopReason) {
        self.stop_reason = Some(reason);
        self.decision = Decision::Stop(reason);
        self.executed = true;
    }

    // -- Outputs -----------------------------------------------------------

    pub fn push(&mut self, action: Action) {
        if self.actions.push(action).is_err() {
            error!("Action queue full, dropping {action:?}");
        }
    }

    pub fn notify(&mut self, kind: NotificationKind) {
        self.push(Action::Notify(kind));
    }
}
