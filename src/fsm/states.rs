//! Concrete state handler functions and table builder.
//!
//! ```text
//!            [soil ≤ critical, or offline CRITICAL/EMERGENCY]
//!  IDLE ─────────────────────────────────────────────────▶ ACTIVE
//!   ▲  ◀── target reached · session timeout · duration ──    │
//!   │      daily limit · over-moisture · manual stop         │
//!   │                                                [temp ≥ thermal_stop]
//!   │                                                        ▼
//!   └──────────────[temp < warning]──────────── THERMAL_PROTECTION
//!
//!  Any state ──[sensor read fails]──▶ ERROR ──[read ok]──▶ IDLE
//!  Any state ──[EmergencyStop cmd]──▶ EMERGENCY_STOP ──[unlock]──▶ IDLE
//! ```
//!
//! Stop priority inside ACTIVE: over-moisture > thermal-critical >
//! session-timeout > daily limit > planned duration > target reached.
//! Only the last one is discretionary.
//!
//! Online, discretionary decisions are recorded as recommendations and
//! nothing but a command opens a valve.  Offline, the tick acts on them.

use super::context::{Action, SupervisorContext};
use super::{IrrigationState, StateDescriptor};
use crate::app::events::NotificationKind;
use crate::app::status::{Decision, StopReason};
use crate::error::IrrigationError;
use log::{error, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; IrrigationState::COUNT] {
    [
        StateDescriptor {
            id: IrrigationState::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: IrrigationState::Active,
            name: "Active",
            on_enter: Some(active_enter),
            on_exit: Some(active_exit),
            on_update: active_update,
        },
        StateDescriptor {
            id: IrrigationState::Error,
            name: "Error",
            on_enter: Some(error_enter),
            on_exit: Some(error_exit),
            on_update: error_update,
        },
        StateDescriptor {
            id: IrrigationState::ThermalProtection,
            name: "ThermalProtection",
            on_enter: Some(thermal_enter),
            on_exit: Some(thermal_exit),
            on_update: thermal_update,
        },
        StateDescriptor {
            id: IrrigationState::EmergencyStop,
            name: "EmergencyStop",
            on_enter: Some(emergency_enter),
            on_exit: Some(emergency_exit),
            on_update: emergency_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut SupervisorContext) {
    info!(
        "IDLE: monitoring soil (start at ≤{:.0}%)",
        ctx.config.soil_critical_pct
    );
}

fn idle_update(ctx: &mut SupervisorContext) -> Option<IrrigationState> {
    if ctx.sensor_fault {
        return Some(IrrigationState::Error);
    }
    if !ctx.wants_start() {
        return None;
    }

    ctx.decision = Decision::Start;
    if let Err(e) = ctx.start_guard() {
        info!("IDLE: start wanted at soil {:.1}% but blocked: {e}", ctx.soil.avg);
        ctx.blocked_by = Some(e);
        return None;
    }
    if !ctx.may_start_autonomously() {
        info!(
            "IDLE: start recommended at soil {:.1}% ({} mode, override={})",
            ctx.soil.avg, ctx.mode, ctx.operator_override
        );
        return None;
    }

    ctx.planned_session_secs = ctx.config.clamp_session_secs(ctx.config.max_session_minutes);
    ctx.executed = true;
    info!(
        "IDLE: soil {:.1}% ({} / {}) → irrigating",
        ctx.soil.avg, ctx.mode, ctx.offline_level
    );
    Some(IrrigationState::Active)
}

// ═══════════════════════════════════════════════════════════════════════════
//  ACTIVE: valve open
// ═══════════════════════════════════════════════════════════════════════════

fn active_enter(ctx: &mut SupervisorContext) {
    let valve = ctx.config.primary_valve;
    let now = ctx.now_ms;
    if ctx.planned_session_secs == 0 {
        ctx.planned_session_secs = ctx.config.clamp_session_secs(0);
    }

    ctx.session_start_ms = Some(now);
    ctx.active_valve = Some(valve);
    ctx.valve_timeout_notified = false;
    ctx.stop_reason = None;
    ctx.watchdog.reset_session(now);
    ctx.watchdog.reset_valve_timer(now);
    ctx.stats.session_count = ctx.stats.session_count.saturating_add(1);

    ctx.push(Action::OpenValve(valve));
    ctx.notify(NotificationKind::IrrigationOn);
    info!(
        "ACTIVE: session #{} on valve {valve}, planned {}s",
        ctx.stats.session_count, ctx.planned_session_secs
    );
}

fn active_exit(ctx: &mut SupervisorContext) {
    let elapsed = ctx.session_elapsed_secs();
    let reason = ctx.stop_reason.take().unwrap_or(StopReason::ManualStop);

    if let Some(valve) = ctx.active_valve.take() {
        ctx.push(Action::CloseValve(valve));
    }
    ctx.stats.today_runtime_seconds = ctx.stats.today_runtime_seconds.saturating_add(elapsed);
    ctx.stats.total_runtime_seconds += u64::from(elapsed);
    ctx.stats.last_stop_reason = Some(reason);
    // A valve that never opened does not start the inter-session pause.
    if reason != StopReason::ValveFault {
        ctx.last_session_end_ms = Some(ctx.now_ms);
    }
    ctx.session_start_ms = None;
    ctx.planned_session_secs = 0;
    ctx.watchdog.clear_session();

    ctx.notify(NotificationKind::IrrigationOff);
    info!(
        "ACTIVE: session ended ({reason}) after {elapsed}s, today {}s",
        ctx.stats.today_runtime_seconds
    );
}

fn active_update(ctx: &mut SupervisorContext) -> Option<IrrigationState> {
    if ctx.sensor_fault {
        ctx.stop(StopReason::SensorError);
        return Some(IrrigationState::Error);
    }

    if ctx.alerts.valve_timeout() && !ctx.valve_timeout_notified {
        warn!(
            "ACTIVE: valve open {}s, past the advisory limit",
            ctx.watchdog_inputs().valve_open_secs
        );
        ctx.valve_timeout_notified = true;
        ctx.notify(NotificationKind::ValveTimeout);
    }

    let mandatory = if ctx.alerts.overmoisture() {
        Some(StopReason::OverMoisture)
    } else if ctx.alerts.temperature_critical() {
        Some(StopReason::ThermalCritical)
    } else if ctx.alerts.session_timeout() {
        Some(StopReason::SessionTimeout)
    } else if ctx.daily_runtime_secs() >= ctx.config.max_daily_secs() {
        Some(StopReason::DailyLimit)
    } else if ctx.session_elapsed_secs() >= ctx.planned_session_secs {
        Some(StopReason::DurationElapsed)
    } else {
        None
    };

    if let Some(reason) = mandatory {
        warn!(
            "ACTIVE: stop ({reason}) soil avg {:.1}% max {:.1}% temp {:.1}°C",
            ctx.soil.avg, ctx.soil.max, ctx.snapshot.ambient_temperature
        );
        ctx.stop(reason);
        return Some(if reason == StopReason::ThermalCritical {
            IrrigationState::ThermalProtection
        } else {
            IrrigationState::Idle
        });
    }

    if ctx.soil.avg >= ctx.config.soil_optimal_pct {
        if ctx.has_authority() {
            ctx.stop(StopReason::TargetReached);
            return Some(IrrigationState::Idle);
        }
        ctx.decision = Decision::Stop(StopReason::TargetReached);
        info!(
            "ACTIVE: target {:.0}% reached, stop recommended ({} mode)",
            ctx.config.soil_optimal_pct, ctx.mode
        );
        return None;
    }

    ctx.decision = Decision::Continue;
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR: sensors failing, valves held closed
// ═══════════════════════════════════════════════════════════════════════════

fn error_enter(ctx: &mut SupervisorContext) {
    ctx.push(Action::CloseAll);
    ctx.notify(NotificationKind::SensorError);
    warn!("ERROR: sensor read failed, all valves closed");
}

fn error_exit(_ctx: &mut SupervisorContext) {
    info!("ERROR: sensors recovered");
}

fn error_update(ctx: &mut SupervisorContext) -> Option<IrrigationState> {
    if !ctx.sensor_fault {
        return Some(IrrigationState::Idle);
    }
    ctx.push(Action::CloseAll);
    ctx.blocked_by = Some(IrrigationError::SensorFault);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  THERMAL_PROTECTION: too hot to irrigate
// ═══════════════════════════════════════════════════════════════════════════

fn thermal_enter(ctx: &mut SupervisorContext) {
    ctx.thermal_protection_active = true;
    ctx.notify(NotificationKind::ThermalProtection);
    warn!(
        "THERMAL_PROTECTION: {:.1}°C ≥ {:.1}°C, waiting for <{:.1}°C",
        ctx.snapshot.ambient_temperature, ctx.config.temp_thermal_stop_c, ctx.config.temp_warning_c
    );
}

fn thermal_exit(ctx: &mut SupervisorContext) {
    ctx.thermal_protection_active = false;
    info!(
        "THERMAL_PROTECTION: released at {:.1}°C",
        ctx.snapshot.ambient_temperature
    );
}

fn thermal_update(ctx: &mut SupervisorContext) -> Option<IrrigationState> {
    if ctx.sensor_fault {
        return Some(IrrigationState::Error);
    }
    if ctx.snapshot.ambient_temperature < ctx.config.temp_warning_c {
        return Some(IrrigationState::Idle);
    }
    if ctx.wants_start() {
        ctx.decision = Decision::Start;
        ctx.blocked_by = Some(IrrigationError::ThermalProtection);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  EMERGENCY_STOP: latched until explicit unlock
// ═══════════════════════════════════════════════════════════════════════════

fn emergency_enter(ctx: &mut SupervisorContext) {
    ctx.safety_lock = true;
    ctx.push(Action::CloseAll);
    ctx.notify(NotificationKind::EmergencyStop);
    error!("EMERGENCY_STOP: all valves forced closed, safety lock set");
}

fn emergency_exit(ctx: &mut SupervisorContext) {
    ctx.safety_lock = false;
    info!("EMERGENCY_STOP: safety lock cleared");
}

fn emergency_update(ctx: &mut SupervisorContext) -> Option<IrrigationState> {
    if ctx.sensor_fault {
        ctx.push(Action::CloseAll);
    } else if ctx.wants_start() {
        ctx.decision = Decision::Start;
        ctx.blocked_by = Some(IrrigationError::SafetyLocked);
    }
    None
}
