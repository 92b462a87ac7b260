//! Irrigation supervisor: the hexagonal core.
//!
//! [`IrrigationSupervisor`] owns the state machine, the session context and
//! the valve bank.  Two entry points mutate it:
//!
//! - [`evaluate_and_act`](IrrigationSupervisor::evaluate_and_act), called by
//!   the periodic worker once per tick;
//! - [`execute_command`](IrrigationSupervisor::execute_command), called from
//!   any thread by a command handler.
//!
//! ```text
//!  SensorPort ──▶ ┌────────────────────────────┐ ──▶ NotificationSink
//!                 │    IrrigationSupervisor    │
//!  Connectivity ─▶│  Watchdog · Offline · FSM  │ ──▶ ValveActuator
//!                 └────────────────────────────┘
//! ```
//!
//! ## Locking
//!
//! One `parking_lot::Mutex` guards the session (FSM + context).  The valve
//! bank has its own lock and is only ever taken while the session lock is
//! held, never the other way round.  Sensor reads happen before the session
//! lock is taken and notifications are sent after it is released.  Commands
//! mutate state immediately: the next tick observes whatever the last writer
//! left behind.

use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;

use embedded_hal::digital::OutputPin;
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::config::IrrigationConfig;
use crate::drivers::valve::ValveActuator;
use crate::error::{ActuatorError, ConfigError, IrrigationError};
use crate::fsm::context::{Action, SupervisorContext};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, IrrigationState};
use crate::offline;
use crate::scheduler::EvaluationCadence;

use super::commands::IrrigationCommand;
use super::events::NotificationKind;
use super::ports::{ClockPort, ConnectivityPort, NotificationSink, SensorPort};
use super::status::{EvaluationRecord, IrrigationStatus, OperatingMode, StopReason};

// ───────────────────────────────────────────────────────────────
// Tick result
// ───────────────────────────────────────────────────────────────

/// What one evaluation tick did and when the next one is due.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub state: IrrigationState,
    pub mode: OperatingMode,
    pub next_interval: Duration,
    pub record: EvaluationRecord,
}

/// Notifications collected under the lock and sent after it.
#[derive(Default)]
struct Outbox {
    events: heapless::Vec<NotificationKind, 8>,
    soil_avg: f32,
    humidity: f32,
    temperature: f32,
}

impl Outbox {
    fn push(&mut self, kind: NotificationKind) {
        if self.events.push(kind).is_err() {
            warn!("Notification outbox full, dropping '{kind}'");
        }
    }

    fn capture(&mut self, ctx: &SupervisorContext) {
        self.soil_avg = ctx.soil.avg;
        self.humidity = ctx.snapshot.ambient_humidity;
        self.temperature = ctx.snapshot.ambient_temperature;
    }
}

struct Session {
    fsm: Fsm,
    ctx: SupervisorContext,
    last_evaluation: Option<EvaluationRecord>,
}

// ───────────────────────────────────────────────────────────────
// IrrigationSupervisor
// ───────────────────────────────────────────────────────────────

pub struct IrrigationSupervisor<P, N, K> {
    session: Mutex<Session>,
    valves: ValveActuator<P>,
    sink: N,
    clock: K,
    cadence: EvaluationCadence,
    soil_sensor_count: u8,
    /// Bumped by every command so a sleeping worker can re-evaluate.
    command_seq: AtomicU64,
}

impl<P, N, K> IrrigationSupervisor<P, N, K>
where
    P: OutputPin + Send,
    N: NotificationSink,
    K: ClockPort,
{
    /// Validate `config` against the wired valves and start in `IDLE`.
    pub fn new(
        config: IrrigationConfig,
        valves: ValveActuator<P>,
        sink: N,
        clock: K,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.primary_valve >= valves.valve_count() {
            return Err(ConfigError::ValidationFailed(
                "primary_valve has no wired output",
            ));
        }

        let cadence = EvaluationCadence::from(&config);
        let soil_sensor_count = config.soil_sensor_count;
        let mut ctx = SupervisorContext::new(config);
        ctx.now_ms = clock.now_ms();
        ctx.roll_day(clock.day_number());
        let mut fsm = Fsm::new(build_state_table(), IrrigationState::Idle);
        fsm.start(&mut ctx);
        ctx.actions.clear();

        info!(
            "Supervisor ready: {} valve(s), primary {}, offline mode {}",
            valves.valve_count(),
            ctx.config.primary_valve,
            if ctx.config.offline_mode_enabled { "enabled" } else { "disabled" }
        );

        Ok(Self {
            session: Mutex::new(Session {
                fsm,
                ctx,
                last_evaluation: None,
            }),
            valves,
            sink,
            clock,
            cadence,
            soil_sensor_count,
            command_seq: AtomicU64::new(0),
        })
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one evaluation: read sensors → watchdog → offline level →
    /// FSM → valves → notifications.
    pub fn evaluate_and_act(
        &self,
        sensors: &mut impl SensorPort,
        link: &impl ConnectivityPort,
    ) -> TickOutcome {
        // Blocking I/O first, outside the lock.
        let connected = link.is_connected();
        let reading = sensors.read_all().and_then(|snapshot| {
            snapshot
                .validate(self.soil_sensor_count)
                .map(|()| snapshot)
        });
        let now = self.clock.now_ms();
        let day = self.clock.day_number();

        let mut outbox = Outbox::default();
        let outcome = {
            let mut guard = self.session.lock();
            let session = &mut *guard;
            let ctx = &mut session.ctx;
            ctx.now_ms = now;
            ctx.roll_day(day);
            Self::update_mode(ctx, connected);

            let mut offline_reason = None;
            match reading {
                Ok(snapshot) => {
                    ctx.observe(snapshot);
                    if ctx.mode == OperatingMode::Offline {
                        let result = offline::evaluate(ctx.soil.avg, ctx.offline_level);
                        if result.level != ctx.offline_level {
                            info!(
                                "OFFLINE: level {} -> {} ({})",
                                ctx.offline_level, result.level, result.reason
                            );
                        }
                        ctx.offline_level = result.level;
                        offline_reason = Some(result.reason);
                    }
                }
                Err(e) => {
                    warn!("Sensor read failed: {e}");
                    ctx.sensor_fault = true;
                }
            }

            let previous = ctx.alerts;
            ctx.alerts = ctx.watchdog.check(&ctx.watchdog_inputs());
            for alert in ctx.alerts.raised_since(previous).iter() {
                warn!("WATCHDOG: {alert} raised");
            }
            for alert in previous.raised_since(ctx.alerts).iter() {
                info!("WATCHDOG: {alert} cleared");
            }
            if ctx.alerts.mqtt_override_timeout() {
                ctx.release_operator_override();
            }

            ctx.begin_tick();
            session.fsm.tick(&mut session.ctx);
            if let Err(e) = self.apply_actions(session, &mut outbox) {
                error!("Tick actuation failed: {e}");
            }
            outbox.capture(&session.ctx);

            let ctx = &session.ctx;
            let state = session.fsm.current_state();
            let record = EvaluationRecord {
                timestamp_ms: now,
                state,
                mode: ctx.mode,
                sensor_ok: !ctx.sensor_fault,
                soil_avg: ctx.soil.avg,
                soil_max: ctx.soil.max,
                temperature: ctx.snapshot.ambient_temperature,
                humidity: ctx.snapshot.ambient_humidity,
                offline_level: ctx.offline_level,
                offline_reason,
                alerts: ctx.alerts,
                decision: ctx.decision,
                executed: ctx.executed,
                blocked_by: ctx.blocked_by,
            };
            session.last_evaluation = Some(record.clone());

            TickOutcome {
                state,
                mode: ctx.mode,
                next_interval: self.cadence.next_interval(
                    ctx.mode,
                    ctx.consecutive_offline_ticks,
                    ctx.offline_level,
                    ctx.session_remaining_secs()
                        .map(|secs| Duration::from_secs(u64::from(secs))),
                ),
                record,
            }
        };

        self.dispatch(&outbox);
        debug!(
            "Tick: {} {} soil={:.1}% next in {}s",
            outcome.state,
            outcome.mode,
            outcome.record.soil_avg,
            outcome.next_interval.as_secs()
        );
        outcome
    }

    fn update_mode(ctx: &mut SupervisorContext, connected: bool) {
        if connected {
            if ctx.mode == OperatingMode::Offline {
                info!(
                    "Uplink restored after {} offline tick(s)",
                    ctx.consecutive_offline_ticks
                );
            }
            ctx.mode = OperatingMode::Online;
            ctx.consecutive_offline_ticks = 0;
        } else {
            if ctx.mode == OperatingMode::Online {
                warn!("Uplink lost, entering offline mode");
            }
            ctx.mode = OperatingMode::Offline;
            ctx.consecutive_offline_ticks = ctx.consecutive_offline_ticks.saturating_add(1);
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an operator command immediately.
    ///
    /// `duration_minutes` only matters for `Start`: `0` selects the default
    /// session length and anything longer than `max_session_minutes` is
    /// clamped.  Rejections leave the session untouched.
    pub fn execute_command(
        &self,
        cmd: IrrigationCommand,
        duration_minutes: u16,
    ) -> Result<(), IrrigationError> {
        let now = self.clock.now_ms();
        let day = self.clock.day_number();

        let mut outbox = Outbox::default();
        let result = {
            let mut guard = self.session.lock();
            let session = &mut *guard;
            session.ctx.now_ms = now;
            session.ctx.roll_day(day);
            session.ctx.claim_operator_override();

            let decided = match cmd {
                IrrigationCommand::EmergencyStop => {
                    Self::emergency_stop(session);
                    Ok(())
                }
                IrrigationCommand::Stop => {
                    Self::stop(session);
                    Ok(())
                }
                IrrigationCommand::Start => Self::start(session, duration_minutes),
            };

            let applied = self.apply_actions(session, &mut outbox);
            if cmd == IrrigationCommand::EmergencyStop {
                // Unconditional, even when already latched.
                self.valves.emergency_close_all();
            }
            outbox.capture(&session.ctx);
            decided.and(applied.map_err(IrrigationError::from))
        };

        self.command_seq.fetch_add(1, Ordering::Release);
        self.dispatch(&outbox);
        match &result {
            Ok(()) => info!("Command {cmd} ({duration_minutes} min) accepted"),
            Err(e) => warn!("Command {cmd} rejected: {e}"),
        }
        result
    }

    fn emergency_stop(session: &mut Session) {
        session.ctx.safety_lock = true;
        if session.fsm.current_state() == IrrigationState::Active {
            session.ctx.stop_reason = Some(StopReason::EmergencyStop);
        }
        session
            .fsm
            .force_transition(IrrigationState::EmergencyStop, &mut session.ctx);
    }

    fn stop(session: &mut Session) {
        if session.fsm.current_state() == IrrigationState::Active {
            session.ctx.stop_reason = Some(StopReason::ManualStop);
            session
                .fsm
                .force_transition(IrrigationState::Idle, &mut session.ctx);
        } else {
            debug!("Stop while {}: nothing to do", session.fsm.current_state());
        }
    }

    fn start(session: &mut Session, duration_minutes: u16) -> Result<(), IrrigationError> {
        let planned = session.ctx.config.clamp_session_secs(duration_minutes);
        match session.fsm.current_state() {
            IrrigationState::EmergencyStop => return Err(IrrigationError::SafetyLocked),
            IrrigationState::ThermalProtection => return Err(IrrigationError::ThermalProtection),
            IrrigationState::Error => return Err(IrrigationError::SensorFault),
            IrrigationState::Active => {
                session.ctx.planned_session_secs = planned;
                info!(
                    "Session re-planned to {planned}s ({}s elapsed)",
                    session.ctx.session_elapsed_secs()
                );
                return Ok(());
            }
            IrrigationState::Idle => {}
        }

        session.ctx.start_guard()?;
        session.ctx.planned_session_secs = planned;
        session
            .fsm
            .force_transition(IrrigationState::Active, &mut session.ctx);
        Ok(())
    }

    /// Clear the emergency-stop latch and return to `IDLE`.
    /// Returns `false` when no lock was set.
    pub fn clear_safety_lock(&self) -> bool {
        let now = self.clock.now_ms();
        let mut guard = self.session.lock();
        let session = &mut *guard;
        if session.fsm.current_state() != IrrigationState::EmergencyStop {
            return false;
        }
        session.ctx.now_ms = now;
        session.ctx.claim_operator_override();
        session
            .fsm
            .force_transition(IrrigationState::Idle, &mut session.ctx);
        session.ctx.safety_lock = false;
        session.ctx.actions.clear();
        self.command_seq.fetch_add(1, Ordering::Release);
        true
    }

    // ── Actuation ─────────────────────────────────────────────

    /// Drain the handlers' action queue into the valve bank and the outbox.
    /// Called with the session lock held.
    fn apply_actions(&self, session: &mut Session, outbox: &mut Outbox) -> Result<(), ActuatorError> {
        let mut failure = None;
        // A session whose valve never opened is invisible to the sink.
        let mut abandoned = false;
        loop {
            let actions = core::mem::take(&mut session.ctx.actions);
            if actions.is_empty() {
                break;
            }
            for action in actions {
                match action {
                    Action::OpenValve(id) => {
                        if let Err(e) = self.valves.open(id) {
                            error!("Valve {id}: open failed ({e}), abandoning session");
                            failure = Some(e);
                            abandoned = true;
                            session.ctx.stop_reason = Some(StopReason::ValveFault);
                            session
                                .fsm
                                .force_transition(IrrigationState::Idle, &mut session.ctx);
                        }
                    }
                    Action::CloseValve(id) => {
                        if let Err(e) = self.valves.close(id) {
                            error!("Valve {id}: close failed ({e}), forcing close-all");
                            self.valves.emergency_close_all();
                        }
                    }
                    Action::CloseAll => self.valves.emergency_close_all(),
                    Action::Notify(NotificationKind::IrrigationOn | NotificationKind::IrrigationOff)
                        if abandoned => {}
                    Action::Notify(kind) => outbox.push(kind),
                }
            }
        }
        failure.map_or(Ok(()), Err)
    }

    fn dispatch(&self, outbox: &Outbox) {
        for kind in &outbox.events {
            if let Err(e) = self.sink.send(
                kind.as_str(),
                outbox.soil_avg,
                outbox.humidity,
                outbox.temperature,
            ) {
                warn!("Notification '{kind}' not delivered: {e}");
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn get_state(&self) -> IrrigationState {
        self.session.lock().fsm.current_state()
    }

    pub fn get_status(&self) -> IrrigationStatus {
        let now = self.clock.now_ms();
        let session = self.session.lock();
        let ctx = &session.ctx;
        let elapsed = ctx.session_start_ms.map_or(0, |start| {
            (now.saturating_sub(start) / 1000).min(u64::from(u32::MAX)) as u32
        });

        IrrigationStatus {
            state: session.fsm.current_state(),
            mode: ctx.mode,
            is_irrigating: ctx.active_valve.is_some(),
            active_valve: ctx.active_valve,
            valve_bitmask: self.valves.get_state_bitmask(),
            safety_lock: ctx.safety_lock,
            thermal_protection_active: ctx.thermal_protection_active,
            operator_override: ctx.operator_override,
            session_elapsed_seconds: elapsed,
            planned_session_seconds: ctx.planned_session_secs,
            offline_level: ctx.offline_level,
            consecutive_offline_ticks: ctx.consecutive_offline_ticks,
            stats: ctx.stats,
            last_evaluation: session.last_evaluation.clone(),
        }
    }

    pub fn config(&self) -> IrrigationConfig {
        self.session.lock().ctx.config.clone()
    }

    pub fn valves(&self) -> &ValveActuator<P> {
        &self.valves
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn cadence(&self) -> &EvaluationCadence {
        &self.cadence
    }

    /// Number of commands handled so far.
    pub fn command_seq(&self) -> u64 {
        self.command_seq.load(Ordering::Acquire)
    }
}
