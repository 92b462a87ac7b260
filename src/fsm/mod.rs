//! Function-pointer finite state machine engine.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                        │
//! │  ┌───────────────────┬───────────┬──────────┬───────────────────┐  │
//! │  │ IrrigationState   │ on_enter  │ on_exit  │ on_update         │  │
//! │  ├───────────────────┼───────────┼──────────┼───────────────────┤  │
//! │  │ Idle              │ fn(ctx)   │    -     │ fn(ctx)->Option<> │  │
//! │  │ Active            │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ Error             │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ ThermalProtection │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ EmergencyStop     │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  └───────────────────┴───────────┴──────────┴───────────────────┘  │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each evaluation tick the engine calls `on_update` for the **current**
//! state.  If it returns `Some(next)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next.  Handlers never touch
//! hardware: they read the [`SupervisorContext`] blackboard and queue
//! [`Action`](context::Action)s that the supervisor applies afterwards.
//!
//! Commands bypass `on_update` through [`Fsm::force_transition`], which
//! still runs the exit/enter pair so session bookkeeping stays in one
//! place.

pub mod context;
pub mod states;

use core::fmt;

use context::SupervisorContext;
use log::info;
use serde::Serialize;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Supervisor states.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum IrrigationState {
    #[default]
    Idle = 0,
    Active = 1,
    Error = 2,
    ThermalProtection = 3,
    /// Latched until an explicit unlock.
    EmergencyStop = 4,
}

impl IrrigationState {
    pub const COUNT: usize = 5;

    /// Convert a table index back to a state.  Out-of-range indices
    /// assert in debug builds and map to `EmergencyStop` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Active,
            2 => Self::Error,
            3 => Self::ThermalProtection,
            4 => Self::EmergencyStop,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::EmergencyStop
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Active => "ACTIVE",
            Self::Error => "ERROR",
            Self::ThermalProtection => "THERMAL_PROTECTION",
            Self::EmergencyStop => "EMERGENCY_STOP",
        }
    }
}

impl fmt::Display for IrrigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit` signature.  Runs exactly once per transition.
pub type StateActionFn = fn(&mut SupervisorContext);

/// Per-tick handler.  `Some(next)` requests a transition.
pub type StateUpdateFn = fn(&mut SupervisorContext) -> Option<IrrigationState>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor {
    pub id: IrrigationState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Indexed by `IrrigationState as usize`.
    table: [StateDescriptor; IrrigationState::COUNT],
    current: usize,
    tick_count: u64,
    state_entry_tick: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; IrrigationState::COUNT], initial: IrrigationState) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut SupervisorContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance by one evaluation tick.
    pub fn tick(&mut self, ctx: &mut SupervisorContext) {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;
        ctx.total_ticks = self.tick_count;

        if let Some(next) = (self.table[self.current].on_update)(ctx) {
            self.transition(next, ctx);
        }
    }

    /// Jump to `next` outside the tick (operator commands, unlock).
    /// No-op when already there.
    pub fn force_transition(&mut self, next: IrrigationState, ctx: &mut SupervisorContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> IrrigationState {
        IrrigationState::from_index(self.current)
    }

    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    fn transition(&mut self, next: IrrigationState, ctx: &mut SupervisorContext) {
        let next_idx = next as usize;
        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
