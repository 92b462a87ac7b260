//! Solenoid valve bank driver.
//!
//! One relay output per valve, driven through `embedded-hal` 1.0
//! [`OutputPin`]s so the same code runs on ESP-IDF `PinDriver`s, Linux GPIO
//! and the simulated pins used by host tests.
//!
//! ## Safety contract
//!
//! - Every valve is driven closed at construction (fail-safe boot).
//! - A single lock guards the whole bank; valve counts are tiny and each
//!   write is a register poke, so per-valve locking buys nothing.
//! - The recorded state only changes after a successful pin write.
//! - [`ValveActuator::emergency_close_all`] ignores every higher-level
//!   check and retries failed writes.  It is the last line of defence.

use embedded_hal::digital::OutputPin;
use log::{error, info, warn};
use parking_lot::Mutex;

use crate::config::MAX_VALVES;
use crate::error::ActuatorError;

/// Write attempts per valve during an emergency close.
const EMERGENCY_CLOSE_ATTEMPTS: usize = 3;

struct ValveChannel<P> {
    pin: P,
}

struct ValveBank<P> {
    channels: heapless::Vec<ValveChannel<P>, MAX_VALVES>,
    active_low: bool,
    /// Bit `n` set = valve `n` open.
    state_mask: u8,
}

impl<P: OutputPin> ValveBank<P> {
    fn drive(&mut self, id: u8, open: bool) -> Result<(), ActuatorError> {
        let active_low = self.active_low;
        let channel = self
            .channels
            .get_mut(id as usize)
            .ok_or(ActuatorError::UnknownValve(id))?;

        // active-low relay: LOW = open; active-high relay: HIGH = open
        let high = open != active_low;
        let res = if high {
            channel.pin.set_high()
        } else {
            channel.pin.set_low()
        };
        res.map_err(|_| ActuatorError::GpioWriteFailed)?;

        if open {
            self.state_mask |= 1 << id;
        } else {
            self.state_mask &= !(1 << id);
        }
        Ok(())
    }
}

/// Thread-safe valve bank.
pub struct ValveActuator<P> {
    bank: Mutex<ValveBank<P>>,
}

impl<P: OutputPin> ValveActuator<P> {
    /// Take ownership of the valve outputs and drive every one closed.
    ///
    /// A pin that cannot be driven closed at boot is an initialisation
    /// failure: the bank refuses to start with a valve in an unknown state.
    pub fn new(pins: impl IntoIterator<Item = P>, active_low: bool) -> Result<Self, ActuatorError> {
        let mut channels = heapless::Vec::new();
        for pin in pins {
            channels
                .push(ValveChannel { pin })
                .map_err(|_| ActuatorError::TooManyValves)?;
        }

        let mut bank = ValveBank {
            channels,
            active_low,
            state_mask: 0,
        };
        for id in 0..bank.channels.len() as u8 {
            bank.drive(id, false)?;
        }
        info!(
            "Valves: {} output(s) initialised closed ({})",
            bank.channels.len(),
            if active_low { "active-low" } else { "active-high" }
        );

        Ok(Self {
            bank: Mutex::new(bank),
        })
    }

    pub fn open(&self, valve_id: u8) -> Result<(), ActuatorError> {
        let mut bank = self.bank.lock();
        bank.drive(valve_id, true)?;
        info!("Valve {valve_id}: OPEN");
        Ok(())
    }

    pub fn close(&self, valve_id: u8) -> Result<(), ActuatorError> {
        let mut bank = self.bank.lock();
        bank.drive(valve_id, false)?;
        info!("Valve {valve_id}: CLOSED");
        Ok(())
    }

    pub fn is_open(&self, valve_id: u8) -> bool {
        let bank = self.bank.lock();
        (valve_id as usize) < bank.channels.len() && bank.state_mask & (1 << valve_id) != 0
    }

    /// Close every valve, whatever state the rest of the system is in.
    ///
    /// Each output gets up to three write attempts.  A valve that still
    /// cannot be closed keeps its open bit so diagnostics show the truth.
    pub fn emergency_close_all(&self) {
        let mut bank = self.bank.lock();
        let count = bank.channels.len() as u8;
        for id in 0..count {
            let closed = (0..EMERGENCY_CLOSE_ATTEMPTS).any(|attempt| match bank.drive(id, false) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Valve {id}: emergency close attempt {} failed: {e}", attempt + 1);
                    false
                }
            });
            if !closed {
                error!("Valve {id}: EMERGENCY CLOSE FAILED, output state unknown");
            }
        }
        if bank.state_mask == 0 {
            warn!("Valves: emergency close-all complete");
        }
    }

    /// Open/closed state of every valve, bit `n` = valve `n`.
    pub fn get_state_bitmask(&self) -> u8 {
        self.bank.lock().state_mask
    }

    pub fn valve_count(&self) -> u8 {
        self.bank.lock().channels.len() as u8
    }
}
