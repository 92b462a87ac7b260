//! Application core: decision logic behind port traits.
//!
//! The supervisor combines the state machine, the safety watchdog and the
//! offline evaluator.  All interaction with sensors, uplink, clock and
//! notifications happens through the traits in [`ports`], so this layer
//! is fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod status;
pub mod supervisor;
