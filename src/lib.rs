//! Irrigation decision core.
//!
//! Periodically evaluates soil moisture, ambient temperature and uplink
//! state, decides whether a valve should open or close, and enforces the
//! safety limits (session length, daily cap, thermal stop, over-moisture,
//! emergency stop).  ESP-IDF specifics are behind the `espidf` feature.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod offline;
pub mod safety;
pub mod scheduler;
pub mod sensors;

pub use app::commands::IrrigationCommand;
pub use app::status::IrrigationStatus;
pub use app::supervisor::IrrigationSupervisor;
pub use config::IrrigationConfig;
pub use error::IrrigationError;
pub use fsm::IrrigationState;
