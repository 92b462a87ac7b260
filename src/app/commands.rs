//! Inbound commands to the supervisor.
//!
//! Issued by the outside world (a network command handler, a local button,
//! the simulator) through
//! [`IrrigationSupervisor::execute_command`](super::supervisor::IrrigationSupervisor::execute_command).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of operator commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrigationCommand {
    /// Open the primary valve for the requested duration.
    Start,
    /// Close the active valve and return to idle.
    Stop,
    /// Force-close every valve and latch the safety lock.
    EmergencyStop,
}

impl IrrigationCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::EmergencyStop => "emergency_stop",
        }
    }
}

impl fmt::Display for IrrigationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for IrrigationCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "emergency_stop" | "estop" => Ok(Self::EmergencyStop),
            _ => Err(()),
        }
    }
}
