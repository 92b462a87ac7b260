//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                  |
//! |----------------|--------------------|------------------------------|
//! | `config_file`  | ConfigPort         | TOML file on disk            |
//! | `log_sink`     | NotificationSink   | Serial / stderr log output   |
//! | `time`         | ClockPort          | esp_timer / `Instant` / sim  |
//! | `sim`          | SensorPort         | Simulated soil field         |
//! |                | ConnectivityPort   | Switchable uplink            |
//! |                | `OutputPin`        | Probeable valve relay        |

pub mod config_file;
pub mod log_sink;
pub mod sim;
pub mod time;
