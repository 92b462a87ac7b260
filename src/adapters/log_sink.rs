//! Log-based notification sink.
//!
//! Writes every notification to the logger (UART / USB-CDC on the device,
//! stderr on the host).  An MQTT publisher would implement the same
//! [`NotificationSink`] trait.

use log::info;

use crate::app::ports::NotificationSink;
use crate::error::NotifyError;

#[derive(Debug, Default)]
pub struct LogNotificationSink;

impl LogNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

impl NotificationSink for LogNotificationSink {
    fn send(
        &self,
        event_type: &str,
        soil_avg: f32,
        humidity: f32,
        temperature: f32,
    ) -> Result<(), NotifyError> {
        info!(
            "NOTIFY | {event_type} | soil={soil_avg:.1}% | RH={humidity:.1}% | T={temperature:.1}\u{00b0}C"
        );
        Ok(())
    }
}
