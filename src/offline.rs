//! Offline urgency levels and the adaptive re-evaluation cadence.
//!
//! While the device has no uplink it decides on its own how often to wake
//! and look at the soil.  Dry soil shortens the interval, wet soil widens
//! it.  A hysteresis margin on the band edges keeps one noisy reading from
//! flapping the cadence back and forth.
//!
//! ```text
//!  soil avg %   0 ──────── 30 ───────── 40 ──── 45 ─────────── 100
//!  level         EMERGENCY │  CRITICAL   │ WARN  │    NORMAL
//!  interval        15 min  │   30 min    │  1 h  │     2 h
//! ```

use core::fmt::{self, Write as _};

use serde::Serialize;

/// Dead-zone applied below a band's upper bound before committing to it.
pub const HYSTERESIS_PCT: f32 = 2.0;

/// Urgency of the soil condition while offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfflineLevel {
    #[default]
    Normal,
    Warning,
    Critical,
    Emergency,
}

impl OfflineLevel {
    /// Scan order for [`evaluate`]: most urgent first.
    const BY_URGENCY: [Self; 4] = [Self::Emergency, Self::Critical, Self::Warning, Self::Normal];

    /// Exclusive upper bound of the band (soil %).
    pub fn upper_bound(self) -> f32 {
        match self {
            Self::Emergency => 30.0,
            Self::Critical => 40.0,
            Self::Warning => 45.0,
            Self::Normal => f32::INFINITY,
        }
    }

    /// Re-evaluation interval for this level.
    pub fn interval_ms(self) -> u32 {
        match self {
            Self::Normal => 2 * 60 * 60 * 1000,
            Self::Warning => 60 * 60 * 1000,
            Self::Critical => 30 * 60 * 1000,
            Self::Emergency => 15 * 60 * 1000,
        }
    }

    /// Levels at which the device irrigates on its own.
    pub fn requires_irrigation(self) -> bool {
        matches!(self, Self::Critical | Self::Emergency)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for OfflineLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value returned by [`evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfflineEvaluationResult {
    pub level: OfflineLevel,
    pub interval_ms: u32,
    pub soil_avg: f32,
    pub reason: heapless::String<64>,
}

/// Map a soil average onto an offline level, holding `current_level` when
/// the reading sits inside the hysteresis margin of the candidate band.
pub fn evaluate(soil_avg: f32, current_level: OfflineLevel) -> OfflineEvaluationResult {
    let candidate = OfflineLevel::BY_URGENCY
        .into_iter()
        .find(|level| soil_avg < level.upper_bound())
        .unwrap_or(OfflineLevel::Normal);

    let mut reason = heapless::String::new();
    let level = if candidate == current_level {
        let _ = write!(reason, "soil {soil_avg:.1}% holds {candidate}");
        current_level
    } else if soil_avg < candidate.upper_bound() - HYSTERESIS_PCT {
        let _ = write!(reason, "soil {soil_avg:.1}%: {current_level} -> {candidate}");
        candidate
    } else {
        let _ = write!(
            reason,
            "soil {soil_avg:.1}% within hysteresis of {candidate}, holding {current_level}"
        );
        current_level
    };

    OfflineEvaluationResult {
        level,
        interval_ms: level.interval_ms(),
        soil_avg,
        reason,
    }
}
