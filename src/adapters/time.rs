//! Clock adapters.
//!
//! - [`MonotonicClock`]: real time.  On the device (`espidf` feature) it
//!   wraps `esp_timer_get_time()`; on the host it uses `Instant`.
//! - [`SimClock`]: a manually advanced clock whose `sleep` returns
//!   immediately after moving time forward.  Tests and the simulator use it
//!   to run days of irrigation in milliseconds.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;

use crate::app::ports::ClockPort;

const MS_PER_DAY: u64 = 86_400_000;

// ───────────────────────────────────────────────────────────────
// Real clock
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MonotonicClock {
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(all(target_os = "espidf", feature = "espidf"))]
impl ClockPort for MonotonicClock {
    fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_sys::esp_timer_get_time() }) as u64 / 1000
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Days since the Unix epoch, `None` until SNTP has set the clock.
    fn day_number(&self) -> Option<u32> {
        let mut tv = esp_idf_sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        // Anything before 2020-01-01 is an unsynced RTC.
        const EPOCH_2020: i64 = 1_577_836_800;
        let secs = tv.tv_sec as i64;
        if secs < EPOCH_2020 {
            return None;
        }
        Some((secs / 86_400) as u32)
    }
}

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
impl ClockPort for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn day_number(&self) -> Option<u32> {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .map(|d| (d.as_millis() as u64 / MS_PER_DAY) as u32)
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated clock
// ───────────────────────────────────────────────────────────────

/// Shared simulated time.  Clones observe the same instant.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_ms: Arc<AtomicU64>,
}

impl SimClock {
    /// Starts at t = 0, day 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(ms)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms.fetch_add(by.as_millis() as u64, Ordering::AcqRel);
    }
}

impl ClockPort for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn day_number(&self) -> Option<u32> {
        Some((self.now_ms() / MS_PER_DAY) as u32)
    }
}
