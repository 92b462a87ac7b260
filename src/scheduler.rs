//! Evaluation cadence and the periodic worker that drives the supervisor.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  EvaluationWorker (dedicated thread)                         │
//! │                                                              │
//! │   loop {                                                     │
//! │     outcome = supervisor.evaluate_and_act(sensors, link)     │
//! │     sleep(outcome.next_interval)   ◀── chunked into polls    │
//! │   }                                      │                   │
//! │                                          ├─ shutdown flag    │
//! │                                          ├─ command arrived  │
//! │                                          └─ uplink restored  │
//! └──────────────────────────────────────────────────────────────┘
//!                  ▲
//!                  │ execute_command() from any other thread
//!                  │ (wakes the sleeping worker within one poll)
//! ```
//!
//! Cadence contract:
//!
//! | mode    | consecutive offline ticks | interval                 |
//! |---------|---------------------------|--------------------------|
//! | online  | -                         | `online_interval_secs`   |
//! | offline | 1 ..= stabilisation       | `online_interval_secs`   |
//! | offline | > stabilisation           | offline level (15 m–2 h) |
//!
//! While a valve is open the interval is capped at the online period and
//! at the time left in the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use core::time::Duration;

use embedded_hal::digital::OutputPin;
use log::{debug, error, info};

use crate::app::ports::{ClockPort, ConnectivityPort, NotificationSink, SensorPort};
use crate::app::status::OperatingMode;
use crate::app::supervisor::{IrrigationSupervisor, TickOutcome};
use crate::config::IrrigationConfig;
use crate::drivers::task_pin::{WorkerOptions, spawn_worker};
use crate::offline::OfflineLevel;

// ═══════════════════════════════════════════════════════════════
//  Cadence
// ═══════════════════════════════════════════════════════════════

/// Pure interval calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationCadence {
    pub online_interval: Duration,
    /// Offline ticks that still run at the online period.
    pub stabilization_ticks: u32,
    /// Granularity of the interruptible sleep.
    pub poll_interval: Duration,
}

impl Default for EvaluationCadence {
    fn default() -> Self {
        Self::from(&IrrigationConfig::default())
    }
}

impl From<&IrrigationConfig> for EvaluationCadence {
    fn from(c: &IrrigationConfig) -> Self {
        Self {
            online_interval: Duration::from_secs(u64::from(c.online_interval_secs)),
            stabilization_ticks: c.offline_stabilization_ticks,
            poll_interval: Duration::from_secs(u64::from(c.offline_poll_secs)),
        }
    }
}

impl EvaluationCadence {
    /// Delay until the next tick.
    ///
    /// `session_remaining` is the time left before the open valve reaches
    /// its planned duration or the daily cap.  While a session runs the
    /// tick never waits longer than that, nor longer than the online period.
    pub fn next_interval(
        &self,
        mode: OperatingMode,
        consecutive_offline_ticks: u32,
        level: OfflineLevel,
        session_remaining: Option<Duration>,
    ) -> Duration {
        let base = match mode {
            OperatingMode::Online => self.online_interval,
            OperatingMode::Offline if consecutive_offline_ticks <= self.stabilization_ticks => {
                self.online_interval
            }
            OperatingMode::Offline => Duration::from_millis(u64::from(level.interval_ms())),
        };
        match session_remaining {
            Some(remaining) => base
                .min(self.online_interval)
                .min(remaining.max(Duration::from_secs(1))),
            None => base,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Worker
// ═══════════════════════════════════════════════════════════════

/// Why [`EvaluationWorker::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// The full interval elapsed.
    Elapsed,
    /// The uplink came back during an offline wait.
    Reconnected,
    /// An operator command arrived during the wait.
    Command,
    Shutdown,
}

/// Owns the sensor and connectivity collaborators and runs the tick loop.
pub struct EvaluationWorker<P, N, K, S, C> {
    supervisor: Arc<IrrigationSupervisor<P, N, K>>,
    sensors: S,
    link: C,
    shutdown: Arc<AtomicBool>,
    /// Command sequence observed at the last tick.
    seen_commands: u64,
}

impl<P, N, K, S, C> EvaluationWorker<P, N, K, S, C>
where
    P: OutputPin + Send,
    N: NotificationSink,
    K: ClockPort,
    S: SensorPort,
    C: ConnectivityPort,
{
    pub fn new(supervisor: Arc<IrrigationSupervisor<P, N, K>>, sensors: S, link: C) -> Self {
        Self {
            supervisor,
            sensors,
            link,
            shutdown: Arc::new(AtomicBool::new(false)),
            seen_commands: 0,
        }
    }

    /// One evaluation tick.
    pub fn step(&mut self) -> TickOutcome {
        self.seen_commands = self.supervisor.command_seq();
        self.supervisor.evaluate_and_act(&mut self.sensors, &self.link)
    }

    /// Sleep until the next tick is due.
    ///
    /// The wait is sliced into `poll_interval` chunks.  Every slice checks
    /// the shutdown flag and returns early when a command has arrived since
    /// the tick.  After an offline tick it also returns once the uplink is
    /// back.
    pub fn wait(&self, outcome: &TickOutcome) -> WakeReason {
        let clock = self.supervisor.clock();
        let poll = self.supervisor.cadence().poll_interval.max(Duration::from_millis(1));
        let mut remaining = outcome.next_interval;

        while !remaining.is_zero() {
            if self.shutdown.load(Ordering::Acquire) {
                return WakeReason::Shutdown;
            }
            let slice = remaining.min(poll);
            clock.sleep(slice);
            remaining -= slice;

            if self.supervisor.command_seq() != self.seen_commands {
                debug!("Command received, evaluating early");
                return WakeReason::Command;
            }

            if outcome.mode == OperatingMode::Offline && self.link.is_connected() {
                info!(
                    "Uplink back, evaluating early ({}s of the offline wait skipped)",
                    remaining.as_secs()
                );
                return WakeReason::Reconnected;
            }
        }
        WakeReason::Elapsed
    }

    /// Tick, wait, repeat until shut down.
    pub fn run(mut self) {
        info!("Evaluation worker running");
        while !self.shutdown.load(Ordering::Acquire) {
            let outcome = self.step();
            if self.wait(&outcome) == WakeReason::Shutdown {
                break;
            }
        }
        info!("Evaluation worker stopped");
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }
}

impl<P, N, K, S, C> EvaluationWorker<P, N, K, S, C>
where
    P: OutputPin + Send + 'static,
    N: NotificationSink + 'static,
    K: ClockPort + 'static,
    S: SensorPort + Send + 'static,
    C: ConnectivityPort + Send + 'static,
{
    /// Move the worker onto its own thread.
    pub fn spawn(self, opts: WorkerOptions) -> std::io::Result<WorkerHandle> {
        let shutdown = self.shutdown_flag();
        let thread = spawn_worker(opts, move || self.run())?;
        Ok(WorkerHandle { shutdown, thread })
    }
}

/// Process-lifecycle handle for a spawned worker.  Stopping the worker
/// does not touch the valves.
pub struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Ask the worker to stop and wait for it.  Returns within one poll
    /// slice (or one tick, if a tick is in progress).
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        if self.thread.join().is_err() {
            error!("Evaluation worker panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}
