//! Worker thread spawning with an optional core-affinity hint.
//!
//! On ESP-IDF `std::thread` is built on pthreads, which are thin wrappers
//! around FreeRTOS tasks.  `esp_pthread_set_cfg()` sets thread-local
//! configuration for the *next* `pthread_create()` from the calling thread,
//! so the config→spawn pair must not interleave with other thread creation
//! on the same thread.
//!
//! Everywhere else core, priority and stack size are ignored: affinity is
//! a performance hint, never a correctness requirement.

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers for the ESP32 dual-core parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): protocol stacks (WiFi, lwIP).
    Pro = 0,
    /// Core 1 (APP_CPU): application logic.
    App = 1,
}

/// How to spawn a worker.
#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    /// Thread name.  Must be NUL-terminated for ESP-IDF, e.g. `"irr-eval\0"`.
    pub name: &'static str,
    /// Pin to this core when the platform supports it.
    pub core: Option<Core>,
    pub priority: u8,
    pub stack_kb: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            name: "irr-eval\0",
            core: Some(Core::App),
            priority: 5,
            stack_kb: 8,
        }
    }
}

impl WorkerOptions {
    fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub fn spawn_worker(
    opts: WorkerOptions,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    if !opts.name.ends_with('\0') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "worker name must be NUL-terminated",
        ));
    }

    unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = opts.core.map_or(-1, |c| c as i32);
        cfg.prio = opts.priority as i32;
        cfg.stack_size = (opts.stack_kb * 1024) as i32;
        cfg.thread_name = opts.name.as_ptr() as *const _;
        let ret = esp_idf_sys::esp_pthread_set_cfg(&cfg);
        if ret != esp_idf_sys::ESP_OK as i32 {
            return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
        }
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        opts.display_name(),
        opts.core,
        opts.priority,
        opts.stack_kb
    );

    std::thread::Builder::new()
        .name(opts.display_name().into())
        .spawn(f)
}

/// Host fallback: core, priority and stack size are ignored.
#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub fn spawn_worker(
    opts: WorkerOptions,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    log::info!("Spawning '{}' (no core pinning)", opts.display_name());

    std::thread::Builder::new()
        .name(opts.display_name().into())
        .spawn(f)
}
