//! Valve bank driver and worker-thread helpers.

pub mod task_pin;
pub mod valve;
