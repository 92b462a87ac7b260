//! Evaluation worker: tick loop, chunked waits, early wake and shutdown.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::mock_hw::Rig;

use irrigation::app::commands::IrrigationCommand;
use irrigation::app::ports::ClockPort;
use irrigation::app::status::{Decision, StopReason};
use irrigation::drivers::task_pin::WorkerOptions;
use irrigation::fsm::IrrigationState;
use irrigation::offline::OfflineLevel;
use irrigation::scheduler::{EvaluationWorker, WakeReason};

#[test]
fn online_wait_sleeps_the_full_interval() {
    let rig = Rig::with_defaults();
    let mut worker = EvaluationWorker::new(Arc::clone(&rig.sup), rig.sensors.clone(), rig.link.clone());

    let out = worker.step();
    let before = rig.clock.now_ms();
    assert_eq!(worker.wait(&out), WakeReason::Elapsed);
    assert_eq!(rig.clock.now_ms() - before, 60_000);
}

#[test]
fn reconnect_cuts_an_offline_wait_short() {
    let rig = Rig::with_defaults();
    rig.link.set_connected(false);
    let mut worker = EvaluationWorker::new(Arc::clone(&rig.sup), rig.sensors.clone(), rig.link.clone());

    for _ in 0..10 {
        let out = worker.step();
        assert_eq!(worker.wait(&out), WakeReason::Elapsed);
    }
    let out = worker.step();
    assert_eq!(out.next_interval, Duration::from_secs(2 * 60 * 60));

    rig.link.set_connected(true);
    let before = rig.clock.now_ms();
    assert_eq!(worker.wait(&out), WakeReason::Reconnected);
    assert_eq!(rig.clock.now_ms() - before, 10_000, "one poll slice");
}

#[test]
fn command_cuts_a_long_wait_short() {
    let rig = Rig::with_defaults();
    rig.link.set_connected(false);
    let mut worker = EvaluationWorker::new(Arc::clone(&rig.sup), rig.sensors.clone(), rig.link.clone());

    for _ in 0..10 {
        let out = worker.step();
        worker.wait(&out);
    }
    let out = worker.step();
    assert_eq!(out.next_interval, Duration::from_secs(2 * 60 * 60));

    rig.sup.execute_command(IrrigationCommand::Start, 5).unwrap();
    let before = rig.clock.now_ms();
    assert_eq!(worker.wait(&out), WakeReason::Command);
    assert_eq!(rig.clock.now_ms() - before, 10_000, "one poll slice");

    let out = worker.step();
    assert_eq!(out.state, IrrigationState::Active);
    assert_eq!(out.next_interval, Duration::from_secs(60));
}

#[test]
fn offline_auto_session_never_outlives_its_plan() {
    let rig = Rig::with_defaults();
    rig.link.set_connected(false);
    rig.sensors.set_soil(50.0);
    let mut worker = EvaluationWorker::new(Arc::clone(&rig.sup), rig.sensors.clone(), rig.link.clone());

    for _ in 0..10 {
        let out = worker.step();
        assert_eq!(worker.wait(&out), WakeReason::Elapsed);
    }

    rig.sensors.set_soil(36.0);
    let mut out = worker.step();
    assert_eq!(out.state, IrrigationState::Active);
    assert_eq!(out.record.offline_level, OfflineLevel::Critical);
    let planned = rig.sup.get_status().planned_session_seconds;

    for _ in 0..100 {
        if out.state != IrrigationState::Active {
            break;
        }
        assert_eq!(worker.wait(&out), WakeReason::Elapsed);
        out = worker.step();
    }

    assert_eq!(out.record.decision, Decision::Stop(StopReason::DurationElapsed));
    let runtime = rig.sup.get_status().stats.today_runtime_seconds;
    assert!(runtime <= planned, "valve open {runtime}s, planned {planned}s");
    assert_eq!(runtime, 15 * 60);
}

#[test]
fn shutdown_flag_interrupts_wait() {
    let rig = Rig::with_defaults();
    let mut worker = EvaluationWorker::new(Arc::clone(&rig.sup), rig.sensors.clone(), rig.link.clone());
    let out = worker.step();

    worker.shutdown_flag().store(true, Ordering::Release);
    let before = rig.clock.now_ms();
    assert_eq!(worker.wait(&out), WakeReason::Shutdown);
    assert_eq!(rig.clock.now_ms(), before);
}

#[test]
fn spawned_worker_ticks_and_stops() {
    let rig = Rig::with_defaults();
    let worker = EvaluationWorker::new(Arc::clone(&rig.sup), rig.sensors.clone(), rig.link.clone());
    let handle = worker
        .spawn(WorkerOptions {
            name: "irr-test\0",
            ..WorkerOptions::default()
        })
        .unwrap();

    while rig.sup.get_status().last_evaluation.is_none() {
        std::thread::sleep(Duration::from_millis(1));
    }
    rig.sup
        .execute_command(IrrigationCommand::EmergencyStop, 0)
        .unwrap();
    std::thread::sleep(Duration::from_millis(10));
    handle.shutdown();

    assert_eq!(rig.sup.get_state(), IrrigationState::EmergencyStop);
    assert!(!rig.valve_open());
}

#[test]
fn stopping_the_worker_leaves_valves_alone() {
    let rig = Rig::with_defaults();
    rig.sup.execute_command(IrrigationCommand::Start, 15).unwrap();

    let worker = EvaluationWorker::new(Arc::clone(&rig.sup), rig.sensors.clone(), rig.link.clone());
    let shutdown = worker.shutdown_flag();
    shutdown.store(true, Ordering::Release);
    worker.run();

    assert!(rig.valve_open());
    assert_eq!(rig.sup.get_state(), IrrigationState::Active);
}
