//! End-to-end irrigation scenarios: sensors → supervisor → valves → sink.

use crate::mock_hw::Rig;

use irrigation::app::commands::IrrigationCommand;
use irrigation::app::status::{Decision, OperatingMode, StopReason};
use irrigation::error::IrrigationError;
use irrigation::fsm::IrrigationState;
use irrigation::offline::OfflineLevel;

// ── Dry soil: online recommends, commands act ────────────────

#[test]
fn dry_soil_online_only_recommends() {
    let mut rig = Rig::with_defaults();
    rig.sensors.set_soil(30.0);

    let out = rig.tick();

    assert_eq!(out.state, IrrigationState::Idle);
    assert_eq!(out.record.decision, Decision::Start);
    assert!(!out.record.executed);
    assert!(!rig.valve_open());
    assert!(rig.sink.events().is_empty());

    let stored = rig.sup.get_status().last_evaluation.unwrap();
    assert_eq!(stored.decision, Decision::Start);
}

#[test]
fn moist_soil_holds() {
    let mut rig = Rig::with_defaults();
    rig.sensors.set_soil(50.0);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Idle);
    assert_eq!(out.record.decision, Decision::Hold);
    assert!(!rig.valve_open());
    assert!(rig.sink.events().is_empty());
}

#[test]
fn start_command_acts_on_recommendation() {
    let mut rig = Rig::with_defaults();
    rig.sensors.set_soil(30.0);
    rig.tick();

    rig.sup.execute_command(IrrigationCommand::Start, 0).unwrap();

    assert_eq!(rig.sup.get_state(), IrrigationState::Active);
    assert!(rig.valve_open());
    assert_eq!(rig.sink.events(), ["irrigation_on"]);
    let sent = rig.sink.last().unwrap();
    assert!((sent.soil_avg - 30.0).abs() < 1e-4);
    assert!((sent.temperature - 22.0).abs() < 1e-4);

    rig.advance_mins(1);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Active);
    assert_eq!(out.record.decision, Decision::Continue);
}

// ── Scenario B: a saturated probe forces a stop ──────────────

#[test]
fn saturated_probe_stops_session() {
    let mut rig = Rig::with_defaults();
    rig.sensors.set_soil(30.0);
    rig.sup.execute_command(IrrigationCommand::Start, 15).unwrap();
    assert!(rig.valve_open());

    rig.advance_mins(1);
    rig.sensors.set_probes([50.0, 50.0, 82.0]);
    let out = rig.tick();

    assert_eq!(out.state, IrrigationState::Idle);
    assert_eq!(out.record.decision, Decision::Stop(StopReason::OverMoisture));
    assert!(out.record.alerts.overmoisture());
    assert!(!rig.valve_open());
    assert_eq!(rig.sink.events(), ["irrigation_on", "irrigation_off"]);

    let status = rig.sup.get_status();
    assert_eq!(status.stats.last_stop_reason, Some(StopReason::OverMoisture));
    assert_eq!(status.stats.today_runtime_seconds, 60);
}

#[test]
fn saturated_probe_stops_even_under_override() {
    let mut rig = Rig::with_defaults();
    rig.sensors.set_soil(50.0);
    rig.sup.execute_command(IrrigationCommand::Start, 10).unwrap();

    rig.advance_mins(1);
    rig.sensors.set_soil(85.0);
    let out = rig.tick();

    assert_eq!(out.state, IrrigationState::Idle);
    assert!(!rig.valve_open());
}

// ── Scenario C: heat stops and later releases ────────────────

#[test]
fn heat_enters_and_leaves_thermal_protection() {
    let mut rig = Rig::with_defaults();
    rig.sensors.set_soil(30.0);
    rig.sup.execute_command(IrrigationCommand::Start, 15).unwrap();

    rig.advance_mins(1);
    rig.sensors.set_temperature(41.0);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::ThermalProtection);
    assert!(!rig.valve_open());
    assert_eq!(
        rig.sup.get_status().stats.last_stop_reason,
        Some(StopReason::ThermalCritical)
    );
    assert_eq!(
        rig.sink.events(),
        ["irrigation_on", "irrigation_off", "thermal_protection"]
    );

    assert_eq!(
        rig.sup.execute_command(IrrigationCommand::Start, 5),
        Err(IrrigationError::ThermalProtection)
    );

    // Between warning and thermal-stop: still held.
    rig.advance_mins(1);
    rig.sensors.set_temperature(35.0);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::ThermalProtection);
    assert_eq!(out.record.blocked_by, Some(IrrigationError::ThermalProtection));

    rig.advance_mins(1);
    rig.sensors.set_temperature(30.0);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Idle);
    assert!(!rig.sup.get_status().thermal_protection_active);

    // Soil is still dry, but the inter-session pause applies.
    rig.advance_mins(1);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Idle);
    assert!(matches!(
        out.record.blocked_by,
        Some(IrrigationError::IntervalNotElapsed { .. })
    ));
}

// ── Scenario D: emergency stop latches ───────────────────────

#[test]
fn emergency_stop_closes_and_latches() {
    let mut rig = Rig::with_defaults();
    rig.sensors.set_soil(30.0);
    rig.sup.execute_command(IrrigationCommand::Start, 15).unwrap();
    assert!(rig.valve_open());

    rig.sup
        .execute_command(IrrigationCommand::EmergencyStop, 0)
        .unwrap();

    assert!(!rig.valve_open());
    let status = rig.sup.get_status();
    assert_eq!(status.state, IrrigationState::EmergencyStop);
    assert!(status.safety_lock);
    assert_eq!(status.valve_bitmask, 0);
    assert_eq!(status.stats.last_stop_reason, Some(StopReason::EmergencyStop));
    assert_eq!(
        rig.sink.events(),
        ["irrigation_on", "irrigation_off", "emergency_stop"]
    );

    assert_eq!(
        rig.sup.execute_command(IrrigationCommand::Start, 5),
        Err(IrrigationError::SafetyLocked)
    );

    // Ticks do not release the latch.
    rig.advance_mins(45);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::EmergencyStop);
    assert_eq!(out.record.blocked_by, Some(IrrigationError::SafetyLocked));
    assert!(!rig.valve_open());

    assert!(rig.sup.clear_safety_lock());
    assert_eq!(rig.sup.get_state(), IrrigationState::Idle);
    assert_eq!(rig.sup.execute_command(IrrigationCommand::Start, 5), Ok(()));
    assert!(rig.valve_open());
}

#[test]
fn repeated_emergency_stop_is_harmless() {
    let rig = Rig::with_defaults();
    rig.sup.execute_command(IrrigationCommand::EmergencyStop, 0).unwrap();
    rig.sup.execute_command(IrrigationCommand::EmergencyStop, 0).unwrap();
    assert_eq!(rig.sup.get_state(), IrrigationState::EmergencyStop);
    assert!(!rig.valve_open());
}

// ── Commands ─────────────────────────────────────────────────

#[test]
fn stop_is_idempotent() {
    let rig = Rig::with_defaults();
    assert_eq!(rig.sup.execute_command(IrrigationCommand::Stop, 0), Ok(()));
    assert!(rig.sink.events().is_empty());

    rig.sup.execute_command(IrrigationCommand::Start, 5).unwrap();
    rig.advance_mins(2);
    rig.sup.execute_command(IrrigationCommand::Stop, 0).unwrap();
    rig.sup.execute_command(IrrigationCommand::Stop, 0).unwrap();

    assert!(!rig.valve_open());
    assert_eq!(rig.sink.count("irrigation_off"), 1);
    let status = rig.sup.get_status();
    assert_eq!(status.stats.last_stop_reason, Some(StopReason::ManualStop));
    assert_eq!(status.stats.today_runtime_seconds, 120);
}

#[test]
fn start_stop_round_trip_returns_valve_closed() {
    let rig = Rig::with_defaults();
    rig.sup.execute_command(IrrigationCommand::Start, 5).unwrap();
    assert!(rig.valve_open());
    assert_eq!(rig.sup.get_status().active_valve, Some(0));
    rig.sup.execute_command(IrrigationCommand::Stop, 0).unwrap();
    assert!(!rig.valve_open());
    assert_eq!(rig.sup.get_status().valve_bitmask, 0);
}

#[test]
fn start_duration_is_clamped_and_defaulted() {
    let rig = Rig::with_defaults();
    rig.sup.execute_command(IrrigationCommand::Start, 90).unwrap();
    assert_eq!(rig.sup.get_status().planned_session_seconds, 15 * 60);
    rig.sup.execute_command(IrrigationCommand::Start, 0).unwrap();
    assert_eq!(rig.sup.get_status().planned_session_seconds, 15 * 60);
    rig.sup.execute_command(IrrigationCommand::Start, 4).unwrap();
    assert_eq!(rig.sup.get_status().planned_session_seconds, 4 * 60);
}

#[test]
fn planned_duration_ends_session() {
    let mut rig = Rig::with_defaults();
    rig.sup.execute_command(IrrigationCommand::Start, 5).unwrap();

    rig.advance_mins(4);
    assert_eq!(rig.tick().state, IrrigationState::Active);

    rig.advance_mins(1);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Idle);
    assert_eq!(out.record.decision, Decision::Stop(StopReason::DurationElapsed));
    assert_eq!(rig.sup.get_status().stats.today_runtime_seconds, 300);
}

#[test]
fn minimum_interval_rejects_early_start() {
    let rig = Rig::with_defaults();
    rig.sup.execute_command(IrrigationCommand::Start, 5).unwrap();
    rig.advance_mins(5);
    rig.sup.execute_command(IrrigationCommand::Stop, 0).unwrap();

    rig.advance_mins(10);
    assert_eq!(
        rig.sup.execute_command(IrrigationCommand::Start, 5),
        Err(IrrigationError::IntervalNotElapsed {
            remaining_secs: 20 * 60
        })
    );
    assert_eq!(rig.sup.get_state(), IrrigationState::Idle);

    rig.advance_mins(20);
    assert_eq!(rig.sup.execute_command(IrrigationCommand::Start, 5), Ok(()));
}

#[test]
fn daily_cap_stops_and_rejects_until_next_day() {
    let mut rig = Rig::new(irrigation::IrrigationConfig {
        max_daily_minutes: 30,
        ..irrigation::IrrigationConfig::default()
    });

    rig.sup.execute_command(IrrigationCommand::Start, 15).unwrap();
    rig.advance_mins(15);
    let out = rig.tick();
    assert_eq!(out.record.decision, Decision::Stop(StopReason::DurationElapsed));

    rig.advance_mins(30);
    rig.sup.execute_command(IrrigationCommand::Start, 15).unwrap();
    rig.advance_mins(15);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Idle);
    assert_eq!(out.record.decision, Decision::Stop(StopReason::DailyLimit));
    assert_eq!(rig.sup.get_status().stats.today_runtime_seconds, 30 * 60);

    rig.advance_mins(30);
    assert_eq!(
        rig.sup.execute_command(IrrigationCommand::Start, 5),
        Err(IrrigationError::DailyLimitReached)
    );

    rig.advance_mins(24 * 60);
    assert_eq!(rig.sup.execute_command(IrrigationCommand::Start, 5), Ok(()));
    let status = rig.sup.get_status();
    assert_eq!(status.stats.today_runtime_seconds, 0);
    assert_eq!(status.stats.total_runtime_seconds, 30 * 60);
    assert_eq!(status.stats.session_count, 3);
}

#[test]
fn start_rejected_while_sensors_fail() {
    let mut rig = Rig::with_defaults();
    rig.sensors.fail(true);
    rig.tick();
    assert_eq!(rig.sup.get_state(), IrrigationState::Error);
    assert_eq!(
        rig.sup.execute_command(IrrigationCommand::Start, 5),
        Err(IrrigationError::SensorFault)
    );
}

// ── Autonomous stops ─────────────────────────────────────────

#[test]
fn target_reached_stops_offline_session() {
    let mut rig = Rig::with_defaults();
    rig.link.set_connected(false);
    rig.sensors.set_soil(30.0);
    assert_eq!(rig.tick().state, IrrigationState::Active);

    rig.advance_mins(3);
    rig.sensors.set_soil(62.0);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Idle);
    assert_eq!(out.record.decision, Decision::Stop(StopReason::TargetReached));
    assert!(out.record.executed);
}

#[test]
fn target_reached_is_only_recommended_online() {
    let mut rig = Rig::with_defaults();
    rig.sup.execute_command(IrrigationCommand::Start, 10).unwrap();

    rig.advance_mins(3);
    rig.sensors.set_soil(62.0);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Active);
    assert_eq!(out.record.decision, Decision::Stop(StopReason::TargetReached));
    assert!(!out.record.executed);
    assert!(rig.valve_open());
}

#[test]
fn sensor_failure_closes_valve_and_recovers() {
    let mut rig = Rig::with_defaults();
    rig.sensors.set_soil(30.0);
    rig.sup.execute_command(IrrigationCommand::Start, 15).unwrap();

    rig.advance_mins(1);
    rig.sensors.fail(true);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Error);
    assert!(!out.record.sensor_ok);
    assert!(!rig.valve_open());
    assert_eq!(
        rig.sink.events(),
        ["irrigation_on", "irrigation_off", "sensor_error"]
    );
    assert_eq!(
        rig.sup.get_status().stats.last_stop_reason,
        Some(StopReason::SensorError)
    );

    rig.advance_mins(1);
    rig.sensors.fail(false);
    rig.sensors.set_soil(50.0);
    assert_eq!(rig.tick().state, IrrigationState::Idle);
}

// ── Scenario A and offline operation ─────────────────────────

#[test]
fn offline_emergency_level_opens_valve() {
    let mut rig = Rig::with_defaults();
    rig.link.set_connected(false);
    rig.sensors.set_soil(20.0);

    let out = rig.tick();

    assert_eq!(out.mode, OperatingMode::Offline);
    assert_eq!(out.record.offline_level, OfflineLevel::Emergency);
    assert_eq!(out.record.offline_level.interval_ms(), 900_000);
    assert_eq!(out.state, IrrigationState::Active);
    assert!(out.record.executed);
    assert!(rig.valve_open());
}

#[test]
fn offline_critical_level_irrigates_above_online_threshold() {
    let mut rig = Rig::with_defaults();
    rig.sensors.set_soil(37.0);

    assert_eq!(rig.tick().state, IrrigationState::Idle, "online: 37% is not dry");

    rig.advance_mins(1);
    rig.link.set_connected(false);
    let out = rig.tick();
    assert_eq!(out.mode, OperatingMode::Offline);
    assert_eq!(out.record.offline_level, OfflineLevel::Critical);
    assert!(out.record.offline_reason.is_some());
    assert_eq!(out.state, IrrigationState::Active);
    assert!(rig.valve_open());
}

#[test]
fn offline_mode_disabled_only_recommends() {
    let mut rig = Rig::new(irrigation::IrrigationConfig {
        offline_mode_enabled: false,
        ..irrigation::IrrigationConfig::default()
    });
    rig.link.set_connected(false);
    rig.sensors.set_soil(20.0);

    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Idle);
    assert_eq!(out.record.decision, Decision::Start);
    assert!(!out.record.executed);
    assert!(!rig.valve_open());
}

#[test]
fn offline_cadence_widens_after_stabilisation() {
    let mut rig = Rig::with_defaults();
    rig.link.set_connected(false);
    rig.sensors.set_soil(50.0);

    for tick in 1..=10 {
        let out = rig.tick();
        assert_eq!(out.next_interval.as_secs(), 60, "tick {tick}");
        rig.advance_mins(1);
    }
    let out = rig.tick();
    assert_eq!(out.record.offline_level, OfflineLevel::Normal);
    assert_eq!(out.next_interval.as_secs(), 2 * 60 * 60);
    assert_eq!(rig.sup.get_status().consecutive_offline_ticks, 11);

    rig.link.set_connected(true);
    let out = rig.tick();
    assert_eq!(out.mode, OperatingMode::Online);
    assert_eq!(out.next_interval.as_secs(), 60);
    assert_eq!(rig.sup.get_status().consecutive_offline_ticks, 0);
}

#[test]
fn offline_session_is_supervised_every_minute() {
    let mut rig = Rig::with_defaults();
    rig.link.set_connected(false);
    rig.sensors.set_soil(50.0);
    for _ in 0..10 {
        let out = rig.tick();
        rig.clock.advance(out.next_interval);
    }

    rig.sensors.set_soil(36.0);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Active);
    assert_eq!(out.record.offline_level, OfflineLevel::Critical);
    assert_eq!(out.next_interval.as_secs(), 60, "not the 30 min level interval");

    rig.advance_mins(14);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Active);
    assert_eq!(out.next_interval.as_secs(), 60);

    rig.advance_mins(1);
    let out = rig.tick();
    assert_eq!(out.record.decision, Decision::Stop(StopReason::DurationElapsed));
    assert_eq!(rig.sup.get_status().stats.today_runtime_seconds, 15 * 60);
    assert_eq!(out.next_interval.as_secs(), 30 * 60);
}

#[test]
fn daily_cap_holds_at_offline_cadence() {
    let mut rig = Rig::new(irrigation::IrrigationConfig {
        max_daily_minutes: 20,
        ..irrigation::IrrigationConfig::default()
    });
    rig.link.set_connected(false);
    rig.sensors.set_soil(20.0);

    let mut stops = Vec::new();
    for _ in 0..60 {
        let out = rig.tick();
        if let Decision::Stop(reason) = out.record.decision {
            if out.record.executed {
                stops.push(reason);
            }
        }
        assert!(rig.sup.get_status().stats.today_runtime_seconds <= 20 * 60);
        rig.clock.advance(out.next_interval);
    }

    assert_eq!(stops, [StopReason::DurationElapsed, StopReason::DailyLimit]);
    let status = rig.sup.get_status();
    assert_eq!(status.stats.today_runtime_seconds, 20 * 60);
    assert_eq!(status.stats.session_count, 2);
    assert_eq!(
        status.last_evaluation.unwrap().blocked_by,
        Some(IrrigationError::DailyLimitReached)
    );
}

#[test]
fn offline_session_stops_on_target_despite_earlier_override() {
    let mut rig = Rig::with_defaults();
    rig.sup.execute_command(IrrigationCommand::Start, 10).unwrap();
    rig.link.set_connected(false);

    rig.advance_mins(2);
    rig.sensors.set_soil(65.0);
    let out = rig.tick();
    assert_eq!(out.state, IrrigationState::Idle);
    assert_eq!(out.record.decision, Decision::Stop(StopReason::TargetReached));
}

// ── Status and notifications ─────────────────────────────────

#[test]
fn status_serialises_for_diagnostics() {
    let mut rig = Rig::with_defaults();
    rig.sensors.set_soil(30.0);
    rig.tick();
    rig.sup.execute_command(IrrigationCommand::Start, 0).unwrap();

    let json = serde_json::to_value(rig.sup.get_status()).unwrap();
    assert_eq!(json["state"], "ACTIVE");
    assert_eq!(json["mode"], "ONLINE");
    assert_eq!(json["is_irrigating"], true);
    assert_eq!(json["valve_bitmask"], 1);
    assert_eq!(json["last_evaluation"]["decision"]["action"], "start");
}

#[test]
fn failing_sink_never_changes_state() {
    let mut rig = Rig::with_defaults();
    rig.sink.reject_all(true);
    rig.sensors.set_soil(30.0);

    assert_eq!(rig.sup.execute_command(IrrigationCommand::Start, 0), Ok(()));
    let out = rig.tick();

    assert_eq!(out.state, IrrigationState::Active);
    assert!(rig.valve_open());
    assert_eq!(rig.sink.events(), ["irrigation_on"]);
}
