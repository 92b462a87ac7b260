//! Irrigation simulator: runs the decision core against a simulated field.
//!
//! ```text
//!   SimSensors ─┐                          ┌─▶ LogNotificationSink
//!   SimLink ────┼─▶ IrrigationSupervisor ──┤
//!   SimClock ───┘                          └─▶ ValveActuator<SimValvePin>
//! ```
//!
//! By default time is simulated: every tick jumps the clock forward by the
//! cadence the supervisor asked for, so days of irrigation finish in
//! milliseconds.  `--realtime-secs` instead spawns the evaluation worker on
//! the wall clock for a fixed time.
//!
//! Scenario switches (`--start-at`, `--offline-at`, `--heatwave-at`, ...)
//! are tick indices.  Online the supervisor only recommends, so a run
//! irrigates after `--start-at` or once the uplink drops.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use irrigation::adapters::config_file::TomlConfigStore;
use irrigation::adapters::log_sink::LogNotificationSink;
use irrigation::adapters::sim::{SimEnvironment, SimLink, SimSensors, SimValvePin};
use irrigation::adapters::time::{MonotonicClock, SimClock};
use irrigation::app::commands::IrrigationCommand;
use irrigation::app::ports::{ClockPort, ConfigPort};
use irrigation::app::supervisor::IrrigationSupervisor;
use irrigation::config::IrrigationConfig;
use irrigation::drivers::task_pin::WorkerOptions;
use irrigation::drivers::valve::ValveActuator;
use irrigation::scheduler::EvaluationWorker;

type SimSupervisor<K> = IrrigationSupervisor<SimValvePin, LogNotificationSink, K>;
type SimWorker<K> = EvaluationWorker<SimValvePin, LogNotificationSink, K, SimSensors<K>, SimLink>;

/// Irrigation decision core simulator.
#[derive(Parser, Debug)]
#[command(name = "irrigation-sim")]
#[command(version)]
#[command(about = "Run the irrigation supervisor against a simulated soil field")]
struct Args {
    /// TOML configuration file (defaults are used when absent).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of evaluation ticks to run.
    #[arg(long, default_value_t = 240)]
    ticks: u32,

    /// Initial soil moisture (%).
    #[arg(long, default_value_t = 40.0)]
    soil: f32,

    /// Initial ambient temperature (°C).
    #[arg(long, default_value_t = 24.0)]
    temperature: f32,

    /// Tick at which the uplink drops.
    #[arg(long)]
    offline_at: Option<u32>,

    /// Tick at which the uplink comes back.
    #[arg(long)]
    online_at: Option<u32>,

    /// Tick at which ambient jumps to 41 °C.
    #[arg(long)]
    heatwave_at: Option<u32>,

    /// Ticks the heatwave lasts.
    #[arg(long, default_value_t = 30)]
    heatwave_ticks: u32,

    /// Tick at which an operator START is issued.  Online, the supervisor
    /// only recommends, so this is how an online run irrigates.
    #[arg(long)]
    start_at: Option<u32>,

    /// Session length for `--start-at` (0 = configured default).
    #[arg(long, default_value_t = 0)]
    start_minutes: u16,

    /// Tick at which an emergency stop is issued.
    #[arg(long)]
    estop_at: Option<u32>,

    /// Tick at which the emergency-stop latch is cleared.
    #[arg(long)]
    unlock_at: Option<u32>,

    /// Tick at which the next sensor reads fail.
    #[arg(long)]
    sensor_fault_at: Option<u32>,

    /// Seed for the sensor noise.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Print each evaluation record as a JSON line.
    #[arg(long)]
    json: bool,

    /// Run the worker thread on the wall clock for this many seconds
    /// instead of simulating ticks.
    #[arg(long, value_name = "SECS")]
    realtime_secs: Option<u64>,

    /// Enable DEBUG logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    info!("irrigation-sim v{} starting", env!("CARGO_PKG_VERSION"));
    let config = load_config(args.config.as_ref())?;

    match args.realtime_secs {
        Some(secs) => run_realtime(&args, config, secs),
        None => run_simulated(&args, config),
    }
}

fn setup_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<IrrigationConfig> {
    match path {
        Some(path) => TomlConfigStore::new(path)
            .load()
            .with_context(|| format!("failed to load config: {}", path.display())),
        None => Ok(IrrigationConfig::default()),
    }
}

// ── Rig ───────────────────────────────────────────────────────

struct Rig<K> {
    supervisor: Arc<SimSupervisor<K>>,
    worker: SimWorker<K>,
    env: SimEnvironment,
    link: SimLink,
}

fn build_rig<K: ClockPort + Clone>(args: &Args, config: IrrigationConfig, clock: K) -> Result<Rig<K>> {
    let pins: Vec<SimValvePin> = (0..config.valve_count).map(|_| SimValvePin::new()).collect();
    let watering = pins
        .get(config.primary_valve as usize)
        .cloned()
        .context("primary valve is not wired")?;
    let valves = ValveActuator::new(pins, config.valve_active_low)?;

    let env = SimEnvironment::new(args.soil, args.temperature);
    let link = SimLink::new(true);
    let sensors = SimSensors::new(env.clone(), watering, clock.clone(), args.seed);

    let supervisor = Arc::new(IrrigationSupervisor::new(
        config,
        valves,
        LogNotificationSink::new(),
        clock,
    )?);
    let worker = EvaluationWorker::new(Arc::clone(&supervisor), sensors, link.clone());
    Ok(Rig {
        supervisor,
        worker,
        env,
        link,
    })
}

// ── Simulated time ────────────────────────────────────────────

fn run_simulated(args: &Args, config: IrrigationConfig) -> Result<()> {
    let clock = SimClock::new();
    let Rig {
        supervisor,
        mut worker,
        env,
        link,
    } = build_rig(args, config, clock.clone())?;

    for tick in 0..args.ticks {
        apply_scenario(args, tick, &supervisor, &env, &link);

        let outcome = worker.step();
        if args.json {
            println!("{}", serde_json::to_string(&outcome.record)?);
        } else {
            println!(
                "t={:>7}s tick={tick:>4} {:<18} {:<7} soil={:>5.1}% T={:>4.1}\u{00b0}C {:?}{}",
                clock.now_ms() / 1000,
                outcome.state.as_str(),
                outcome.mode.to_string(),
                outcome.record.soil_avg,
                outcome.record.temperature,
                outcome.record.decision,
                outcome
                    .record
                    .blocked_by
                    .map(|e| format!(" blocked: {e}"))
                    .unwrap_or_default(),
            );
        }
        worker.wait(&outcome);
    }

    println!("{}", serde_json::to_string_pretty(&supervisor.get_status())?);
    Ok(())
}

fn apply_scenario<K: ClockPort>(
    args: &Args,
    tick: u32,
    supervisor: &SimSupervisor<K>,
    env: &SimEnvironment,
    link: &SimLink,
) {
    let at = |opt: Option<u32>| opt == Some(tick);

    if at(args.offline_at) {
        info!("SCENARIO: uplink down");
        link.set_connected(false);
    }
    if at(args.online_at) {
        info!("SCENARIO: uplink up");
        link.set_connected(true);
    }
    if at(args.heatwave_at) {
        info!("SCENARIO: heatwave");
        env.set_temperature(41.0);
    }
    if args
        .heatwave_at
        .is_some_and(|start| tick == start.saturating_add(args.heatwave_ticks))
    {
        info!("SCENARIO: heatwave over");
        env.set_temperature(args.temperature);
    }
    if at(args.sensor_fault_at) {
        info!("SCENARIO: sensor fault");
        env.fail_reads(3);
    }
    if at(args.start_at) {
        info!("SCENARIO: operator start ({} min)", args.start_minutes);
        // Rejections are logged by the supervisor.
        let _ = supervisor.execute_command(IrrigationCommand::Start, args.start_minutes);
    }
    if at(args.estop_at) {
        info!("SCENARIO: emergency stop");
        // Emergency stop never fails; the result is logged by the supervisor.
        let _ = supervisor.execute_command(IrrigationCommand::EmergencyStop, 0);
    }
    if at(args.unlock_at) {
        info!("SCENARIO: unlock");
        supervisor.clear_safety_lock();
    }
}

// ── Wall-clock time ───────────────────────────────────────────

fn run_realtime(args: &Args, config: IrrigationConfig, secs: u64) -> Result<()> {
    let Rig {
        supervisor, worker, ..
    } = build_rig(args, config, MonotonicClock::new())?;

    let handle = worker
        .spawn(WorkerOptions::default())
        .context("failed to spawn evaluation worker")?;
    std::thread::sleep(Duration::from_secs(secs));
    handle.shutdown();

    println!("{}", serde_json::to_string_pretty(&supervisor.get_status())?);
    Ok(())
}
