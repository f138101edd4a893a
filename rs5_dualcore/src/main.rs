//! # RS5 Dual-Core Host Simulation
//!
//! Runs both controller cores as two host threads sharing nothing but a
//! pair of mailboxes. Core 0 ingests a synthetic DMX stream and drives
//! simulated servos; core 1 runs the status indicator and eye overlay.
//!
//! With the `rt` feature, `--core0-cpu`/`--core1-cpu` pin each thread.

use clap::Parser;
use rs5_common::config::{ConfigError, DeviceConfig, LogLevel};
use rs5_common::consts::SERVO_CHANNELS;
use rs5_dualcore::channel::Mailbox;
use rs5_dualcore::cycle::{
    Core0, Core1, CycleError, CycleStats, DMX_UNIVERSE, DirectServo, DmxFrame, DmxSource,
    FixedSwitch, MillisClock, NullOutput, rt_setup, run_loop,
};
use rs5_dualcore::domain::DeviceState;
use rs5_dualcore::status::StatusSignal;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

const CORE0_PERIOD: Duration = Duration::from_millis(1);
const CORE1_PERIOD: Duration = Duration::from_millis(5);
/// Synthetic DMX packet rate [ms].
const DMX_PACKET_INTERVAL_MS: u32 = 25;

/// RS5 dual-core controller simulation
#[derive(Parser, Debug)]
#[command(name = "rs5_dualcore")]
#[command(version)]
#[command(about = "Runs both RS5 controller cores as host threads")]
struct Args {
    /// Device configuration TOML. Built-in defaults when absent.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop after this many milliseconds (default: run until Ctrl-C).
    #[arg(long, value_name = "MS")]
    duration_ms: Option<u32>,

    /// CPU to pin core 0 to (`rt` feature only).
    #[arg(long)]
    core0_cpu: Option<usize>,

    /// CPU to pin core 1 to (`rt` feature only).
    #[arg(long)]
    core1_cpu: Option<usize>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error("signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("{0} thread panicked")]
    ThreadPanic(&'static str),
}

/// Sweeps every servo slot and steps the eye slot through the profiles.
#[derive(Debug)]
struct SweepDmx {
    servo_start: usize,
    eye_slot: usize,
    last: u32,
    tick: u8,
}

impl SweepDmx {
    fn new(config: &DeviceConfig) -> Self {
        Self {
            servo_start: usize::from(config.system.dmx_address.max(1)) - 1,
            eye_slot: usize::from(config.eyes.dmx_eye_address().max(1)) - 1,
            last: 0,
            tick: 0,
        }
    }
}

impl DmxSource for SweepDmx {
    fn poll(&mut self, now: u32) -> Option<DmxFrame> {
        if now.wrapping_sub(self.last) < DMX_PACKET_INTERVAL_MS {
            return None;
        }
        self.last = now;
        self.tick = self.tick.wrapping_add(1);

        let mut frame = DmxFrame::new();
        frame.resize(DMX_UNIVERSE, 0).ok()?;
        for ch in 0..SERVO_CHANNELS {
            if let Some(slot) = frame.get_mut(self.servo_start + ch) {
                *slot = self.tick.wrapping_add(ch as u8 * 40);
            }
        }
        if let Some(slot) = frame.get_mut(self.eye_slot) {
            // Profile ranges start at 11 in steps of 10.
            *slot = 11 + (self.tick / 64) * 10;
        }
        Some(frame)
    }
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args);
    setup_tracing(&args, config.as_ref().ok().map(|c| c.shared.log_level));

    info!("RS5 dual-core v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(RunError::from)
        .and_then(|config| run(&args, &config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("RS5 dual-core shutdown complete");
}

fn load_config(args: &Args) -> Result<DeviceConfig, ConfigError> {
    match &args.config {
        Some(path) => DeviceConfig::load_validated(path),
        None => Ok(DeviceConfig::default()),
    }
}

fn run(args: &Args, config: &DeviceConfig) -> Result<(), RunError> {
    info!(
        service = %config.shared.service_name,
        licensed = config.system.licensed_channels,
        run_mode = ?config.system.run_mode,
        "config OK"
    );
    if args.config.is_none() {
        warn!("no --config given, using built-in defaults");
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let clock = MillisClock::new();
    let deadline = args.duration_ms.map(|ms| clock.now().wrapping_add(ms));

    let device0 = DeviceState::new(config, clock.now());
    let device1 = DeviceState::new(config, clock.now());
    let mut to_core1 = Mailbox::new();
    let mut to_core0 = Mailbox::new();
    let (tx0, rx1) = to_core1.split(&device0.counters);
    let (tx1, rx0) = to_core0.split(&device1.counters);

    let switch = FixedSwitch {
        run_mode: config.system.run_mode,
        dmx_address: Some(config.system.dmx_address),
    };
    let dmx = SweepDmx::new(config);
    let status = StatusSignal::new(&config.status);

    let (stats0, stats1) = std::thread::scope(|s| {
        let core0 = s.spawn(|| -> Result<CycleStats, CycleError> {
            pin(args.core0_cpu, &running)?;
            let mut core = Core0::new(&device0, tx0, rx0, dmx, switch, DirectServo::default());
            core.start();
            Ok(run_loop(&clock, CORE0_PERIOD, &running, deadline, |now| {
                core.step(now);
            }))
        });
        let core1 = s.spawn(|| -> Result<CycleStats, CycleError> {
            pin(args.core1_cpu, &running)?;
            let mut core = Core1::new(&device1, tx1, rx1, status, NullOutput, NullOutput);
            core.start();
            Ok(run_loop(&clock, CORE1_PERIOD, &running, deadline, |now| {
                core.step(now);
            }))
        });
        (core0.join(), core1.join())
    });
    let stats0 = stats0.map_err(|_| RunError::ThreadPanic("core0"))??;
    let stats1 = stats1.map_err(|_| RunError::ThreadPanic("core1"))??;

    for (name, stats, device) in [("core0", &stats0, &device0), ("core1", &stats1, &device1)] {
        let sync = device.counters.snapshot();
        info!(
            core = name,
            cycles = stats.cycle_count,
            avg_ns = stats.avg_cycle_ns(),
            max_ns = stats.max_cycle_ns,
            overruns = stats.overruns,
            applied = sync.applied,
            framing = sync.framing,
            unlicensed = sync.unlicensed,
            deferred = sync.deferred,
            dropped = sync.dropped,
            boot = ?device.system.boot_phase(),
            "core finished"
        );
    }

    info!(
        run_mode = ?device1.system.run_mode(),
        eye_profile = device1.system.eye_color_profile(),
        dmx_fresh = device1.system.is_dmx_fresh(clock.now()),
        "core1 replica"
    );
    Ok(())
}

/// Pin the calling core thread. A failure stops the other core too.
fn pin(cpu: Option<usize>, running: &AtomicBool) -> Result<(), CycleError> {
    let Some(cpu) = cpu else {
        return Ok(());
    };
    rt_setup(cpu).inspect_err(|_| running.store(false, Ordering::SeqCst))?;
    info!(cpu, "core thread pinned");
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: Option<LogLevel>) {
    let mut filter = EnvFilter::from_default_env();
    if args.verbose {
        filter = filter.add_directive(Level::DEBUG.into());
    } else if let Ok(directive) = configured.unwrap_or_default().as_directive().parse() {
        filter = filter.add_directive(directive);
    }

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
