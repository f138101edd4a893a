//! Per-core loop drivers.
//!
//! Core 0 is the time-critical side: boot steps, DMX ingestion, servo limit
//! enforcement and runtime publication. Core 1 is the ancillary side: boot
//! steps, status indicator and eye overlay. Each `step` is one non-blocking
//! loop iteration; only lock-domain acquisition may wait.
//!
//! Hardware sits behind small collaborator traits so the loops run against
//! real drivers or the host simulation in `main.rs`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rs5_common::consts::SERVO_CHANNELS;
use rs5_common::eyes::Rgb;
use rs5_common::record::fields::{ServoRuntimeField, SystemField};
use rs5_common::record::{Address, ArrayIdent, Record, SystemChange, Value};
use rs5_common::state::{BootPhase, CoreId, DebugLevel, RunMode};
use rs5_common::status::StatusColor;
use tracing::{debug, info, trace};

use crate::boot::{BootSequencer, BootStep, announce};
use crate::channel::{ChannelRx, ChannelTx, DrainReport};
use crate::domain::{DeviceState, SystemTimer};
use crate::status::{StatusBlinker, StatusSignal};

/// Slots in one DMX universe.
pub const DMX_UNIVERSE: usize = 512;

/// Slot values of one DMX packet, slot 1 at index 0.
pub type DmxFrame = heapless::Vec<u8, DMX_UNIVERSE>;

// ─── Collaborators ──────────────────────────────────────────────────

/// Decoded DMX packets.
pub trait DmxSource {
    /// Latest complete packet received since the last call, if any.
    fn poll(&mut self, now: u32) -> Option<DmxFrame>;
}

/// Dip switches.
pub trait ModeSwitch {
    /// Raw run-mode switch bits.
    fn run_mode_bits(&mut self) -> u8;
    /// Servo DMX start address, if the address switches are fitted.
    fn dmx_address(&mut self) -> Option<u16>;
}

/// Servo output stage. Motion shaping happens behind this trait.
pub trait ServoDriver {
    /// Drive toward `target_deg`; returns the position reached.
    fn drive(&mut self, channel: usize, target_deg: f32, pulse_us: f32) -> f32;
    /// Stop PWM on a sleeping or unlicensed channel.
    fn disable(&mut self, channel: usize);
}

/// Board status LED.
pub trait Indicator {
    fn show(&mut self, color: StatusColor);
}

/// Eye overlay pixel.
pub trait EyePixel {
    fn show(&mut self, color: Rgb, brightness: u8);
}

/// No DMX hardware.
#[derive(Debug, Default)]
pub struct NoDmx;

impl DmxSource for NoDmx {
    fn poll(&mut self, _now: u32) -> Option<DmxFrame> {
        None
    }
}

/// Switches held at fixed settings.
#[derive(Debug, Clone, Copy)]
pub struct FixedSwitch {
    pub run_mode: RunMode,
    pub dmx_address: Option<u16>,
}

impl ModeSwitch for FixedSwitch {
    fn run_mode_bits(&mut self) -> u8 {
        self.run_mode as u8
    }

    fn dmx_address(&mut self) -> Option<u16> {
        self.dmx_address
    }
}

/// Reaches every target in one step.
#[derive(Debug, Default)]
pub struct DirectServo {
    pub pulses: [f32; SERVO_CHANNELS],
}

impl ServoDriver for DirectServo {
    fn drive(&mut self, channel: usize, target_deg: f32, pulse_us: f32) -> f32 {
        if let Some(p) = self.pulses.get_mut(channel) {
            *p = pulse_us;
        }
        target_deg
    }

    fn disable(&mut self, channel: usize) {
        if let Some(p) = self.pulses.get_mut(channel) {
            *p = 0.0;
        }
    }
}

/// Discards output.
#[derive(Debug, Default)]
pub struct NullOutput;

impl Indicator for NullOutput {
    fn show(&mut self, _color: StatusColor) {}
}

impl EyePixel for NullOutput {
    fn show(&mut self, _color: Rgb, _brightness: u8) {}
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-iteration timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total iterations executed.
    pub cycle_count: u64,
    /// Last iteration duration [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Iterations that ran past their period.
    pub overruns: u64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, duration_ns: i64, period_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        if duration_ns > period_ns {
            self.overruns += 1;
        }
    }

    /// Average iteration time [ns] (0 if none).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

// ─── Host Setup ─────────────────────────────────────────────────────

/// Loop driver errors.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// Thread placement failed.
    #[error("RT setup failed: {0}")]
    RtSetup(String),
}

/// Pin the calling thread to `cpu`.
///
/// No-op when the `rt` feature is not enabled.
#[cfg(feature = "rt")]
pub fn rt_setup(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
pub fn rt_setup(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

/// Wrapping millisecond clock shared by both cores.
#[derive(Debug, Clone, Copy)]
pub struct MillisClock {
    origin: Instant,
}

impl Default for MillisClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MillisClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds since creation, wrapping at `u32::MAX`.
    #[inline]
    pub fn now(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }
}

/// Run `step` every `period` until `running` clears or `deadline_ms`
/// passes.
pub fn run_loop(
    clock: &MillisClock,
    period: Duration,
    running: &AtomicBool,
    deadline_ms: Option<u32>,
    mut step: impl FnMut(u32),
) -> CycleStats {
    let mut stats = CycleStats::new();
    let period_ns = period.as_nanos() as i64;
    while running.load(Ordering::Relaxed) {
        let now = clock.now();
        if deadline_ms.is_some_and(|d| now >= d) {
            break;
        }
        let start = Instant::now();
        step(now);
        let elapsed = start.elapsed();
        stats.record(elapsed.as_nanos() as i64, period_ns);
        if let Some(remaining) = period.checked_sub(elapsed) {
            std::thread::sleep(remaining);
        }
    }
    stats
}

// ─── Shared Helpers ─────────────────────────────────────────────────

/// One iteration's traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub drained: DrainReport,
    pub published: u32,
}

fn drain_inbound(rx: &mut ChannelRx<'_>, device: &DeviceState, boot: &mut BootSequencer) -> DrainReport {
    rx.drain(device, |change| {
        if let SystemChange::Boot(phase) = change {
            boot.on_peer(phase);
        }
    })
}

fn runtime_record(channel: usize, field: ServoRuntimeField, value: Value) -> Record {
    Record::data(
        Address::new(ArrayIdent::ServoRuntime, channel as u8, field as u8),
        value,
    )
}

fn system_record(field: SystemField, value: i32) -> Record {
    Record::data(
        Address::new(ArrayIdent::SystemState, field as u8, 0),
        Value::Int(value),
    )
}

/// Advance boot by at most one phase and announce it.
fn boot_poll(boot: &mut BootSequencer, device: &DeviceState, tx: &mut ChannelTx<'_>) -> u32 {
    match boot.poll(&device.system) {
        BootStep::Advanced(phase) => {
            tx.push(&announce(phase));
            1
        }
        step => {
            trace!(core = ?boot.core(), ?step, "boot waiting");
            0
        }
    }
}

// ─── Core 0 ─────────────────────────────────────────────────────────

/// Time-critical loop.
pub struct Core0<'a, D, S, V> {
    device: &'a DeviceState,
    tx: ChannelTx<'a>,
    rx: ChannelRx<'a>,
    boot: BootSequencer,
    dmx: D,
    switch: S,
    servos: V,
    demo_tick: u32,
    published: u32,
}

impl<'a, D: DmxSource, S: ModeSwitch, V: ServoDriver> Core0<'a, D, S, V> {
    pub fn new(
        device: &'a DeviceState,
        tx: ChannelTx<'a>,
        rx: ChannelRx<'a>,
        dmx: D,
        switch: S,
        servos: V,
    ) -> Self {
        Self {
            device,
            tx,
            rx,
            boot: BootSequencer::new(CoreId::Core0),
            dmx,
            switch,
            servos,
            demo_tick: 0,
            published: 0,
        }
    }

    /// Send the boot hello. Call once before the first `step`.
    pub fn start(&mut self) {
        let hello = self.boot.start(&self.device.system);
        self.publish(&hello);
    }

    pub fn servos(&self) -> &V {
        &self.servos
    }

    fn publish(&mut self, record: &Record) {
        self.tx.push(record);
        self.published += 1;
    }

    pub fn step(&mut self, now: u32) -> StepReport {
        self.published = 0;
        let drained = drain_inbound(&mut self.rx, self.device, &mut self.boot);
        self.tx.flush();

        if !self.device.system.boot_phase().is_running() {
            self.boot_step(now);
        } else {
            self.poll_switches(now);
            match self.device.system.run_mode() {
                RunMode::Dmx => self.ingest_dmx(now),
                RunMode::Demo => self.demo(now),
                RunMode::Serial | RunMode::Program | RunMode::Pause => {}
            }
            self.drive_servos(now);
            self.instrument(now);
        }

        StepReport {
            drained,
            published: self.published,
        }
    }

    fn boot_step(&mut self, now: u32) {
        if self.boot.needs_local_work(&self.device.system) {
            if self.device.system.boot_phase() == BootPhase::Core0SetupB {
                self.servo_startup(now);
            }
            self.boot.complete_local();
        }
        self.published += boot_poll(&mut self.boot, self.device, &mut self.tx);
    }

    /// Put every licensed servo on its start position.
    fn servo_startup(&mut self, now: u32) {
        let device = self.device;
        for ch in 0..SERVO_CHANNELS {
            let Some(cfg) = device.servo_config.channel(ch) else {
                continue;
            };
            if !cfg.is_licensed() {
                self.servos.disable(ch);
                continue;
            }
            let start = cfg.start_deg();
            let pulse = cfg.limits().degrees_to_pulse(start);
            let pos = self.servos.drive(ch, start, pulse);
            device.servo_runtime.set_current(ch, pos, now);
        }
        info!("servo startup complete");
    }

    fn poll_switches(&mut self, now: u32) {
        let device = self.device;
        let system = &device.system;
        if system.timer_due(SystemTimer::RunModeDip, now) {
            let mode = RunMode::from_dip_bits(self.switch.run_mode_bits());
            if system.set_run_mode(mode) {
                self.publish(&Record::system(SystemChange::Run(mode)));
            }
        }
        if system.timer_due(SystemTimer::DmxDip, now) {
            match self.switch.dmx_address() {
                Some(address) if address != system.dmx_address() => {
                    system.set_dmx_address(address);
                    info!(address, "dmx start address changed");
                    self.publish(&system_record(SystemField::DmxAddress, i32::from(address)));
                }
                _ => {}
            }
        }
    }

    fn ingest_dmx(&mut self, now: u32) {
        let device = self.device;
        let system = &device.system;
        let Some(frame) = self.dmx.poll(now) else {
            // Stale input holds position.
            return;
        };
        system.set_last_packet(now);
        self.publish(&system_record(SystemField::LastPacketTimestamp, now as i32));

        let base = usize::from(system.dmx_address().max(1)) - 1;
        for ch in 0..SERVO_CHANNELS {
            let Some(&slot) = frame.get(base + ch) else {
                break;
            };
            let Some(limits) = device.servo_config.limits(ch) else {
                continue;
            };
            let deg = limits.min_deg + f32::from(slot) / 255.0 * (limits.max_deg - limits.min_deg);
            self.set_target(ch, deg);
        }

        let eye_slot = usize::from(system.dmx_eye_address().max(1)) - 1;
        let profile = frame
            .get(eye_slot)
            .and_then(|&value| device.eye_profiles.profile_for_dmx(u16::from(value)));
        if let Some(profile) = profile.filter(|&p| p != system.eye_color_profile()) {
            if system.set_eye_color_profile(profile) {
                self.publish(&system_record(SystemField::EyeColorProfile, profile as i32));
            }
        }

        if system.debug_level().enables(DebugLevel::Dmx) {
            debug!(len = frame.len(), base, "dmx packet");
        }
    }

    fn demo(&mut self, now: u32) {
        if !self.device.system.timer_due(SystemTimer::Demo, now) {
            return;
        }
        self.demo_tick = self.demo_tick.wrapping_add(1);
        let phase = self.demo_tick % 200;
        let frac = if phase < 100 { phase } else { 200 - phase } as f32 / 100.0;
        for ch in 0..SERVO_CHANNELS {
            if let Some(l) = self.device.servo_config.limits(ch) {
                self.set_target(ch, l.min_deg + frac * (l.max_deg - l.min_deg));
            }
        }
    }

    fn set_target(&mut self, channel: usize, deg: f32) {
        let device = self.device;
        let Some(rt) = device.servo_runtime.channel(channel) else {
            return;
        };
        let before = rt.target();
        // Unlicensed channels stay inert.
        match device
            .servo_runtime
            .set_target(channel, deg, &device.servo_config)
        {
            Ok(target) if target != before => self.publish(&runtime_record(
                channel,
                ServoRuntimeField::TargetPos,
                Value::Float(target),
            )),
            _ => {}
        }
    }

    fn drive_servos(&mut self, now: u32) {
        let device = self.device;
        for ch in 0..SERVO_CHANNELS {
            let Some(rt) = device.servo_runtime.channel(ch) else {
                continue;
            };
            let was = (rt.current(), rt.active(), rt.pwm_enabled());

            if device.servo_config.is_licensed(ch) {
                let target = rt.target();
                let pulse = device
                    .servo_config
                    .degrees_to_pulse(ch, target)
                    .unwrap_or_default();
                let pos = self.servos.drive(ch, target, pulse);
                device.servo_runtime.set_current(ch, pos, now);
            }
            if device
                .servo_runtime
                .refresh_activity(ch, now, &device.servo_config)
            {
                self.servos.disable(ch);
            }

            if rt.current() != was.0 {
                self.publish(&runtime_record(
                    ch,
                    ServoRuntimeField::CurrentPos,
                    Value::Float(rt.current()),
                ));
            }
            if rt.active() != was.1 {
                self.publish(&runtime_record(ch, ServoRuntimeField::Active, Value::Bool(rt.active())));
            }
            if rt.pwm_enabled() != was.2 {
                self.publish(&runtime_record(
                    ch,
                    ServoRuntimeField::PwmEnabled,
                    Value::Bool(rt.pwm_enabled()),
                ));
            }
        }
    }

    fn instrument(&mut self, now: u32) {
        let system = &self.device.system;
        if !system.timer_due(SystemTimer::ServoSample, now) {
            return;
        }
        let level = system.debug_level();
        if level.enables(DebugLevel::Servo) {
            let selected = usize::from(system.debug_servo());
            if let Some(rt) = selected
                .checked_sub(1)
                .and_then(|ch| self.device.servo_runtime.channel(ch))
            {
                debug!(
                    channel = selected - 1,
                    current = rt.current(),
                    target = rt.target(),
                    active = rt.active(),
                    "servo sample"
                );
            }
        }
        if level.enables(DebugLevel::VoltCurrent) {
            debug!(
                voltage = system.servo_voltage(),
                current = system.servo_current(),
                "servo power"
            );
        }
    }
}

// ─── Core 1 ─────────────────────────────────────────────────────────

/// Ancillary loop.
pub struct Core1<'a, I, E> {
    device: &'a DeviceState,
    tx: ChannelTx<'a>,
    rx: ChannelRx<'a>,
    boot: BootSequencer,
    status: StatusSignal,
    blinker: StatusBlinker,
    indicator: I,
    eye: E,
    rng: u32,
}

impl<'a, I: Indicator, E: EyePixel> Core1<'a, I, E> {
    pub fn new(
        device: &'a DeviceState,
        tx: ChannelTx<'a>,
        rx: ChannelRx<'a>,
        status: StatusSignal,
        indicator: I,
        eye: E,
    ) -> Self {
        Self {
            device,
            tx,
            rx,
            boot: BootSequencer::new(CoreId::Core1),
            status,
            blinker: StatusBlinker::new(),
            indicator,
            eye,
            rng: 0x2545_f491,
        }
    }

    /// Send the boot hello. Call once before the first `step`.
    pub fn start(&mut self) {
        let hello = self.boot.start(&self.device.system);
        self.tx.push(&hello);
    }

    pub fn step(&mut self, now: u32) -> StepReport {
        let drained = drain_inbound(&mut self.rx, self.device, &mut self.boot);
        self.tx.flush();

        let mut published = 0;
        if !self.device.system.boot_phase().is_running() {
            if self.boot.needs_local_work(&self.device.system) {
                self.indicator.show(StatusColor::OFF);
                self.boot.complete_local();
            }
            published += boot_poll(&mut self.boot, self.device, &mut self.tx);
        }

        let state = self.status.select(self.device, now);
        self.indicator.show(self.blinker.tick(state, now));

        if self.device.system.boot_phase().is_running() {
            self.refresh_eye(now);
        }

        StepReport { drained, published }
    }

    fn next_roll(&mut self) -> u32 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        x
    }

    fn refresh_eye(&mut self, now: u32) {
        let device = self.device;
        if !device.eye_overlay.due(now) {
            return;
        }
        let profile = device.system.eye_color_profile();
        let roll = self.next_roll();
        let Some((state, color, brightness)) = device.eye_profiles.pick(profile, roll) else {
            return;
        };
        device.eye_overlay.set_color(color, brightness);
        self.eye.show(color, brightness);
        if device.system.debug_level().enables(DebugLevel::Pixel) {
            debug!(profile, ?state, color = color.0, brightness, "eye pixel");
        }
    }
}
