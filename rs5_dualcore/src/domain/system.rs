//! SystemState: boot phase, run mode, debug level, DMX freshness and the
//! rate-limit timers.

use std::sync::atomic::{AtomicI32, AtomicU8, AtomicU32, Ordering};

use rs5_common::config::DeviceConfig;
use rs5_common::consts::{EYE_PROFILE_COUNT, SERVO_CHANNELS};
use rs5_common::record::fields::{ModeDebugField, SystemField};
use rs5_common::record::{Address, ApplyError, ArrayIdent, SystemChange, Value};
use rs5_common::state::{BootPhase, DebugLevel, RunMode};
use tracing::{debug, info, warn};

use super::{DomainApplier, element_error, int_in, int_of, out_of_domain, singleton_row};
use crate::lock::LockDomain;

/// `(lastSampleTime, interval)` pair.
///
/// `due` re-arms in place, so it is a write: call it through the owning
/// domain ([`SystemState::timer_due`], [`super::EyeOverlayState::due`]),
/// which holds that domain's lock.
#[derive(Debug)]
pub struct RateTimer {
    last: AtomicU32,
    interval: AtomicU32,
}

impl RateTimer {
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            last: AtomicU32::new(0),
            interval: AtomicU32::new(interval_ms),
        }
    }

    /// True once more than `interval` ms have passed since the last firing;
    /// re-arms at `now`. Wrapping-safe.
    pub fn due(&self, now: u32) -> bool {
        let last = self.last.load(Ordering::Relaxed);
        if now.wrapping_sub(last) > self.interval.load(Ordering::Relaxed) {
            self.last.store(now, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn interval(&self) -> u32 {
        self.interval.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn last(&self) -> u32 {
        self.last.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_interval(&self, interval_ms: u32) {
        self.interval.store(interval_ms, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_last(&self, now: u32) {
        self.last.store(now, Ordering::Relaxed);
    }
}

/// Rate timers held in [`SystemState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTimer {
    Demo,
    DmxDip,
    RunModeDip,
    ServoSample,
}

/// Device-wide state singleton.
#[derive(Debug)]
pub struct SystemState {
    lock: LockDomain,
    boot_phase: AtomicU8,
    run_mode: AtomicU8,
    debug_level: AtomicU8,
    debug_servo: AtomicU8,
    servo_voltage: AtomicI32,
    servo_current: AtomicI32,
    dmx_address: AtomicU32,
    dmx_eye_address: AtomicU32,
    last_packet: AtomicU32,
    packet_age_limit: AtomicU32,
    eye_color_profile: AtomicU8,
    demo_timer: RateTimer,
    dmx_dip_timer: RateTimer,
    run_mode_dip_timer: RateTimer,
    servo_sample_timer: RateTimer,
}

impl SystemState {
    /// Populate from configuration. The lock starts uninitialized.
    pub fn from_config(config: &DeviceConfig) -> Self {
        let sys = &config.system;
        Self {
            lock: LockDomain::new("system"),
            boot_phase: AtomicU8::new(BootPhase::default() as u8),
            run_mode: AtomicU8::new(sys.run_mode as u8),
            debug_level: AtomicU8::new(sys.debug_level as u8),
            debug_servo: AtomicU8::new(sys.debug_servo),
            servo_voltage: AtomicI32::new(0),
            servo_current: AtomicI32::new(0),
            dmx_address: AtomicU32::new(u32::from(sys.dmx_address)),
            dmx_eye_address: AtomicU32::new(u32::from(config.eyes.dmx_eye_address())),
            last_packet: AtomicU32::new(0),
            packet_age_limit: AtomicU32::new(sys.packet_age_limit_ms),
            eye_color_profile: AtomicU8::new(config.eyes.profile as u8),
            demo_timer: RateTimer::new(sys.demo_interval_ms),
            dmx_dip_timer: RateTimer::new(sys.dmx_dip_interval_ms),
            run_mode_dip_timer: RateTimer::new(sys.run_mode_dip_interval_ms),
            servo_sample_timer: RateTimer::new(sys.servo_sample_interval_ms),
        }
    }

    #[inline]
    pub fn domain(&self) -> &LockDomain {
        &self.lock
    }

    // ─── Getters (unlocked) ─────────────────────────────────────────

    #[inline]
    pub fn boot_phase(&self) -> BootPhase {
        BootPhase::from_u8(self.boot_phase.load(Ordering::Acquire)).unwrap_or_default()
    }

    #[inline]
    pub fn run_mode(&self) -> RunMode {
        RunMode::from_u8(self.run_mode.load(Ordering::Acquire)).unwrap_or_default()
    }

    #[inline]
    pub fn debug_level(&self) -> DebugLevel {
        DebugLevel::from_u8(self.debug_level.load(Ordering::Acquire)).unwrap_or_default()
    }

    #[inline]
    pub fn debug_servo(&self) -> u8 {
        self.debug_servo.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn servo_voltage(&self) -> i32 {
        self.servo_voltage.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn servo_current(&self) -> i32 {
        self.servo_current.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dmx_address(&self) -> u16 {
        self.dmx_address.load(Ordering::Relaxed) as u16
    }

    #[inline]
    pub fn dmx_eye_address(&self) -> u16 {
        self.dmx_eye_address.load(Ordering::Relaxed) as u16
    }

    #[inline]
    pub fn last_packet(&self) -> u32 {
        self.last_packet.load(Ordering::Acquire)
    }

    #[inline]
    pub fn packet_age_limit(&self) -> u32 {
        self.packet_age_limit.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn eye_color_profile(&self) -> usize {
        usize::from(self.eye_color_profile.load(Ordering::Relaxed))
    }

    /// A packet is current iff `now - lastPacket <= packetAgeLimit`.
    #[inline]
    pub fn is_dmx_fresh(&self, now: u32) -> bool {
        now.wrapping_sub(self.last_packet()) <= self.packet_age_limit()
    }

    #[inline]
    pub fn timer(&self, timer: SystemTimer) -> &RateTimer {
        match timer {
            SystemTimer::Demo => &self.demo_timer,
            SystemTimer::DmxDip => &self.dmx_dip_timer,
            SystemTimer::RunModeDip => &self.run_mode_dip_timer,
            SystemTimer::ServoSample => &self.servo_sample_timer,
        }
    }

    // ─── Setters (locked) ───────────────────────────────────────────

    /// Fire and re-arm `timer` if its interval has passed.
    pub fn timer_due(&self, timer: SystemTimer, now: u32) -> bool {
        let _guard = self.lock.acquire();
        self.timer(timer).due(now)
    }

    /// Advance the boot phase. Returns `false` (and leaves the phase alone)
    /// for anything that is not a forward step.
    pub fn set_boot_phase(&self, phase: BootPhase) -> bool {
        let _guard = self.lock.acquire();
        let current = self.boot_phase();
        if phase <= current {
            debug!(?current, requested = ?phase, "boot phase regression ignored");
            return false;
        }
        self.boot_phase.store(phase as u8, Ordering::Release);
        info!(from = ?current, to = ?phase, "boot phase advanced");
        true
    }

    /// Returns `true` if the mode changed.
    pub fn set_run_mode(&self, mode: RunMode) -> bool {
        let _guard = self.lock.acquire();
        self.store_run_mode(mode)
    }

    /// Returns `true` if the level changed.
    pub fn set_debug_level(&self, level: DebugLevel) -> bool {
        let _guard = self.lock.acquire();
        self.store_debug_level(level)
    }

    /// Caller holds the lock.
    fn store_run_mode(&self, mode: RunMode) -> bool {
        let previous = self.run_mode.swap(mode as u8, Ordering::AcqRel);
        let changed = previous != mode as u8;
        if changed {
            info!(?mode, "run mode changed");
        }
        changed
    }

    /// Caller holds the lock.
    fn store_debug_level(&self, level: DebugLevel) -> bool {
        let previous = self.debug_level.swap(level as u8, Ordering::AcqRel);
        let changed = previous != level as u8;
        if changed {
            info!(?level, "debug level changed");
        }
        changed
    }

    pub fn set_last_packet(&self, now: u32) {
        let _guard = self.lock.acquire();
        self.last_packet.store(now, Ordering::Release);
    }

    pub fn set_servo_power(&self, voltage: i32, current: i32) {
        let _guard = self.lock.acquire();
        self.servo_voltage.store(voltage, Ordering::Relaxed);
        self.servo_current.store(current, Ordering::Relaxed);
    }

    pub fn set_dmx_address(&self, address: u16) {
        let _guard = self.lock.acquire();
        self.dmx_address.store(u32::from(address), Ordering::Relaxed);
    }

    /// Returns `false` for an index outside the profile table.
    pub fn set_eye_color_profile(&self, profile: usize) -> bool {
        if profile >= EYE_PROFILE_COUNT {
            return false;
        }
        let _guard = self.lock.acquire();
        self.eye_color_profile.store(profile as u8, Ordering::Relaxed);
        true
    }

    /// Apply a Run or Debug SystemChange. Boot changes belong to the boot
    /// sequencer and are ignored here.
    pub fn apply_change(&self, change: SystemChange) -> bool {
        match change {
            SystemChange::Run(mode) => self.set_run_mode(mode),
            SystemChange::Debug(level) => self.set_debug_level(level),
            SystemChange::Boot(_) => false,
        }
    }

    fn apply_system_field(&self, address: Address, value: &Value) -> Result<(), ApplyError> {
        let field = SystemField::from_u8(address.element).ok_or_else(|| element_error(address))?;
        match field {
            SystemField::DebugServo => {
                let v = int_in(address, value, 0, SERVO_CHANNELS as i32)?;
                self.debug_servo.store(v as u8, Ordering::Relaxed);
            }
            SystemField::ServoVoltage => {
                self.servo_voltage
                    .store(int_of(address.array, value)?, Ordering::Relaxed);
            }
            SystemField::ServoCurrent => {
                self.servo_current
                    .store(int_of(address.array, value)?, Ordering::Relaxed);
            }
            SystemField::DmxAddress => {
                let v = int_in(address, value, 1, 512)?;
                self.dmx_address.store(v as u32, Ordering::Relaxed);
            }
            SystemField::DmxEyeAddress => {
                let v = int_in(address, value, 1, 512)?;
                self.dmx_eye_address.store(v as u32, Ordering::Relaxed);
            }
            SystemField::LastPacketTimestamp => {
                self.last_packet
                    .store(int_of(address.array, value)? as u32, Ordering::Release);
            }
            SystemField::PacketAgeLimit => {
                let v = int_in(address, value, 1, i32::MAX)?;
                self.packet_age_limit.store(v as u32, Ordering::Relaxed);
            }
            SystemField::DemoInterval => self.demo_timer.set_interval(interval(address, value)?),
            SystemField::DmxDipInterval => {
                self.dmx_dip_timer.set_interval(interval(address, value)?)
            }
            SystemField::RunModeDipInterval => self
                .run_mode_dip_timer
                .set_interval(interval(address, value)?),
            SystemField::ServoSampleInterval => self
                .servo_sample_timer
                .set_interval(interval(address, value)?),
            SystemField::EyeColorProfile => {
                let v = int_in(address, value, 0, EYE_PROFILE_COUNT as i32 - 1)?;
                self.eye_color_profile.store(v as u8, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn apply_mode_debug(&self, address: Address, value: &Value) -> Result<(), ApplyError> {
        let field =
            ModeDebugField::from_u8(address.element).ok_or_else(|| element_error(address))?;
        let raw = int_of(address.array, value)?;
        let raw = u8::try_from(raw).map_err(|_| out_of_domain(address))?;
        match field {
            ModeDebugField::RunMode => {
                let mode = RunMode::from_u8(raw).ok_or_else(|| out_of_domain(address))?;
                self.store_run_mode(mode);
            }
            ModeDebugField::DebugLevel => {
                let level = DebugLevel::from_u8(raw).ok_or_else(|| out_of_domain(address))?;
                self.store_debug_level(level);
            }
        }
        Ok(())
    }
}

fn interval(address: Address, value: &Value) -> Result<u32, ApplyError> {
    int_in(address, value, 0, i32::MAX).map(|v| v as u32)
}

impl DomainApplier for SystemState {
    fn domain(&self) -> &LockDomain {
        &self.lock
    }

    fn apply_locked(&self, address: Address, value: &Value) -> Result<(), ApplyError> {
        singleton_row(address)?;
        match address.array {
            ArrayIdent::SystemState => self.apply_system_field(address, value),
            ArrayIdent::ModeDebug => self.apply_mode_debug(address, value),
            other => {
                warn!(array = ?other, "record routed to the wrong domain");
                Err(element_error(address))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SystemState {
        let s = SystemState::from_config(&DeviceConfig::default());
        s.domain().init();
        s
    }

    fn sys_addr(field: SystemField) -> Address {
        Address::new(ArrayIdent::SystemState, field as u8, 0)
    }

    #[test]
    fn defaults_from_config() {
        let s = state();
        assert_eq!(s.boot_phase(), BootPhase::Core0SetupA);
        assert_eq!(s.run_mode(), RunMode::Dmx);
        assert_eq!(s.debug_level(), DebugLevel::Dmx);
        assert_eq!(s.packet_age_limit(), 200);
        assert_eq!(s.eye_color_profile(), 3);
        assert_eq!(s.dmx_eye_address(), 494);
    }

    #[test]
    fn dmx_freshness_boundary() {
        let s = state();
        let t = 10_000;
        s.set_last_packet(t);
        assert!(s.is_dmx_fresh(t + 199));
        assert!(s.is_dmx_fresh(t + 200));
        assert!(!s.is_dmx_fresh(t + 201));
    }

    #[test]
    fn dmx_freshness_across_wrap() {
        let s = state();
        s.set_last_packet(u32::MAX - 50);
        assert!(s.is_dmx_fresh(100));
        assert!(!s.is_dmx_fresh(200));
    }

    #[test]
    fn boot_phase_only_advances() {
        let s = state();
        assert!(s.set_boot_phase(BootPhase::Core1SetupA));
        assert!(!s.set_boot_phase(BootPhase::Core0SetupA));
        assert!(!s.set_boot_phase(BootPhase::Core1SetupA));
        assert!(s.set_boot_phase(BootPhase::Running));
        assert!(!s.set_boot_phase(BootPhase::Core0SetupB));
        assert_eq!(s.boot_phase(), BootPhase::Running);
    }

    #[test]
    fn run_mode_change_reports_edges() {
        let s = state();
        assert!(s.set_run_mode(RunMode::Demo));
        assert!(!s.set_run_mode(RunMode::Demo));
        assert!(s.apply_change(SystemChange::Run(RunMode::Pause)));
        assert!(!s.apply_change(SystemChange::Boot(BootPhase::Running)));
        assert_eq!(s.run_mode(), RunMode::Pause);
        assert_eq!(s.boot_phase(), BootPhase::Core0SetupA);
    }

    #[test]
    fn rate_timer_fires_after_interval() {
        let t = RateTimer::new(50);
        t.set_last(1000);
        assert!(!t.due(1050));
        assert!(t.due(1051));
        assert_eq!(t.last(), 1051);
        assert!(!t.due(1100));
    }

    #[test]
    fn applies_system_fields() {
        let s = state();
        s.apply(sys_addr(SystemField::PacketAgeLimit), &Value::Int(350))
            .unwrap();
        s.apply(sys_addr(SystemField::EyeColorProfile), &Value::Int(9))
            .unwrap();
        s.apply(sys_addr(SystemField::DemoInterval), &Value::Int(75))
            .unwrap();
        assert_eq!(s.packet_age_limit(), 350);
        assert_eq!(s.eye_color_profile(), 9);
        assert_eq!(s.timer(SystemTimer::Demo).interval(), 75);
    }

    #[test]
    fn rejects_out_of_range_addresses() {
        let s = state();
        let bad_element = Address::new(ArrayIdent::SystemState, 40, 0);
        assert!(matches!(
            s.apply(bad_element, &Value::Int(1)),
            Err(ApplyError::Framing(_))
        ));
        let bad_row = Address::new(ArrayIdent::SystemState, 0, 1);
        assert!(matches!(
            s.apply(bad_row, &Value::Int(1)),
            Err(ApplyError::Framing(_))
        ));
        assert!(matches!(
            s.apply(sys_addr(SystemField::EyeColorProfile), &Value::Int(14)),
            Err(ApplyError::OutOfDomain { .. })
        ));
        assert_eq!(s.eye_color_profile(), 3);
    }

    #[test]
    fn mode_debug_sentinel() {
        let s = state();
        let run = Address::new(ArrayIdent::ModeDebug, ModeDebugField::RunMode as u8, 0);
        let dbg = Address::new(ArrayIdent::ModeDebug, ModeDebugField::DebugLevel as u8, 0);
        s.apply(run, &Value::Int(RunMode::Serial as i32)).unwrap();
        s.apply(dbg, &Value::Int(DebugLevel::Pixel as i32)).unwrap();
        assert_eq!(s.run_mode(), RunMode::Serial);
        assert_eq!(s.debug_level(), DebugLevel::Pixel);

        assert!(matches!(
            s.apply(run, &Value::Int(9)),
            Err(ApplyError::OutOfDomain { .. })
        ));
        assert_eq!(s.run_mode(), RunMode::Serial);
    }

    #[test]
    fn record_and_setter_share_change_detection() {
        let s = state();
        let run = Address::new(ArrayIdent::ModeDebug, ModeDebugField::RunMode as u8, 0);
        let dbg = Address::new(ArrayIdent::ModeDebug, ModeDebugField::DebugLevel as u8, 0);
        s.apply(run, &Value::Int(RunMode::Demo as i32)).unwrap();
        s.apply(dbg, &Value::Int(DebugLevel::Servo as i32)).unwrap();
        assert!(!s.set_run_mode(RunMode::Demo));
        assert!(!s.set_debug_level(DebugLevel::Servo));
        assert!(s.apply_change(SystemChange::Debug(DebugLevel::None)));
        assert!(!s.domain().is_held());
    }

    #[test]
    fn timer_due_waits_for_domain_lock() {
        let s = state();
        s.timer(SystemTimer::DmxDip).set_last(0);
        let guard = s.domain().acquire();
        std::thread::scope(|scope| {
            let waiter = scope.spawn(|| s.timer_due(SystemTimer::DmxDip, 10_000));
            std::thread::sleep(std::time::Duration::from_millis(20));
            // Not re-armed while another holder owns the domain.
            assert_eq!(s.timer(SystemTimer::DmxDip).last(), 0);
            drop(guard);
            assert!(waiter.join().unwrap());
        });
        assert_eq!(s.timer(SystemTimer::DmxDip).last(), 10_000);
        assert!(!s.timer_due(SystemTimer::DmxDip, 10_001));
    }
}
