//! ServoRuntimeTable: live position and activity per channel.
//!
//! Mirrored on both cores. Core 0 drives positions and publishes them; core 1
//! applies the records to its replica.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use rs5_common::consts::SERVO_CHANNELS;
use rs5_common::record::fields::ServoRuntimeField;
use rs5_common::record::{Address, ApplyError, Value};
use rs5_common::servo::ServoFlags;
use tracing::debug;

use super::{DomainApplier, ServoConfigTable, bool_of, element_error, float_of, int_of, row_error};
use crate::atomic::AtomicF32;
use crate::lock::LockDomain;

/// One channel's runtime state.
#[derive(Debug)]
pub struct ServoRuntimeEntry {
    current: AtomicF32,
    target: AtomicF32,
    previous: AtomicF32,
    last_move: AtomicU32,
    active: AtomicBool,
    pwm_enabled: AtomicBool,
}

impl ServoRuntimeEntry {
    fn new(start_deg: f32, now: u32, licensed: bool) -> Self {
        Self {
            current: AtomicF32::new(start_deg),
            target: AtomicF32::new(start_deg),
            previous: AtomicF32::new(start_deg),
            last_move: AtomicU32::new(now),
            active: AtomicBool::new(false),
            pwm_enabled: AtomicBool::new(licensed),
        }
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current.load()
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target.load()
    }

    #[inline]
    pub fn previous(&self) -> f32 {
        self.previous.load()
    }

    #[inline]
    pub fn last_move(&self) -> u32 {
        self.last_move.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[inline]
    pub fn pwm_enabled(&self) -> bool {
        self.pwm_enabled.load(Ordering::Acquire)
    }

    /// Activity rule. Caller holds the lock.
    ///
    /// A moving channel refreshes `last_move`; a still one stays active until
    /// more than `sleep_ms` has passed since it last moved.
    fn derive_active(&self, now: u32, sleep_ms: u32) -> bool {
        if self.current() != self.target() {
            self.last_move.store(now, Ordering::Relaxed);
            true
        } else {
            now.wrapping_sub(self.last_move()) <= sleep_ms
        }
    }
}

/// Runtime state for every servo channel.
#[derive(Debug)]
pub struct ServoRuntimeTable {
    lock: LockDomain,
    entries: [ServoRuntimeEntry; SERVO_CHANNELS],
}

impl ServoRuntimeTable {
    /// Every channel starts at rest on its configured start position.
    pub fn new(config: &ServoConfigTable, now: u32) -> Self {
        let entries = std::array::from_fn(|ch| {
            let start = config.channel(ch).map_or(0.0, |c| c.start_deg());
            ServoRuntimeEntry::new(start, now, config.is_licensed(ch))
        });
        Self {
            lock: LockDomain::new("servo_runtime"),
            entries,
        }
    }

    #[inline]
    pub fn domain(&self) -> &LockDomain {
        &self.lock
    }

    #[inline]
    pub fn channel(&self, channel: usize) -> Option<&ServoRuntimeEntry> {
        self.entries.get(channel)
    }

    /// Set a new target, clamped to the channel's travel.
    ///
    /// Unlicensed channels are inert and refuse the write.
    pub fn set_target(
        &self,
        channel: usize,
        deg: f32,
        config: &ServoConfigTable,
    ) -> Result<f32, ApplyError> {
        let entry = self.channel(channel).ok_or(ApplyError::Unlicensed {
            channel: channel as u8,
        })?;
        let limits = match config.limits(channel) {
            Some(l) if config.is_licensed(channel) => l,
            _ => {
                return Err(ApplyError::Unlicensed {
                    channel: channel as u8,
                });
            }
        };
        let clamped = limits.clamp_deg(deg);
        let _guard = self.lock.acquire();
        entry.target.store(clamped);
        Ok(clamped)
    }

    /// Record a new measured/driven position. The old one becomes previous.
    pub fn set_current(&self, channel: usize, deg: f32, now: u32) -> bool {
        let Some(entry) = self.channel(channel) else {
            return false;
        };
        let _guard = self.lock.acquire();
        let old = entry.current();
        if old != deg {
            entry.previous.store(old);
            entry.current.store(deg);
            entry.last_move.store(now, Ordering::Relaxed);
        }
        true
    }

    /// Activity without writing the cached flag.
    pub fn is_active(&self, channel: usize, now: u32, sleep_ms: u32) -> bool {
        let Some(entry) = self.channel(channel) else {
            return false;
        };
        let _guard = self.lock.acquire();
        entry.derive_active(now, sleep_ms)
    }

    /// Recompute `active` and `pwm_enabled` for one channel.
    ///
    /// Returns true when PWM may be disabled: the channel is unlicensed, or
    /// it is an analog servo that has gone to sleep.
    pub fn refresh_activity(&self, channel: usize, now: u32, config: &ServoConfigTable) -> bool {
        let (Some(entry), Some(cfg)) = (self.channel(channel), config.channel(channel)) else {
            return true;
        };
        let flags = cfg.flags();
        let licensed = flags.contains(ServoFlags::LICENSED);
        let sleep_ms = cfg.sleep_ms();

        let _guard = self.lock.acquire();
        let active = licensed && entry.derive_active(now, sleep_ms);
        let pwm = licensed && (active || !flags.contains(ServoFlags::ANALOG));
        let was_active = entry.active.swap(active, Ordering::AcqRel);
        entry.pwm_enabled.store(pwm, Ordering::Release);
        if was_active != active {
            debug!(channel, active, pwm, "servo activity changed");
        }
        !pwm
    }
}

/// Applies runtime records with the licensing check against the config
/// table of the same replica.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeApplier<'a> {
    pub runtime: &'a ServoRuntimeTable,
    pub config: &'a ServoConfigTable,
}

impl DomainApplier for RuntimeApplier<'_> {
    fn domain(&self) -> &LockDomain {
        &self.runtime.lock
    }

    fn apply_locked(&self, address: Address, value: &Value) -> Result<(), ApplyError> {
        let channel = usize::from(address.element);
        let entry = self
            .runtime
            .channel(channel)
            .ok_or_else(|| element_error(address))?;
        let field = ServoRuntimeField::from_u8(address.row).ok_or_else(|| row_error(address))?;
        let array = address.array;

        match field {
            ServoRuntimeField::CurrentPos => entry.current.store(float_of(array, value)?),
            ServoRuntimeField::TargetPos => {
                let deg = float_of(array, value)?;
                if !self.config.is_licensed(channel) {
                    return Err(ApplyError::Unlicensed {
                        channel: address.element,
                    });
                }
                let clamped = self
                    .config
                    .limits(channel)
                    .map_or(deg, |l| l.clamp_deg(deg));
                entry.target.store(clamped);
            }
            ServoRuntimeField::PreviousPos => entry.previous.store(float_of(array, value)?),
            ServoRuntimeField::LastMove => {
                entry
                    .last_move
                    .store(int_of(array, value)? as u32, Ordering::Relaxed);
            }
            ServoRuntimeField::Active => {
                entry.active.store(bool_of(array, value)?, Ordering::Release);
            }
            ServoRuntimeField::PwmEnabled => {
                entry
                    .pwm_enabled
                    .store(bool_of(array, value)?, Ordering::Release);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rs5_common::config::DeviceConfig;
    use rs5_common::record::ArrayIdent;
    use rs5_common::record::fields::ServoConfigField;

    fn tables(licensed: usize) -> (ServoConfigTable, ServoRuntimeTable) {
        let mut config = DeviceConfig::default();
        config.system.licensed_channels = licensed;
        let cfg = ServoConfigTable::from_config(&config);
        let rt = ServoRuntimeTable::new(&cfg, 0);
        cfg.domain().init();
        rt.domain().init();
        (cfg, rt)
    }

    #[test]
    fn starts_at_rest_on_start_position() {
        let (_cfg, rt) = tables(SERVO_CHANNELS);
        let jaw = rt.channel(0).unwrap();
        assert_eq!(jaw.current(), 1.0);
        assert_eq!(jaw.target(), 1.0);
        assert!(!jaw.active());
    }

    #[test]
    fn target_clamped_to_travel() {
        let (cfg, rt) = tables(SERVO_CHANNELS);
        assert_eq!(rt.set_target(0, 150.0, &cfg).unwrap(), 80.0);
        assert_eq!(rt.set_target(0, -5.0, &cfg).unwrap(), 0.0);
        assert_eq!(rt.channel(0).unwrap().target(), 0.0);
    }

    #[test]
    fn unlicensed_target_refused() {
        let (cfg, rt) = tables(3);
        let before = rt.channel(4).unwrap().target();
        assert!(matches!(
            rt.set_target(4, 45.0, &cfg),
            Err(ApplyError::Unlicensed { channel: 4 })
        ));
        assert_eq!(rt.channel(4).unwrap().target(), before);

        let applier = RuntimeApplier {
            runtime: &rt,
            config: &cfg,
        };
        let addr = Address::new(ArrayIdent::ServoRuntime, 4, ServoRuntimeField::TargetPos as u8);
        assert!(matches!(
            applier.apply(addr, &Value::Float(45.0)),
            Err(ApplyError::Unlicensed { channel: 4 })
        ));
        assert_eq!(rt.channel(4).unwrap().target(), before);
    }

    #[test]
    fn activity_follows_motion_and_sleep() {
        let (cfg, rt) = tables(SERVO_CHANNELS);
        let sleep = cfg.channel(1).unwrap().sleep_ms();

        rt.set_target(1, 120.0, &cfg).unwrap();
        assert!(rt.is_active(1, 100, sleep));

        rt.set_current(1, 120.0, 150);
        // Reached target; still inside the sleep window.
        assert!(rt.is_active(1, 150 + sleep - 1, sleep));
        assert!(!rt.is_active(1, 150 + sleep + 1, sleep));
    }

    #[test]
    fn still_active_at_exact_sleep_boundary() {
        let (cfg, rt) = tables(SERVO_CHANNELS);
        let sleep = cfg.channel(1).unwrap().sleep_ms();
        rt.set_target(1, 10.0, &cfg).unwrap();
        rt.set_current(1, 10.0, 100);

        assert!(rt.is_active(1, 100 + sleep, sleep));
        assert!(!rt.refresh_activity(1, 100 + sleep, &cfg));
        assert!(rt.channel(1).unwrap().active());
        assert!(!rt.is_active(1, 100 + sleep + 1, sleep));
    }

    #[test]
    fn refresh_disables_pwm_for_sleeping_analog_servo() {
        let (cfg, rt) = tables(SERVO_CHANNELS);
        let sleep = cfg.channel(2).unwrap().sleep_ms();

        rt.set_target(2, 30.0, &cfg).unwrap();
        assert!(!rt.refresh_activity(2, 10, &cfg));
        assert!(rt.channel(2).unwrap().active());
        assert!(rt.channel(2).unwrap().pwm_enabled());

        rt.set_current(2, 30.0, 20);
        assert!(rt.refresh_activity(2, 20 + sleep + 1, &cfg));
        assert!(!rt.channel(2).unwrap().active());
        assert!(!rt.channel(2).unwrap().pwm_enabled());
    }

    #[test]
    fn refresh_on_unlicensed_channel_is_inert() {
        let (cfg, rt) = tables(1);
        assert!(rt.refresh_activity(3, 0, &cfg));
        assert!(!rt.channel(3).unwrap().pwm_enabled());
    }

    #[test]
    fn set_current_keeps_previous() {
        let (_cfg, rt) = tables(SERVO_CHANNELS);
        rt.set_current(0, 10.0, 5);
        rt.set_current(0, 20.0, 6);
        let e = rt.channel(0).unwrap();
        assert_eq!(e.previous(), 10.0);
        assert_eq!(e.current(), 20.0);
        assert_eq!(e.last_move(), 6);
    }

    #[test]
    fn applier_writes_fields() {
        let (cfg, rt) = tables(SERVO_CHANNELS);
        let applier = RuntimeApplier {
            runtime: &rt,
            config: &cfg,
        };
        let at = |row: ServoRuntimeField| Address::new(ArrayIdent::ServoRuntime, 5, row as u8);
        applier
            .apply(at(ServoRuntimeField::CurrentPos), &Value::Float(12.5))
            .unwrap();
        applier
            .apply(at(ServoRuntimeField::Active), &Value::Bool(true))
            .unwrap();
        applier
            .apply(at(ServoRuntimeField::LastMove), &Value::Int(900))
            .unwrap();
        let e = rt.channel(5).unwrap();
        assert_eq!(e.current(), 12.5);
        assert!(e.active());
        assert_eq!(e.last_move(), 900);

        assert!(
            applier
                .apply(Address::new(ArrayIdent::ServoRuntime, 5, 9), &Value::Bool(true))
                .is_err()
        );
        assert!(
            applier
                .apply(Address::new(ArrayIdent::ServoRuntime, 6, 0), &Value::Float(0.0))
                .is_err()
        );
    }

    #[test]
    fn inverted_limits_mid_update_do_not_stop_motion() {
        let (cfg, rt) = tables(SERVO_CHANNELS);
        let min_deg = Address::new(ArrayIdent::ServoConfig, 0, ServoConfigField::MinDeg as u8);
        // Jaw travel ends at 80; the new minimum lands before the new maximum.
        cfg.apply(min_deg, &Value::Float(100.0)).unwrap();

        assert_eq!(rt.set_target(0, 50.0, &cfg).unwrap(), 80.0);
        let applier = RuntimeApplier {
            runtime: &rt,
            config: &cfg,
        };
        let target = Address::new(ArrayIdent::ServoRuntime, 0, ServoRuntimeField::TargetPos as u8);
        applier.apply(target, &Value::Float(50.0)).unwrap();
        assert_eq!(rt.channel(0).unwrap().target(), 80.0);
        assert!(cfg.degrees_to_pulse(0, 50.0).unwrap().is_finite());

        let max_deg = Address::new(ArrayIdent::ServoConfig, 0, ServoConfigField::MaxDeg as u8);
        cfg.apply(max_deg, &Value::Float(120.0)).unwrap();
        assert_eq!(rt.set_target(0, 50.0, &cfg).unwrap(), 100.0);
    }

    #[test]
    fn nan_limit_refused_and_targets_still_clamp() {
        let (cfg, rt) = tables(SERVO_CHANNELS);
        let max_deg = Address::new(ArrayIdent::ServoConfig, 1, ServoConfigField::MaxDeg as u8);
        assert!(matches!(
            cfg.apply(max_deg, &Value::Float(f32::NAN)),
            Err(ApplyError::OutOfDomain { .. })
        ));

        let applier = RuntimeApplier {
            runtime: &rt,
            config: &cfg,
        };
        let target = Address::new(ArrayIdent::ServoRuntime, 1, ServoRuntimeField::TargetPos as u8);
        applier.apply(target, &Value::Float(500.0)).unwrap();
        assert_eq!(rt.channel(1).unwrap().target(), 180.0);
    }

    #[test]
    fn relicensing_past_count_keeps_channel_inert() {
        let (cfg, rt) = tables(3);
        let licensed = Address::new(ArrayIdent::ServoConfig, 4, ServoConfigField::Licensed as u8);
        assert!(matches!(
            cfg.apply(licensed, &Value::Bool(true)),
            Err(ApplyError::Unlicensed { channel: 4 })
        ));
        assert!(cfg.set_licensed(4, true).is_err());

        let before = rt.channel(4).unwrap().target();
        assert!(rt.set_target(4, 45.0, &cfg).is_err());
        let applier = RuntimeApplier {
            runtime: &rt,
            config: &cfg,
        };
        let target = Address::new(ArrayIdent::ServoRuntime, 4, ServoRuntimeField::TargetPos as u8);
        assert!(matches!(
            applier.apply(target, &Value::Float(45.0)),
            Err(ApplyError::Unlicensed { channel: 4 })
        ));
        assert_eq!(rt.channel(4).unwrap().target(), before);
        assert!(rt.refresh_activity(4, 0, &cfg));
    }
}
