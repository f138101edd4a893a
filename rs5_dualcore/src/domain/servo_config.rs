//! ServoConfigTable: per-channel limits, flags and names.
//!
//! Read-mostly. Written at configuration load and by config records.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use rs5_common::config::{DeviceConfig, ServoChannelConfig};
use rs5_common::consts::SERVO_CHANNELS;
use rs5_common::record::fields::ServoConfigField;
use rs5_common::record::{Address, ApplyError, CharBuf, Value};
use rs5_common::servo::{ServoFlags, ServoLimits};

use super::{
    DomainApplier, bool_of, chars_of, element_error, float_of, int_in, out_of_domain, row_error,
};
use crate::atomic::{AtomicF32, CharCell};
use crate::lock::LockDomain;

/// One channel's configuration.
#[derive(Debug)]
pub struct ServoConfigEntry {
    flags: AtomicU8,
    frequency: AtomicF32,
    servo_min_deg: AtomicF32,
    servo_max_deg: AtomicF32,
    min_pwm: AtomicF32,
    max_pwm: AtomicF32,
    min_deg: AtomicF32,
    max_deg: AtomicF32,
    start_deg: AtomicF32,
    max_vel: AtomicF32,
    max_acc: AtomicF32,
    max_dec: AtomicF32,
    sleep_ms: AtomicU32,
    name: CharCell,
    part_number: CharCell,
}

impl ServoConfigEntry {
    fn new(cfg: &ServoChannelConfig, licensed: bool) -> Self {
        let l = &cfg.limits;
        Self {
            flags: AtomicU8::new(cfg.flags(licensed).bits()),
            frequency: AtomicF32::new(cfg.frequency),
            servo_min_deg: AtomicF32::new(l.servo_min_deg),
            servo_max_deg: AtomicF32::new(l.servo_max_deg),
            min_pwm: AtomicF32::new(l.min_pwm),
            max_pwm: AtomicF32::new(l.max_pwm),
            min_deg: AtomicF32::new(l.min_deg),
            max_deg: AtomicF32::new(l.max_deg),
            start_deg: AtomicF32::new(cfg.start_deg),
            max_vel: AtomicF32::new(cfg.max_vel),
            max_acc: AtomicF32::new(cfg.max_acc),
            max_dec: AtomicF32::new(cfg.max_dec),
            sleep_ms: AtomicU32::new(cfg.sleep_ms),
            name: CharCell::new(cfg.name.as_bytes()),
            part_number: CharCell::new(cfg.part_number.as_bytes()),
        }
    }

    #[inline]
    pub fn flags(&self) -> ServoFlags {
        ServoFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_licensed(&self) -> bool {
        self.flags().contains(ServoFlags::LICENSED)
    }

    pub fn limits(&self) -> ServoLimits {
        ServoLimits {
            min_pwm: self.min_pwm.load(),
            max_pwm: self.max_pwm.load(),
            servo_min_deg: self.servo_min_deg.load(),
            servo_max_deg: self.servo_max_deg.load(),
            min_deg: self.min_deg.load(),
            max_deg: self.max_deg.load(),
        }
    }

    #[inline]
    pub fn start_deg(&self) -> f32 {
        self.start_deg.load()
    }

    #[inline]
    pub fn max_vel(&self) -> f32 {
        self.max_vel.load()
    }

    #[inline]
    pub fn max_acc(&self) -> f32 {
        self.max_acc.load()
    }

    #[inline]
    pub fn max_dec(&self) -> f32 {
        self.max_dec.load()
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency.load()
    }

    #[inline]
    pub fn sleep_ms(&self) -> u32 {
        self.sleep_ms.load(Ordering::Relaxed)
    }

    fn set_flag(&self, flag: ServoFlags, on: bool) {
        let mut flags = self.flags();
        flags.set(flag, on);
        self.flags.store(flags.bits(), Ordering::Release);
    }
}

/// Configuration for every servo channel.
#[derive(Debug)]
pub struct ServoConfigTable {
    lock: LockDomain,
    entries: [ServoConfigEntry; SERVO_CHANNELS],
    /// Channels at or above this index can never be licensed.
    licensed_limit: usize,
}

impl ServoConfigTable {
    /// Build from a validated configuration. The lock starts uninitialized.
    ///
    /// Channels missing from `config.servos` fall back to their built-in
    /// defaults; validation rejects such configs before they get here.
    pub fn from_config(config: &DeviceConfig) -> Self {
        let entries = std::array::from_fn(|ch| {
            let licensed = config.is_licensed(ch);
            match config.servos.get(ch) {
                Some(cfg) => ServoConfigEntry::new(cfg, licensed),
                None => ServoConfigEntry::new(
                    &ServoChannelConfig::from(rs5_common::servo::defaults_for(ch)),
                    licensed,
                ),
            }
        });
        Self {
            lock: LockDomain::new("servo_config"),
            entries,
            licensed_limit: config.system.licensed_channels.min(SERVO_CHANNELS),
        }
    }

    #[inline]
    pub fn domain(&self) -> &LockDomain {
        &self.lock
    }

    #[inline]
    pub fn channel(&self, channel: usize) -> Option<&ServoConfigEntry> {
        self.entries.get(channel)
    }

    /// Unknown channels are never licensed.
    #[inline]
    pub fn is_licensed(&self, channel: usize) -> bool {
        self.channel(channel).is_some_and(ServoConfigEntry::is_licensed)
    }

    pub fn licensed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_licensed()).count()
    }

    pub fn limits(&self, channel: usize) -> Option<ServoLimits> {
        self.channel(channel).map(ServoConfigEntry::limits)
    }

    /// Pulse width for a position, clamped to the channel's travel.
    pub fn degrees_to_pulse(&self, channel: usize, deg: f32) -> Option<f32> {
        self.limits(channel).map(|l| l.degrees_to_pulse(deg))
    }

    /// User name. Multi-word, so read under the lock.
    pub fn name(&self, channel: usize) -> Option<CharBuf> {
        let entry = self.channel(channel)?;
        let _guard = self.lock.acquire();
        Some(entry.name.load())
    }

    pub fn part_number(&self, channel: usize) -> Option<CharBuf> {
        let entry = self.channel(channel)?;
        let _guard = self.lock.acquire();
        Some(entry.part_number.load())
    }

    /// Licensed channel count fixed at construction.
    #[inline]
    pub fn licensed_limit(&self) -> usize {
        self.licensed_limit
    }

    /// Revoke or restore a licence. Channels outside the licensed count
    /// stay inert: granting one is refused.
    pub fn set_licensed(&self, channel: usize, licensed: bool) -> Result<(), ApplyError> {
        let entry = self.licensable(channel, licensed)?;
        let _guard = self.lock.acquire();
        entry.set_flag(ServoFlags::LICENSED, licensed);
        Ok(())
    }

    fn licensable(&self, channel: usize, licensed: bool) -> Result<&ServoConfigEntry, ApplyError> {
        let unlicensed = ApplyError::Unlicensed {
            channel: channel.min(usize::from(u8::MAX)) as u8,
        };
        let entry = self.channel(channel).ok_or(unlicensed)?;
        if licensed && channel >= self.licensed_limit {
            return Err(unlicensed);
        }
        Ok(entry)
    }

    pub fn set_name(&self, channel: usize, name: &[u8]) -> bool {
        let Some(entry) = self.channel(channel) else {
            return false;
        };
        let _guard = self.lock.acquire();
        entry.name.store(name);
        true
    }
}

impl DomainApplier for ServoConfigTable {
    fn domain(&self) -> &LockDomain {
        &self.lock
    }

    fn apply_locked(&self, address: Address, value: &Value) -> Result<(), ApplyError> {
        let channel = usize::from(address.element);
        let entry = self
            .channel(channel)
            .ok_or_else(|| element_error(address))?;
        let field = ServoConfigField::from_u8(address.row).ok_or_else(|| row_error(address))?;
        let array = address.array;

        let float_cell = match field {
            ServoConfigField::Frequency => Some(&entry.frequency),
            ServoConfigField::ServoMinDeg => Some(&entry.servo_min_deg),
            ServoConfigField::ServoMaxDeg => Some(&entry.servo_max_deg),
            ServoConfigField::MinPwm => Some(&entry.min_pwm),
            ServoConfigField::MaxPwm => Some(&entry.max_pwm),
            ServoConfigField::MinDeg => Some(&entry.min_deg),
            ServoConfigField::MaxDeg => Some(&entry.max_deg),
            ServoConfigField::StartDeg => Some(&entry.start_deg),
            ServoConfigField::MaxVel => Some(&entry.max_vel),
            ServoConfigField::MaxAcc => Some(&entry.max_acc),
            ServoConfigField::MaxDec => Some(&entry.max_dec),
            _ => None,
        };
        if let Some(cell) = float_cell {
            let v = float_of(array, value)?;
            if !v.is_finite() {
                return Err(out_of_domain(address));
            }
            cell.store(v);
            return Ok(());
        }

        match field {
            ServoConfigField::Licensed => {
                let licensed = bool_of(array, value)?;
                self.licensable(channel, licensed)?
                    .set_flag(ServoFlags::LICENSED, licensed);
            }
            ServoConfigField::Smooth => entry.set_flag(ServoFlags::SMOOTH, bool_of(array, value)?),
            ServoConfigField::Analog => entry.set_flag(ServoFlags::ANALOG, bool_of(array, value)?),
            ServoConfigField::SleepTimer => {
                let v = int_in(address, value, 0, i32::MAX)?;
                entry.sleep_ms.store(v as u32, Ordering::Relaxed);
            }
            ServoConfigField::UserName => entry.name.store(chars_of(array, value)?),
            ServoConfigField::PartNumber => entry.part_number.store(chars_of(array, value)?),
            _ => {}
        }
        Ok(())
    }
}
