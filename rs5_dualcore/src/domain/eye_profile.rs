//! EyeProfileTable: the fire profiles, record-writable.

use std::sync::atomic::{AtomicU8, AtomicU16, AtomicU32, Ordering};

use rs5_common::consts::EYE_PROFILE_COUNT;
use rs5_common::eyes::{EYE_PROFILES, EyeColorState, EyeProfile, Rgb};
use rs5_common::record::fields::EyeProfileField;
use rs5_common::record::{Address, ApplyError, Value};

use super::{DomainApplier, element_error, int_in, row_error};
use crate::lock::LockDomain;

const RGB_MAX: i32 = 0x00ff_ffff;

#[derive(Debug)]
struct ProfileEntry {
    base: AtomicU32,
    flicker: AtomicU32,
    black: AtomicU32,
    flicker_delay: AtomicU16,
    flicker_range: AtomicU16,
    brightness: AtomicU8,
    base_time: AtomicU16,
    flicker_time: AtomicU16,
    black_time: AtomicU16,
    dmx_start: AtomicU16,
    dmx_end: AtomicU16,
    mode: AtomicU8,
}

impl ProfileEntry {
    fn new(p: &EyeProfile) -> Self {
        Self {
            base: AtomicU32::new(p.base.0),
            flicker: AtomicU32::new(p.flicker.0),
            black: AtomicU32::new(p.black.0),
            flicker_delay: AtomicU16::new(p.flicker_delay),
            flicker_range: AtomicU16::new(p.flicker_range),
            brightness: AtomicU8::new(p.brightness),
            base_time: AtomicU16::new(p.base_time),
            flicker_time: AtomicU16::new(p.flicker_time),
            black_time: AtomicU16::new(p.black_time),
            dmx_start: AtomicU16::new(p.dmx_start),
            dmx_end: AtomicU16::new(p.dmx_end),
            mode: AtomicU8::new(0),
        }
    }

    fn snapshot(&self) -> EyeProfile {
        let r = Ordering::Relaxed;
        EyeProfile {
            base: Rgb(self.base.load(r)),
            flicker: Rgb(self.flicker.load(r)),
            black: Rgb(self.black.load(r)),
            flicker_delay: self.flicker_delay.load(r),
            flicker_range: self.flicker_range.load(r),
            brightness: self.brightness.load(r),
            base_time: self.base_time.load(r),
            flicker_time: self.flicker_time.load(r),
            black_time: self.black_time.load(r),
            dmx_start: self.dmx_start.load(r),
            dmx_end: self.dmx_end.load(r),
        }
    }
}

/// Every fire profile.
#[derive(Debug)]
pub struct EyeProfileTable {
    lock: LockDomain,
    entries: [ProfileEntry; EYE_PROFILE_COUNT],
}

impl Default for EyeProfileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EyeProfileTable {
    /// Built-in profiles. The lock starts uninitialized.
    pub fn new() -> Self {
        Self {
            lock: LockDomain::new("eye_profile"),
            entries: std::array::from_fn(|i| ProfileEntry::new(&EYE_PROFILES[i])),
        }
    }

    #[inline]
    pub fn domain(&self) -> &LockDomain {
        &self.lock
    }

    /// Consistent copy of one profile.
    pub fn snapshot(&self, index: usize) -> Option<EyeProfile> {
        let entry = self.entries.get(index)?;
        let _guard = self.lock.acquire();
        Some(entry.snapshot())
    }

    pub fn mode(&self, index: usize) -> Option<u8> {
        self.entries
            .get(index)
            .map(|e| e.mode.load(Ordering::Relaxed))
    }

    /// Profile whose DMX range contains `value`, lowest index first.
    pub fn profile_for_dmx(&self, value: u16) -> Option<usize> {
        self.entries.iter().position(|e| {
            let start = e.dmx_start.load(Ordering::Relaxed);
            let end = e.dmx_end.load(Ordering::Relaxed);
            (start..=end).contains(&value)
        })
    }

    /// Color state and color for a random roll.
    pub fn pick(&self, index: usize, roll: u32) -> Option<(EyeColorState, Rgb, u8)> {
        let profile = self.snapshot(index)?;
        let state = profile.pick_state(roll);
        Some((state, profile.color(state), profile.brightness))
    }
}

impl DomainApplier for EyeProfileTable {
    fn domain(&self) -> &LockDomain {
        &self.lock
    }

    fn apply_locked(&self, address: Address, value: &Value) -> Result<(), ApplyError> {
        let entry = self
            .entries
            .get(usize::from(address.element))
            .ok_or_else(|| element_error(address))?;
        let field = EyeProfileField::from_u8(address.row).ok_or_else(|| row_error(address))?;
        let r = Ordering::Relaxed;
        let word = |hi: i32| int_in(address, value, 0, hi);

        match field {
            EyeProfileField::BaseColor => entry.base.store(word(RGB_MAX)? as u32, r),
            EyeProfileField::FlickerColor => entry.flicker.store(word(RGB_MAX)? as u32, r),
            EyeProfileField::BlackColor => entry.black.store(word(RGB_MAX)? as u32, r),
            EyeProfileField::Brightness => entry.brightness.store(word(255)? as u8, r),
            EyeProfileField::Mode => entry.mode.store(word(255)? as u8, r),
            half => {
                let cell = match half {
                    EyeProfileField::FlickerDelay => &entry.flicker_delay,
                    EyeProfileField::FlickerRange => &entry.flicker_range,
                    EyeProfileField::BaseColorTime => &entry.base_time,
                    EyeProfileField::FlickerColorTime => &entry.flicker_time,
                    EyeProfileField::BlackColorTime => &entry.black_time,
                    EyeProfileField::DmxStart => &entry.dmx_start,
                    _ => &entry.dmx_end,
                };
                cell.store(word(i32::from(u16::MAX))? as u16, r);
            }
        }
        Ok(())
    }
}
