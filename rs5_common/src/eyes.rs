//! Eye "fire" profiles and island eye addresses.
//!
//! A profile flickers the eye between three colors (base, flicker, black).
//! How long each color is favored comes from its time weight; which profile
//! runs is picked by a DMX value falling inside the profile's address range.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

use crate::consts::EYE_PROFILE_COUNT;

/// Packed `0xRRGGBB` color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgb(pub u32);

impl Rgb {
    pub const BLACK: Self = Self(0x00_0000);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self((r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    #[inline]
    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub const fn blue(self) -> u8 {
        self.0 as u8
    }
}

/// Which of a profile's three colors is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EyeColorState {
    Base,
    Flicker,
    Black,
}

/// One fire profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeProfile {
    pub base: Rgb,
    pub flicker: Rgb,
    pub black: Rgb,
    /// Delay between flicker steps [ms].
    pub flicker_delay: u16,
    /// Random spread added to the delay [ms].
    pub flicker_range: u16,
    pub brightness: u8,
    pub base_time: u16,
    pub flicker_time: u16,
    pub black_time: u16,
    /// Inclusive DMX value range selecting this profile.
    pub dmx_start: u16,
    pub dmx_end: u16,
}

impl EyeProfile {
    /// Pick a color state from a random roll, weighted by the three times.
    ///
    /// A profile with all-zero weights stays on its base color.
    pub fn pick_state(&self, roll: u32) -> EyeColorState {
        let base = u32::from(self.base_time);
        let flicker = u32::from(self.flicker_time);
        let total = base + flicker + u32::from(self.black_time);
        if total == 0 {
            return EyeColorState::Base;
        }
        let r = roll % total;
        if r < base {
            EyeColorState::Base
        } else if r < base + flicker {
            EyeColorState::Flicker
        } else {
            EyeColorState::Black
        }
    }

    /// Color shown in `state`.
    #[inline]
    pub fn color(&self, state: EyeColorState) -> Rgb {
        match state {
            EyeColorState::Base => self.base,
            EyeColorState::Flicker => self.flicker,
            EyeColorState::Black => self.black,
        }
    }

    #[inline]
    pub fn covers(&self, dmx_value: u16) -> bool {
        (self.dmx_start..=self.dmx_end).contains(&dmx_value)
    }
}

// ─── Default Profiles ───────────────────────────────────────────────

const fn profile(
    base: u32,
    flicker: u32,
    black: u32,
    flicker_delay: u16,
    times: (u16, u16, u16),
    dmx: (u16, u16),
) -> EyeProfile {
    EyeProfile {
        base: Rgb(base),
        flicker: Rgb(flicker),
        black: Rgb(black),
        flicker_delay,
        flicker_range: 50,
        brightness: 255,
        base_time: times.0,
        flicker_time: times.1,
        black_time: times.2,
        dmx_start: dmx.0,
        dmx_end: dmx.1,
    }
}

const EVEN: (u16, u16, u16) = (30, 30, 30);
const DIM_BLACK: (u16, u16, u16) = (30, 30, 10);

/// Power-on profile table, in profile-index order.
pub const EYE_PROFILES: &[EyeProfile] = &[
    profile(0xFF0000, 0xFF0000, 0xFF0000, 40, EVEN, (11, 20)),
    profile(0x0000FF, 0x0000FF, 0x0000FF, 20, DIM_BLACK, (21, 30)),
    profile(0x00FF00, 0x00FF00, 0x00FF00, 40, DIM_BLACK, (31, 40)),
    profile(0xFF00FF, 0xFF00FF, 0x000000, 40, EVEN, (41, 50)),
    profile(0xFF8000, 0xFF8000, 0xFF8000, 40, EVEN, (51, 60)),
    profile(0xFFFF00, 0xFFFF00, 0x000000, 40, EVEN, (61, 70)),
    profile(0xFFFFFF, 0xFFFFFF, 0xFFFFFF, 5, EVEN, (71, 80)),
    profile(0xFF1000, 0xFF3000, 0xC00000, 40, EVEN, (81, 90)),
    profile(0x000080, 0x0000C0, 0x0000FF, 20, DIM_BLACK, (91, 100)),
    profile(0x008000, 0x00C000, 0x00FF00, 40, DIM_BLACK, (101, 110)),
    profile(0x800080, 0x4D004D, 0x000000, 40, EVEN, (111, 120)),
    profile(0xFFA500, 0x996300, 0x000000, 40, EVEN, (121, 130)),
    profile(0xFFFF00, 0xFFA500, 0xFF8000, 40, EVEN, (131, 140)),
    // White lightning
    profile(0xFFFFFF, 0x000000, 0x9999FF, 5, EVEN, (141, 150)),
];

const_assert_eq!(EYE_PROFILES.len(), EYE_PROFILE_COUNT);

/// Index of the default profile whose DMX range covers `dmx_value`.
pub fn profile_for_dmx(dmx_value: u16) -> Option<usize> {
    EYE_PROFILES.iter().position(|p| p.covers(dmx_value))
}

// ─── Island Addresses ───────────────────────────────────────────────

/// Eye DMX start address per island dip-switch setting.
pub const ISLAND_EYE_ADDRESSES: &[u16] = &[494, 496, 500, 498, 68];

const_assert_eq!(ISLAND_EYE_ADDRESSES.len(), 5);

/// Eye DMX start address for an island setting.
#[inline]
pub fn island_eye_address(island: usize) -> Option<u16> {
    ISLAND_EYE_ADDRESSES.get(island).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_channels() {
        let c = Rgb::new(0x12, 0x34, 0x56);
        assert_eq!(c.0, 0x123456);
        assert_eq!((c.red(), c.green(), c.blue()), (0x12, 0x34, 0x56));
    }

    #[test]
    fn profile_ranges_do_not_overlap() {
        for pair in EYE_PROFILES.windows(2) {
            assert!(pair[0].dmx_end < pair[1].dmx_start);
        }
    }

    #[test]
    fn dmx_selects_profile() {
        assert_eq!(profile_for_dmx(11), Some(0));
        assert_eq!(profile_for_dmx(20), Some(0));
        assert_eq!(profile_for_dmx(45), Some(3));
        assert_eq!(profile_for_dmx(150), Some(13));
        assert_eq!(profile_for_dmx(5), None);
        assert_eq!(profile_for_dmx(151), None);
    }

    #[test]
    fn pick_state_follows_weights() {
        let p = EYE_PROFILES[1]; // 30 / 30 / 10
        assert_eq!(p.pick_state(0), EyeColorState::Base);
        assert_eq!(p.pick_state(29), EyeColorState::Base);
        assert_eq!(p.pick_state(30), EyeColorState::Flicker);
        assert_eq!(p.pick_state(59), EyeColorState::Flicker);
        assert_eq!(p.pick_state(60), EyeColorState::Black);
        assert_eq!(p.pick_state(70), EyeColorState::Base);
    }

    #[test]
    fn zero_weights_hold_base() {
        let p = EyeProfile {
            base_time: 0,
            flicker_time: 0,
            black_time: 0,
            ..EYE_PROFILES[0]
        };
        assert_eq!(p.pick_state(12345), EyeColorState::Base);
    }

    #[test]
    fn islands() {
        assert_eq!(island_eye_address(0), Some(494));
        assert_eq!(island_eye_address(4), Some(68));
        assert_eq!(island_eye_address(5), None);
    }
}
