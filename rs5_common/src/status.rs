//! Status indicator states and their color/blink patterns.
//!
//! The indicator is the only user-visible failure channel. Patterns are
//! looked up by enumerator through [`StatusState::pattern`], so reordering
//! the variants never changes what a state looks like.

use static_assertions::const_assert_eq;

use crate::consts::STATUS_STATE_COUNT;

/// Indicator LED color: each channel fully on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusColor {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

impl StatusColor {
    pub const OFF: Self = Self::rgb(false, false, false);

    #[inline]
    pub const fn rgb(red: bool, green: bool, blue: bool) -> Self {
        Self { red, green, blue }
    }

    #[inline]
    pub const fn is_off(self) -> bool {
        !self.red && !self.green && !self.blue
    }
}

/// Color plus blink half-period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusPattern {
    pub color: StatusColor,
    /// Time between on/off toggles [ms].
    pub interval_ms: u32,
}

/// Named indicator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusState {
    /// Cores still in the boot handshake.
    Boot,
    /// Servos moving to their start positions.
    ServoStartup,
    DmxReceive,
    /// DMX packets stale or absent.
    DmxBad,
    UsbReceive,
    UsbBad,
    Demo,
    ServoStatusStartup,
    ServoStartSuccess,
    NotLicensed,
    Moving,
    Still,
    PwmDisabled,
    Off,
}

const fn pat(r: bool, g: bool, b: bool, interval_ms: u32) -> StatusPattern {
    StatusPattern {
        color: StatusColor::rgb(r, g, b),
        interval_ms,
    }
}

impl StatusState {
    /// Every state, in table order.
    pub const ALL: &'static [Self] = &[
        Self::Boot,
        Self::ServoStartup,
        Self::DmxReceive,
        Self::DmxBad,
        Self::UsbReceive,
        Self::UsbBad,
        Self::Demo,
        Self::ServoStatusStartup,
        Self::ServoStartSuccess,
        Self::NotLicensed,
        Self::Moving,
        Self::Still,
        Self::PwmDisabled,
        Self::Off,
    ];

    pub const fn pattern(self) -> StatusPattern {
        match self {
            Self::Boot => pat(true, false, false, 500),
            Self::ServoStartup => pat(true, false, true, 50),
            Self::DmxReceive => pat(false, false, true, 300),
            Self::DmxBad => pat(true, false, false, 600),
            Self::UsbReceive => pat(false, true, false, 50),
            Self::UsbBad => pat(true, false, false, 100),
            Self::Demo => pat(true, true, true, 50),
            Self::ServoStatusStartup => pat(true, false, true, 100),
            Self::ServoStartSuccess => pat(false, true, false, 100),
            Self::NotLicensed => pat(false, false, false, 100),
            Self::Moving => pat(true, true, false, 100),
            Self::Still => pat(false, true, false, 100),
            Self::PwmDisabled => pat(true, false, false, 100),
            Self::Off => pat(false, false, false, 100),
        }
    }
}

const_assert_eq!(StatusState::ALL.len(), STATUS_STATE_COUNT);
