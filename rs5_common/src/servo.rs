//! Per-channel servo defaults and flag bits.
//!
//! The default table is what a channel holds before any configuration file
//! is loaded. Motion math lives with the PWM collaborator; this module only
//! carries the limits it must respect.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

use crate::consts::{SERVO_CHANNELS, SERVO_SLEEP_DEFAULT_MS};

bitflags! {
    /// Boolean channel attributes, stored as one atomic byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ServoFlags: u8 {
        /// Channel may be driven. Unlicensed channels stay inert.
        const LICENSED = 0b0000_0001;
        /// Smooth (trapezoidal) motion instead of direct jumps.
        const SMOOTH   = 0b0000_0010;
        /// Analog servo: PWM may be dropped while asleep.
        const ANALOG   = 0b0000_0100;
    }
}

impl Default for ServoFlags {
    fn default() -> Self {
        Self::LICENSED | Self::SMOOTH | Self::ANALOG
    }
}

// ─── Travel Limits ──────────────────────────────────────────────────

/// Pulse-width and travel window of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServoLimits {
    /// Pulse width at `servo_min_deg` [µs].
    pub min_pwm: f32,
    /// Pulse width at `servo_max_deg` [µs].
    pub max_pwm: f32,
    /// Mechanical range of the servo itself [deg].
    pub servo_min_deg: f32,
    pub servo_max_deg: f32,
    /// Allowed travel inside the mechanical range [deg].
    pub min_deg: f32,
    pub max_deg: f32,
}

impl ServoLimits {
    /// Clamp a position to the allowed travel.
    ///
    /// Never panics: with `min_deg > max_deg` (a limit pair caught mid
    /// update) the result is `max_deg`, and a NaN bound is ignored.
    #[inline]
    pub fn clamp_deg(&self, deg: f32) -> f32 {
        deg.max(self.min_deg).min(self.max_deg)
    }

    /// Pulse width for a position, linear over the mechanical range.
    ///
    /// The position is clamped to the allowed travel first, so the result
    /// never commands the servo outside its configured window.
    pub fn degrees_to_pulse(&self, deg: f32) -> f32 {
        let span = self.servo_max_deg - self.servo_min_deg;
        if !span.is_finite() || span <= 0.0 {
            return self.min_pwm;
        }
        let frac = (self.clamp_deg(deg) - self.servo_min_deg) / span;
        self.min_pwm + frac * (self.max_pwm - self.min_pwm)
    }
}

// ─── Channel Defaults ───────────────────────────────────────────────

/// Power-on values of one servo channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoDefaults {
    pub name: &'static str,
    pub limits: ServoLimits,
    pub start_deg: f32,
    pub max_vel: f32,
    pub max_acc: f32,
    pub max_dec: f32,
    /// Sleep timeout after the last move [ms].
    pub sleep_ms: u32,
    /// PWM frequency [Hz].
    pub frequency: f32,
    pub flags: ServoFlags,
}

const NAMED_LIMITS: ServoLimits = ServoLimits {
    min_pwm: 670.0,
    max_pwm: 2200.0,
    servo_min_deg: 0.0,
    servo_max_deg: 180.0,
    min_deg: 0.0,
    max_deg: 180.0,
};

const fn named(name: &'static str, start_deg: f32, max_acc: f32, max_dec: f32) -> ServoDefaults {
    ServoDefaults {
        name,
        limits: NAMED_LIMITS,
        start_deg,
        max_vel: 290.0,
        max_acc,
        max_dec,
        sleep_ms: 1000,
        frequency: 50.0,
        flags: ServoFlags::all(),
    }
}

/// Generic channel: full mechanical range, conservative ramps.
pub const GENERIC_SERVO: ServoDefaults = ServoDefaults {
    name: "Generic",
    limits: ServoLimits {
        min_pwm: 670.0,
        max_pwm: 2200.0,
        servo_min_deg: 0.0,
        servo_max_deg: 360.0,
        min_deg: 0.0,
        max_deg: 360.0,
    },
    start_deg: 90.0,
    max_vel: 10000.0,
    max_acc: 1000.0,
    max_dec: 1000.0,
    sleep_ms: SERVO_SLEEP_DEFAULT_MS,
    frequency: 50.0,
    flags: ServoFlags::all(),
};

/// Channel defaults in channel order.
pub const SERVO_DEFAULTS: &[ServoDefaults] = &[
    ServoDefaults {
        limits: ServoLimits {
            max_deg: 80.0,
            ..NAMED_LIMITS
        },
        ..named("Jaw", 1.0, 10000.0, 10000.0)
    },
    ServoDefaults {
        max_vel: 10000.0,
        ..named("Yaw", 90.0, 2000.0, 1000.0)
    },
    named("Pitch", 90.0, 10000.0, 10000.0),
    named("Roll", 90.0, 10000.0, 10000.0),
    named("Eye", 90.0, 10000.0, 10000.0),
    GENERIC_SERVO,
];

const_assert_eq!(SERVO_DEFAULTS.len(), SERVO_CHANNELS);

/// Defaults for `channel`, falling back to [`GENERIC_SERVO`].
#[inline]
pub fn defaults_for(channel: usize) -> &'static ServoDefaults {
    SERVO_DEFAULTS.get(channel).unwrap_or(&GENERIC_SERVO)
}
