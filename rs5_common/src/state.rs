//! Boot, run-mode and debug state enums shared by both cores.
//!
//! All enums use `#[repr(u8)]` so they fit a single atomic byte in the
//! state domains and a SystemChange record value on the wire.

use serde::{Deserialize, Serialize};

// ─── Cores ──────────────────────────────────────────────────────────

/// Processor core identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CoreId {
    /// Time-critical core: protocol reception, motion-limit enforcement.
    Core0 = 0,
    /// Ancillary core: indicator lighting, eye effects.
    Core1 = 1,
}

impl CoreId {
    /// The other core.
    #[inline]
    pub const fn peer(self) -> Self {
        match self {
            Self::Core0 => Self::Core1,
            Self::Core1 => Self::Core0,
        }
    }
}

// ─── Boot ───────────────────────────────────────────────────────────

/// Startup handshake phase.
///
/// Phases only advance; `Running` is terminal. Wire values 3 and 4 are
/// reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BootPhase {
    /// Core 0 local setup, part A.
    Core0SetupA = 0,
    /// Core 1 local setup.
    Core1SetupA = 1,
    /// Core 0 local setup, part B (servo startup).
    Core0SetupB = 2,
    /// Both cores in their run loops.
    Running = 5,
}

impl BootPhase {
    /// Highest value a SystemChange(Boot) record may carry.
    pub const WIRE_MAX: u16 = 5;

    /// Convert from raw `u8`. Returns `None` for reserved or invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Core0SetupA),
            1 => Some(Self::Core1SetupA),
            2 => Some(Self::Core0SetupB),
            5 => Some(Self::Running),
            _ => None,
        }
    }

    /// The phase that follows this one (`Running` maps to itself).
    #[inline]
    pub const fn next(self) -> Self {
        match self {
            Self::Core0SetupA => Self::Core1SetupA,
            Self::Core1SetupA => Self::Core0SetupB,
            Self::Core0SetupB | Self::Running => Self::Running,
        }
    }

    /// Core whose local work defines this phase. `None` for `Running`.
    #[inline]
    pub const fn owner(self) -> Option<CoreId> {
        match self {
            Self::Core0SetupA | Self::Core0SetupB => Some(CoreId::Core0),
            Self::Core1SetupA => Some(CoreId::Core1),
            Self::Running => None,
        }
    }

    #[inline]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl Default for BootPhase {
    fn default() -> Self {
        Self::Core0SetupA
    }
}

// ─── Run Mode ───────────────────────────────────────────────────────

/// Top-level behavior selector: which collaborator drives servo targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum RunMode {
    /// DMX-512 frames drive servo targets.
    Dmx = 0,
    /// USB serial commands drive servo targets.
    Serial = 1,
    /// Stored program playback.
    Program = 2,
    /// Hold last commanded positions.
    Pause = 3,
    /// Built-in demo animation.
    Demo = 4,
}

impl RunMode {
    /// Highest value a SystemChange(Run) record may carry.
    pub const WIRE_MAX: u16 = 4;

    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Dmx),
            1 => Some(Self::Serial),
            2 => Some(Self::Program),
            3 => Some(Self::Pause),
            4 => Some(Self::Demo),
            _ => None,
        }
    }

    /// Decode the three run-mode dip-switch bits (bit 1, 2, 4).
    ///
    /// Settings above `Demo` fall back to `Dmx`.
    #[inline]
    pub const fn from_dip_bits(bits: u8) -> Self {
        match Self::from_u8(bits & 0b111) {
            Some(mode) => mode,
            None => Self::Dmx,
        }
    }
}

impl Default for RunMode {
    fn default() -> Self {
        Self::Dmx
    }
}

// ─── Debug Level ────────────────────────────────────────────────────

/// Instrumentation verbosity tier. Never gates correctness-relevant behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DebugLevel {
    /// No instrumentation.
    None = 0,
    /// Boot information only.
    Startup = 1,
    /// DMX reception.
    Dmx = 2,
    /// Servo positions.
    Servo = 3,
    /// Model/animation.
    Model = 4,
    /// Servo supply voltage and current.
    VoltCurrent = 5,
    /// Eye pixel output.
    Pixel = 6,
}

impl DebugLevel {
    /// Highest value a SystemChange(Debug) record may carry.
    pub const WIRE_MAX: u16 = 6;

    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Startup),
            2 => Some(Self::Dmx),
            3 => Some(Self::Servo),
            4 => Some(Self::Model),
            5 => Some(Self::VoltCurrent),
            6 => Some(Self::Pixel),
            _ => None,
        }
    }

    /// Levels are exclusive tiers except `None`, which enables nothing.
    #[inline]
    pub const fn enables(self, topic: Self) -> bool {
        !matches!(self, Self::None) && (self as u8 == topic as u8 || matches!(topic, Self::Startup))
    }
}

impl Default for DebugLevel {
    fn default() -> Self {
        Self::Dmx
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
