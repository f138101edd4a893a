//! Prelude module for common re-exports.
//!
//! `use rs5_common::prelude::*;` brings in the state enums, the record codec
//! and configuration types without listing individual paths.

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, DeviceConfig, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{EYE_PROFILE_COUNT, MAX_CHAR_PAYLOAD, SERVO_CHANNELS};

// ─── State Machines ─────────────────────────────────────────────────
pub use crate::state::{BootPhase, CoreId, DebugLevel, RunMode};

// ─── Records ────────────────────────────────────────────────────────
pub use crate::record::fields::{
    EyeOverlayField, EyeProfileField, ModeDebugField, ServoConfigField, ServoRuntimeField,
    SystemField,
};
pub use crate::record::{
    Address, ApplyError, ArrayIdent, CodecError, Frame, FramingError, Record, RecordClass,
    SystemChange, SystemChangeKind, Value, VariableType, decode, encode,
};

// ─── Tables ─────────────────────────────────────────────────────────
pub use crate::eyes::{EyeColorState, EyeProfile, Rgb};
pub use crate::servo::{ServoFlags, ServoLimits};
pub use crate::status::{StatusColor, StatusPattern, StatusState};
