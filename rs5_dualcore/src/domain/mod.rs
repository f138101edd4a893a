//! Shared-state domains and their record appliers.
//!
//! Each domain owns one [`LockDomain`]. Setters lock, write atomics and
//! release; plain getters read the atomics without locking. A core holds a
//! full [`DeviceState`] replica and keeps it in step with its peer by
//! applying inbound records.

pub mod eye_overlay;
pub mod eye_profile;
pub mod servo_config;
pub mod servo_runtime;
pub mod system;

use std::sync::atomic::{AtomicU32, Ordering};

use rs5_common::config::DeviceConfig;
use rs5_common::record::{Address, ApplyError, ArrayIdent, CharBuf, FramingError, Value, VariableType};

use crate::lock::LockDomain;

pub use eye_overlay::EyeOverlayState;
pub use eye_profile::EyeProfileTable;
pub use servo_config::ServoConfigTable;
pub use servo_runtime::{RuntimeApplier, ServoRuntimeTable};
pub use system::{RateTimer, SystemState, SystemTimer};

// ─── Applier Seam ───────────────────────────────────────────────────

/// Applies DataExchange records addressed to one domain.
pub trait DomainApplier {
    /// Lock guarding the domain.
    fn domain(&self) -> &LockDomain;

    /// Write one field. Caller holds [`Self::domain`].
    fn apply_locked(&self, address: Address, value: &Value) -> Result<(), ApplyError>;

    /// Lock, write, release.
    fn apply(&self, address: Address, value: &Value) -> Result<(), ApplyError> {
        let _guard = self.domain().acquire();
        self.apply_locked(address, value)
    }
}

// ─── Payload Conversion ─────────────────────────────────────────────

fn mismatch(array: ArrayIdent, expected: VariableType, value: &Value) -> ApplyError {
    FramingError::TypeMismatch {
        array,
        expected,
        actual: value.variable_type(),
    }
    .into()
}

pub(crate) fn int_of(array: ArrayIdent, value: &Value) -> Result<i32, ApplyError> {
    value
        .as_i32()
        .ok_or_else(|| mismatch(array, VariableType::Int, value))
}

pub(crate) fn float_of(array: ArrayIdent, value: &Value) -> Result<f32, ApplyError> {
    value
        .as_f32()
        .ok_or_else(|| mismatch(array, VariableType::Float, value))
}

pub(crate) fn bool_of(array: ArrayIdent, value: &Value) -> Result<bool, ApplyError> {
    value
        .as_bool()
        .ok_or_else(|| mismatch(array, VariableType::Bool, value))
}

pub(crate) fn chars_of<'v>(array: ArrayIdent, value: &'v Value) -> Result<&'v [u8], ApplyError> {
    value
        .as_chars()
        .ok_or_else(|| mismatch(array, VariableType::Char, value))
}

/// Integer inside `lo..=hi`, else out of domain.
pub(crate) fn int_in(
    address: Address,
    value: &Value,
    lo: i32,
    hi: i32,
) -> Result<i32, ApplyError> {
    let v = int_of(address.array, value)?;
    if (lo..=hi).contains(&v) {
        Ok(v)
    } else {
        Err(out_of_domain(address))
    }
}

#[inline]
pub(crate) fn out_of_domain(address: Address) -> ApplyError {
    ApplyError::OutOfDomain {
        array: address.array,
        element: address.element,
        row: address.row,
    }
}

/// Singleton domains address fields by `element`; `row` must be zero.
pub(crate) fn singleton_row(address: Address) -> Result<(), ApplyError> {
    if address.row == 0 {
        Ok(())
    } else {
        Err(FramingError::RowOutOfRange {
            array: address.array,
            row: address.row,
        }
        .into())
    }
}

pub(crate) fn element_error(address: Address) -> ApplyError {
    FramingError::ElementOutOfRange {
        array: address.array,
        element: address.element,
    }
    .into()
}

pub(crate) fn row_error(address: Address) -> ApplyError {
    FramingError::RowOutOfRange {
        array: address.array,
        row: address.row,
    }
    .into()
}

// ─── Counters ───────────────────────────────────────────────────────

/// Lock-free sync diagnostics for one core.
#[derive(Debug, Default)]
pub struct SyncCounters {
    framing: AtomicU32,
    unlicensed: AtomicU32,
    dropped: AtomicU32,
    deferred: AtomicU32,
    applied: AtomicU32,
}

/// Point-in-time copy of [`SyncCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncSnapshot {
    pub framing: u32,
    pub unlicensed: u32,
    pub dropped: u32,
    pub deferred: u32,
    pub applied: u32,
}

impl SyncCounters {
    pub const fn new() -> Self {
        Self {
            framing: AtomicU32::new(0),
            unlicensed: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            deferred: AtomicU32::new(0),
            applied: AtomicU32::new(0),
        }
    }

    /// Count a refused record by error class.
    pub fn record_error(&self, err: &ApplyError) {
        let counter = match err {
            ApplyError::Framing(_) | ApplyError::OutOfDomain { .. } => &self.framing,
            ApplyError::Unlicensed { .. } => &self.unlicensed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            framing: self.framing.load(Ordering::Relaxed),
            unlicensed: self.unlicensed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
        }
    }
}

// ─── Device Replica ─────────────────────────────────────────────────

/// One core's replica of every shared domain.
#[derive(Debug)]
pub struct DeviceState {
    pub system: SystemState,
    pub servo_config: ServoConfigTable,
    pub servo_runtime: ServoRuntimeTable,
    pub eye_overlay: EyeOverlayState,
    pub eye_profiles: EyeProfileTable,
    pub counters: SyncCounters,
}

impl DeviceState {
    /// Populate every domain from configuration, then initialize the locks.
    pub fn new(config: &DeviceConfig, now: u32) -> Self {
        let servo_config = ServoConfigTable::from_config(config);
        let servo_runtime = ServoRuntimeTable::new(&servo_config, now);
        let state = Self {
            system: SystemState::from_config(config),
            servo_config,
            servo_runtime,
            eye_overlay: EyeOverlayState::from_config(&config.eyes),
            eye_profiles: EyeProfileTable::new(),
            counters: SyncCounters::new(),
        };
        state.init_locks();
        state
    }

    fn init_locks(&self) {
        self.system.domain().init();
        self.servo_config.domain().init();
        self.servo_runtime.domain().init();
        self.eye_overlay.domain().init();
        self.eye_profiles.domain().init();
    }

    /// Servo name as stored in the config table.
    pub fn servo_name(&self, channel: usize) -> Option<CharBuf> {
        self.servo_config.name(channel)
    }
}
