//! Error types for record encoding, decoding and application.

use thiserror::Error;

use super::{ArrayIdent, SystemChangeKind, VariableType};

/// Encode-side range violations. These are programming errors on the
/// producing core; the record is never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// `element` does not fit its 8-bit marker field.
    #[error("element {value} exceeds marker field width")]
    ElementOutOfRange { value: usize },

    /// `row` does not fit its 8-bit marker field.
    #[error("row {value} exceeds marker field width")]
    RowOutOfRange { value: usize },

    /// Char payload longer than a record can carry.
    #[error("char payload of {len} bytes exceeds {max}")]
    CharPayloadTooLong { len: usize, max: usize },

    /// SystemChange value outside its subtype's domain.
    #[error("{subtype:?} value {value} outside 0..={max}")]
    SystemValueOutOfRange {
        subtype: SystemChangeKind,
        value: u16,
        max: u16,
    },
}

/// Protocol-framing errors on the consuming core.
///
/// Records that fail with one of these are discarded and counted; they are
/// never applied partially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingError {
    /// All-zero marker: no record present.
    #[error("empty marker")]
    NoRecord,

    #[error("unknown record class {0}")]
    UnknownRecordClass(u8),

    #[error("unknown variable type {0}")]
    UnknownVariableType(u8),

    #[error("unknown array ident {0}")]
    UnknownArrayIdent(u8),

    #[error("unknown system change subtype {0}")]
    UnknownSubtype(u8),

    /// SystemChange value outside its subtype's domain (or a reserved value).
    #[error("{subtype:?} value {value} is not a valid state")]
    SystemValueOutOfRange { subtype: SystemChangeKind, value: u16 },

    /// Reserved SystemChange bits were not zero.
    #[error("reserved bits set in marker {marker:#010x}")]
    ReservedBits { marker: u32 },

    /// Non-char record carried a non-zero `charSize`, or a char record is
    /// longer than any char field.
    #[error("char size {char_size} invalid for {variable_type:?}")]
    CharSize {
        variable_type: VariableType,
        char_size: u8,
    },

    /// Frame length does not match what the marker announces.
    #[error("payload length {actual} words, marker announces {expected}")]
    PayloadLength { expected: usize, actual: usize },

    /// Bool payload other than 0 or 1.
    #[error("bool payload {0:#x} is neither 0 nor 1")]
    InvalidBool(u32),

    /// `element` outside the addressed table.
    #[error("{array:?} has no element {element}")]
    ElementOutOfRange { array: ArrayIdent, element: u8 },

    /// `row` outside the addressed table.
    #[error("{array:?} has no row {row}")]
    RowOutOfRange { array: ArrayIdent, row: u8 },

    /// Payload cannot be converted to the field's native representation.
    #[error("{array:?} field expects {expected:?}, got {actual:?}")]
    TypeMismatch {
        array: ArrayIdent,
        expected: VariableType,
        actual: VariableType,
    },
}

/// Why an applier refused a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// Malformed or misaddressed record.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// Write to a servo channel beyond the licensed count.
    #[error("servo channel {channel} is not licensed")]
    Unlicensed { channel: u8 },

    /// Value outside the field's semantic domain (e.g. run mode 9).
    #[error("{array:?} element {element} row {row}: value out of domain")]
    OutOfDomain { array: ArrayIdent, element: u8, row: u8 },
}
