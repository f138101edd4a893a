//! Cross-core record codec.
//!
//! A record is one addressed update: either a [`DataRecord`] writing one
//! scalar (or char array) field of one table, or a [`SystemChange`] moving
//! the boot, run-mode or debug state machine. On the wire a record is a
//! [`Frame`]: one 32-bit marker word followed by its payload words.
//!
//! ```text
//! DataExchange  bool/int/float : [marker][value]
//! DataExchange  char           : [marker][4 bytes]...[<=4 bytes]
//! SystemChange                 : [marker]
//! ```
//!
//! Bit positions live in [`marker`]; this module only deals in typed values.

pub mod error;
pub mod fields;
pub mod marker;

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::consts::MAX_CHAR_PAYLOAD;
use crate::state::{BootPhase, DebugLevel, RunMode};

pub use error::{ApplyError, CodecError, FramingError};
use marker::{DataFields, char_words};

/// Longest frame: marker plus a full char payload.
pub const MAX_FRAME_WORDS: usize = 1 + char_words(MAX_CHAR_PAYLOAD);

/// Char payload buffer.
pub type CharBuf = Vec<u8, MAX_CHAR_PAYLOAD>;

// ─── Marker Enumerators ─────────────────────────────────────────────

/// Record class (marker top bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RecordClass {
    DataExchange = 1,
    SystemChange = 2,
}

impl RecordClass {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::DataExchange),
            2 => Some(Self::SystemChange),
            _ => None,
        }
    }

    /// Delivery priority when the channel is congested. Higher wins.
    #[inline]
    pub const fn priority(self) -> u8 {
        match self {
            Self::DataExchange => 0,
            Self::SystemChange => 1,
        }
    }
}

/// Payload representation of a DataExchange record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VariableType {
    Bool = 0,
    Int = 1,
    Float = 2,
    Char = 3,
}

impl VariableType {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Bool),
            1 => Some(Self::Int),
            2 => Some(Self::Float),
            3 => Some(Self::Char),
            _ => None,
        }
    }
}

/// Which table a DataExchange record addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ArrayIdent {
    SystemState = 1,
    ServoRuntime = 2,
    ServoConfig = 3,
    EyeOverlay = 4,
    EyeProfile = 5,
    /// Run-mode / debug-level update routed to SystemState.
    ModeDebug = 31,
}

impl ArrayIdent {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::SystemState),
            2 => Some(Self::ServoRuntime),
            3 => Some(Self::ServoConfig),
            4 => Some(Self::EyeOverlay),
            5 => Some(Self::EyeProfile),
            31 => Some(Self::ModeDebug),
            _ => None,
        }
    }
}

/// SystemChange subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SystemChangeKind {
    Boot = 1,
    Run = 2,
    Debug = 3,
}

impl SystemChangeKind {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Boot),
            2 => Some(Self::Run),
            3 => Some(Self::Debug),
            _ => None,
        }
    }

    /// Highest value the subtype may carry.
    #[inline]
    pub const fn wire_max(self) -> u16 {
        match self {
            Self::Boot => BootPhase::WIRE_MAX,
            Self::Run => RunMode::WIRE_MAX,
            Self::Debug => DebugLevel::WIRE_MAX,
        }
    }
}

// ─── Typed Records ──────────────────────────────────────────────────

/// Three-part record address: table, entry (or field), sub-field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub array: ArrayIdent,
    pub element: u8,
    pub row: u8,
}

impl Address {
    #[inline]
    pub const fn new(array: ArrayIdent, element: u8, row: u8) -> Self {
        Self {
            array,
            element,
            row,
        }
    }

    /// Build an address from native indices, rejecting values that do not
    /// fit their marker fields.
    pub fn checked(array: ArrayIdent, element: usize, row: usize) -> Result<Self, CodecError> {
        let element =
            u8::try_from(element).map_err(|_| CodecError::ElementOutOfRange { value: element })?;
        let row = u8::try_from(row).map_err(|_| CodecError::RowOutOfRange { value: row })?;
        Ok(Self::new(array, element, row))
    }
}

/// DataExchange payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Chars(CharBuf),
}

impl Value {
    /// Char payload from bytes, rejecting anything longer than a record carries.
    pub fn chars(bytes: &[u8]) -> Result<Self, CodecError> {
        let buf = CharBuf::from_slice(bytes).map_err(|_| CodecError::CharPayloadTooLong {
            len: bytes.len(),
            max: MAX_CHAR_PAYLOAD,
        })?;
        Ok(Self::Chars(buf))
    }

    #[inline]
    pub fn variable_type(&self) -> VariableType {
        match self {
            Self::Bool(_) => VariableType::Bool,
            Self::Int(_) => VariableType::Int,
            Self::Float(_) => VariableType::Float,
            Self::Chars(_) => VariableType::Char,
        }
    }

    /// Numeric view as `i32`. Floats round to nearest; chars have none.
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Self::Bool(b) => Some(i32::from(b)),
            Self::Int(i) => Some(i),
            Self::Float(f) if f.is_finite() => Some(f.round() as i32),
            Self::Float(_) | Self::Chars(_) => None,
        }
    }

    /// Numeric view as `f32`.
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(i as f32),
            Self::Float(f) => Some(f),
            Self::Chars(_) => None,
        }
    }

    /// Truth view: bools as-is, integers non-zero.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            Self::Int(i) => Some(i != 0),
            Self::Float(_) | Self::Chars(_) => None,
        }
    }

    pub fn as_chars(&self) -> Option<&[u8]> {
        match self {
            Self::Chars(buf) => Some(buf),
            _ => None,
        }
    }
}

/// Single-field update of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub address: Address,
    pub value: Value,
}

/// Boot, run-mode or debug-level transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemChange {
    Boot(BootPhase),
    Run(RunMode),
    Debug(DebugLevel),
}

impl SystemChange {
    #[inline]
    pub const fn kind(self) -> SystemChangeKind {
        match self {
            Self::Boot(_) => SystemChangeKind::Boot,
            Self::Run(_) => SystemChangeKind::Run,
            Self::Debug(_) => SystemChangeKind::Debug,
        }
    }

    #[inline]
    pub const fn wire_value(self) -> u16 {
        match self {
            Self::Boot(p) => p as u16,
            Self::Run(m) => m as u16,
            Self::Debug(d) => d as u16,
        }
    }

    /// Build from a subtype and raw value, rejecting values outside the
    /// subtype's domain.
    pub fn from_wire(kind: SystemChangeKind, value: u16) -> Result<Self, CodecError> {
        let out_of_range = CodecError::SystemValueOutOfRange {
            subtype: kind,
            value,
            max: kind.wire_max(),
        };
        if value > kind.wire_max() {
            return Err(out_of_range);
        }
        let byte = value as u8;
        let change = match kind {
            SystemChangeKind::Boot => BootPhase::from_u8(byte).map(Self::Boot),
            SystemChangeKind::Run => RunMode::from_u8(byte).map(Self::Run),
            SystemChangeKind::Debug => DebugLevel::from_u8(byte).map(Self::Debug),
        };
        change.ok_or(out_of_range)
    }
}

/// One record in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Data(DataRecord),
    System(SystemChange),
}

impl Record {
    #[inline]
    pub fn data(address: Address, value: Value) -> Self {
        Self::Data(DataRecord { address, value })
    }

    #[inline]
    pub const fn system(change: SystemChange) -> Self {
        Self::System(change)
    }

    #[inline]
    pub fn class(&self) -> RecordClass {
        match self {
            Self::Data(_) => RecordClass::DataExchange,
            Self::System(_) => RecordClass::SystemChange,
        }
    }
}

// ─── Frames ─────────────────────────────────────────────────────────

/// Encoded record: marker word plus payload, moved as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    words: Vec<u32, MAX_FRAME_WORDS>,
}

impl Frame {
    /// Wrap raw words received from the peer.
    pub fn from_words(words: &[u32]) -> Result<Self, FramingError> {
        let words = Vec::from_slice(words).map_err(|_| FramingError::PayloadLength {
            expected: MAX_FRAME_WORDS,
            actual: words.len(),
        })?;
        Ok(Self { words })
    }

    #[inline]
    pub fn marker(&self) -> u32 {
        self.words.first().copied().unwrap_or(0)
    }

    #[inline]
    pub fn payload(&self) -> &[u32] {
        self.words.get(1..).unwrap_or(&[])
    }

    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Record class from the marker, if it names one.
    #[inline]
    pub fn class(&self) -> Option<RecordClass> {
        RecordClass::from_u8(marker::class_of(self.marker()))
    }
}

/// What a marker announces, before its payload is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerDescriptor {
    Data {
        variable_type: VariableType,
        char_size: u8,
        address: Address,
    },
    System(SystemChange),
}

impl MarkerDescriptor {
    /// Number of payload words that must follow the marker.
    #[inline]
    pub fn payload_words(&self) -> usize {
        match *self {
            Self::Data {
                variable_type: VariableType::Char,
                char_size,
                ..
            } => char_words(usize::from(char_size)),
            Self::Data { .. } => 1,
            Self::System(_) => 0,
        }
    }
}

// ─── Encode / Decode ────────────────────────────────────────────────

/// Encode a record into its frame.
///
/// Every representable [`Record`] is in range: addresses, char payloads and
/// system values are validated when they are constructed.
pub fn encode(record: &Record) -> Frame {
    let mut words: Vec<u32, MAX_FRAME_WORDS> = Vec::new();
    match record {
        Record::Data(data) => {
            let char_size = match &data.value {
                Value::Chars(buf) => buf.len() as u8,
                _ => 0,
            };
            let marker = marker::pack_data(DataFields {
                class: RecordClass::DataExchange as u8,
                variable_type: data.value.variable_type() as u8,
                char_size,
                array: data.address.array as u8,
                element: data.address.element,
                row: data.address.row,
            });
            // Capacity is MAX_FRAME_WORDS; a full char payload fills it exactly.
            let _ = words.push(marker);
            match &data.value {
                Value::Bool(b) => {
                    let _ = words.push(u32::from(*b));
                }
                Value::Int(i) => {
                    let _ = words.push(*i as u32);
                }
                Value::Float(f) => {
                    let _ = words.push(f.to_bits());
                }
                Value::Chars(buf) => marker::pack_chars(buf, &mut words),
            }
        }
        Record::System(change) => {
            let _ = words.push(marker::pack_system(
                RecordClass::SystemChange as u8,
                change.kind() as u8,
                change.wire_value(),
            ));
        }
    }
    Frame { words }
}

/// Validate a marker word and describe the record it announces.
///
/// This is the only validation point against a corrupted or desynchronized
/// stream: unknown class, variable type, array ident or subtype is a
/// framing error, never a best-effort record.
pub fn decode_marker(marker: u32) -> Result<MarkerDescriptor, FramingError> {
    if marker == 0 {
        return Err(FramingError::NoRecord);
    }
    let class = marker::class_of(marker);
    match RecordClass::from_u8(class) {
        Some(RecordClass::DataExchange) => {
            let f = marker::unpack_data(marker);
            let variable_type = VariableType::from_u8(f.variable_type)
                .ok_or(FramingError::UnknownVariableType(f.variable_type))?;
            let array =
                ArrayIdent::from_u8(f.array).ok_or(FramingError::UnknownArrayIdent(f.array))?;
            let char_ok = match variable_type {
                VariableType::Char => usize::from(f.char_size) <= MAX_CHAR_PAYLOAD,
                _ => f.char_size == 0,
            };
            if !char_ok {
                return Err(FramingError::CharSize {
                    variable_type,
                    char_size: f.char_size,
                });
            }
            Ok(MarkerDescriptor::Data {
                variable_type,
                char_size: f.char_size,
                address: Address::new(array, f.element, f.row),
            })
        }
        Some(RecordClass::SystemChange) => {
            let f = marker::unpack_system(marker);
            let kind =
                SystemChangeKind::from_u8(f.subtype).ok_or(FramingError::UnknownSubtype(f.subtype))?;
            if f.reserved != 0 {
                return Err(FramingError::ReservedBits { marker });
            }
            let change = SystemChange::from_wire(kind, f.value).map_err(|_| {
                FramingError::SystemValueOutOfRange {
                    subtype: kind,
                    value: f.value,
                }
            })?;
            Ok(MarkerDescriptor::System(change))
        }
        None => Err(FramingError::UnknownRecordClass(class)),
    }
}

/// Decode a complete frame.
pub fn decode(frame: &Frame) -> Result<Record, FramingError> {
    let descriptor = decode_marker(frame.marker())?;
    let payload = frame.payload();
    let expected = descriptor.payload_words();
    if payload.len() != expected {
        return Err(FramingError::PayloadLength {
            expected,
            actual: payload.len(),
        });
    }

    match descriptor {
        MarkerDescriptor::System(change) => Ok(Record::System(change)),
        MarkerDescriptor::Data {
            variable_type,
            char_size,
            address,
        } => {
            let value = match variable_type {
                VariableType::Bool => match payload[0] {
                    0 => Value::Bool(false),
                    1 => Value::Bool(true),
                    other => return Err(FramingError::InvalidBool(other)),
                },
                VariableType::Int => Value::Int(payload[0] as i32),
                VariableType::Float => Value::Float(f32::from_bits(payload[0])),
                VariableType::Char => {
                    let mut buf = CharBuf::new();
                    marker::unpack_chars(payload, usize::from(char_size), &mut buf);
                    Value::Chars(buf)
                }
            };
            Ok(Record::data(address, value))
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
