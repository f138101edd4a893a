//! Marker word bit layout.
//!
//! This is the only module that shifts and masks marker bits. Everything
//! above it works with the typed fields in [`DataFields`] / [`SystemFields`].
//!
//! ## Layout
//!
//! ```text
//!  31 30 | 29 28 27 | 26 ........ 21 | 20 .... 16 | 15 ... 8 | 7 .... 0
//!  class | vtype    | char_size      | array      | element  | row        DataExchange
//!  class | subtype  | reserved (0)                 | value (16 bits)      SystemChange
//! ```
//!
//! `class` is never 0 for a valid record, so an all-zero word means
//! "no record".

const CLASS_SHIFT: u32 = 30;
const CLASS_MASK: u32 = 0b11;

const KIND_SHIFT: u32 = 27;
const KIND_MASK: u32 = 0b111;

const CHAR_SIZE_SHIFT: u32 = 21;
const CHAR_SIZE_MASK: u32 = 0b11_1111;

const ARRAY_SHIFT: u32 = 16;
const ARRAY_MASK: u32 = 0b1_1111;

const ELEMENT_SHIFT: u32 = 8;
const BYTE_MASK: u32 = 0xFF;

const SYSTEM_RESERVED_MASK: u32 = 0x07FF_0000;
const SYSTEM_VALUE_MASK: u32 = 0xFFFF;

/// Widest value the `char_size` field can hold.
pub const CHAR_SIZE_MAX: u8 = CHAR_SIZE_MASK as u8;

/// Widest value the `array` field can hold.
pub const ARRAY_MAX: u8 = ARRAY_MASK as u8;

/// Raw DataExchange marker fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFields {
    pub class: u8,
    pub variable_type: u8,
    pub char_size: u8,
    pub array: u8,
    pub element: u8,
    pub row: u8,
}

/// Raw SystemChange marker fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemFields {
    pub class: u8,
    pub subtype: u8,
    pub reserved: u16,
    pub value: u16,
}

/// Record class bits of a marker.
#[inline]
pub const fn class_of(marker: u32) -> u8 {
    ((marker >> CLASS_SHIFT) & CLASS_MASK) as u8
}

/// Pack DataExchange fields. Callers guarantee each value fits its field.
#[inline]
pub fn pack_data(fields: DataFields) -> u32 {
    debug_assert!(u32::from(fields.class) <= CLASS_MASK);
    debug_assert!(u32::from(fields.variable_type) <= KIND_MASK);
    debug_assert!(fields.char_size <= CHAR_SIZE_MAX);
    debug_assert!(fields.array <= ARRAY_MAX);

    (u32::from(fields.class) & CLASS_MASK) << CLASS_SHIFT
        | (u32::from(fields.variable_type) & KIND_MASK) << KIND_SHIFT
        | (u32::from(fields.char_size) & CHAR_SIZE_MASK) << CHAR_SIZE_SHIFT
        | (u32::from(fields.array) & ARRAY_MASK) << ARRAY_SHIFT
        | u32::from(fields.element) << ELEMENT_SHIFT
        | u32::from(fields.row)
}

#[inline]
pub const fn unpack_data(marker: u32) -> DataFields {
    DataFields {
        class: class_of(marker),
        variable_type: ((marker >> KIND_SHIFT) & KIND_MASK) as u8,
        char_size: ((marker >> CHAR_SIZE_SHIFT) & CHAR_SIZE_MASK) as u8,
        array: ((marker >> ARRAY_SHIFT) & ARRAY_MASK) as u8,
        element: ((marker >> ELEMENT_SHIFT) & BYTE_MASK) as u8,
        row: (marker & BYTE_MASK) as u8,
    }
}

/// Pack SystemChange fields. Reserved bits are always written as zero.
#[inline]
pub fn pack_system(class: u8, subtype: u8, value: u16) -> u32 {
    debug_assert!(u32::from(class) <= CLASS_MASK);
    debug_assert!(u32::from(subtype) <= KIND_MASK);

    (u32::from(class) & CLASS_MASK) << CLASS_SHIFT
        | (u32::from(subtype) & KIND_MASK) << KIND_SHIFT
        | u32::from(value)
}

#[inline]
pub const fn unpack_system(marker: u32) -> SystemFields {
    SystemFields {
        class: class_of(marker),
        subtype: ((marker >> KIND_SHIFT) & KIND_MASK) as u8,
        reserved: ((marker & SYSTEM_RESERVED_MASK) >> ARRAY_SHIFT) as u16,
        value: (marker & SYSTEM_VALUE_MASK) as u16,
    }
}

/// Pack up to four bytes per word, little-endian, zero-padded.
pub fn pack_chars(bytes: &[u8], out: &mut impl Extend<u32>) {
    out.extend(bytes.chunks(4).map(|chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        u32::from_le_bytes(word)
    }));
}

/// Unpack `len` bytes from little-endian packed words.
pub fn unpack_chars(words: &[u32], len: usize, out: &mut impl Extend<u8>) {
    out.extend(words.iter().flat_map(|w| w.to_le_bytes()).take(len));
}

/// Number of payload words needed for `len` char bytes.
#[inline]
pub const fn char_words(len: usize) -> usize {
    len.div_ceil(4)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_fields_occupy_documented_bits() {
        let marker = pack_data(DataFields {
            class: 1,
            variable_type: 0b111,
            char_size: 0,
            array: 0,
            element: 0,
            row: 0,
        });
        assert_eq!(marker, 0x7800_0000);

        let marker = pack_data(DataFields {
            class: 0,
            variable_type: 0,
            char_size: CHAR_SIZE_MAX,
            array: ARRAY_MAX,
            element: 0xAB,
            row: 0xCD,
        });
        assert_eq!(marker, 0x07FF_ABCD);
    }

    #[test]
    fn class_sits_in_top_bits() {
        assert_eq!(class_of(0x4000_0000), 1);
        assert_eq!(class_of(0x8000_0000), 2);
        assert_eq!(class_of(0xC000_0000), 3);
        assert_eq!(class_of(0x3FFF_FFFF), 0);
    }

    #[test]
    fn system_reserved_bits_are_reported() {
        let clean = pack_system(2, 1, 5);
        assert_eq!(unpack_system(clean).reserved, 0);
        assert_eq!(unpack_system(clean).value, 5);

        let dirty = clean | 0x0001_0000;
        assert_ne!(unpack_system(dirty).reserved, 0);
    }

    #[test]
    fn chars_pack_little_endian_with_padding() {
        let mut words: Vec<u32> = Vec::new();
        pack_chars(b"Jaw!X", &mut words);
        assert_eq!(words, vec![u32::from_le_bytes(*b"Jaw!"), u32::from(b'X')]);
        assert_eq!(char_words(5), 2);

        let mut bytes: Vec<u8> = Vec::new();
        unpack_chars(&words, 5, &mut bytes);
        assert_eq!(bytes, b"Jaw!X");
    }

    #[test]
    fn empty_chars_take_no_words() {
        let mut words: Vec<u32> = Vec::new();
        pack_chars(&[], &mut words);
        assert!(words.is_empty());
        assert_eq!(char_words(0), 0);
    }
}
