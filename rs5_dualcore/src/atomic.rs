//! Machine-word atomic cells for domain fields.
//!
//! Writers hold the domain lock; readers load without it. Char fields span
//! several words, so their readers take the lock too.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use rs5_common::consts::MAX_CHAR_PAYLOAD;
use rs5_common::record::CharBuf;
use rs5_common::record::marker::{char_words, pack_chars, unpack_chars};

/// `f32` stored as its bit pattern.
#[derive(Debug)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    pub const fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

const CHAR_CELL_WORDS: usize = char_words(MAX_CHAR_PAYLOAD);

/// Fixed-capacity byte string in packed atomic words.
#[derive(Debug)]
pub struct CharCell {
    len: AtomicU8,
    words: [AtomicU32; CHAR_CELL_WORDS],
}

impl CharCell {
    pub fn new(bytes: &[u8]) -> Self {
        let cell = Self {
            len: AtomicU8::new(0),
            words: std::array::from_fn(|_| AtomicU32::new(0)),
        };
        cell.store(bytes);
        cell
    }

    /// Overwrite the contents, truncating to capacity. Caller holds the lock.
    pub fn store(&self, bytes: &[u8]) {
        let bytes = &bytes[..bytes.len().min(MAX_CHAR_PAYLOAD)];
        let mut packed: heapless::Vec<u32, CHAR_CELL_WORDS> = heapless::Vec::new();
        pack_chars(bytes, &mut packed);
        for (i, cell) in self.words.iter().enumerate() {
            cell.store(packed.get(i).copied().unwrap_or(0), Ordering::Relaxed);
        }
        self.len.store(bytes.len() as u8, Ordering::Release);
    }

    /// Copy the contents out. Caller holds the lock.
    pub fn load(&self) -> CharBuf {
        let len = usize::from(self.len.load(Ordering::Acquire));
        let mut words: heapless::Vec<u32, CHAR_CELL_WORDS> = heapless::Vec::new();
        words.extend(self.words.iter().map(|w| w.load(Ordering::Relaxed)));
        let mut out = CharBuf::new();
        unpack_chars(&words, len, &mut out);
        out
    }
}
