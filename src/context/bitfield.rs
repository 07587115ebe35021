//! Placement of a single context variable inside the packed word array.
//!
//! Bit positions are absolute across the whole blob and count from the most significant bit
//! of word 0, so bit 0 is the top bit of the first word and bit 32 the top bit of the second.

use crate::context::{Word, BITS_PER_WORD};

/// Describes where one named context variable lives in a context blob.
///
/// A `BitField` is immutable once created. Reading a field is `(words[word] >> shift) & mask`,
/// writing it clears `mask << shift` in the word and or-s in the new value.
///
/// # Examples
///
/// ```rust
/// use ctxscope::context::BitField;
///
/// // Bits 4..=7 of word 0, counted from the most significant bit
/// let field = BitField::new(4, 7).unwrap();
/// let mut words = [0u32; 1];
/// field.set(&mut words, 0xA);
///
/// assert_eq!(words[0], 0x0A00_0000);
/// assert_eq!(field.get(&words), 0xA);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    word: usize,
    shift: u32,
    mask: Word,
}

impl BitField {
    /// Create the descriptor for the absolute bit span `[start, end]`.
    ///
    /// Returns `None` if `end` precedes `start` or the span crosses a word boundary.
    pub fn new(start: u32, end: u32) -> Option<Self> {
        if end < start || start / BITS_PER_WORD != end / BITS_PER_WORD {
            return None;
        }

        let word = start / BITS_PER_WORD;
        let start_bit = start - word * BITS_PER_WORD;
        let end_bit = end - word * BITS_PER_WORD;
        let shift = BITS_PER_WORD - end_bit - 1;
        let mask = Word::MAX >> (start_bit + shift);

        Some(BitField {
            word: word as usize,
            shift,
            mask,
        })
    }

    /// Index of the word holding the field
    pub fn word(&self) -> usize {
        self.word
    }

    /// Distance of the field's least significant bit from bit 0 of its word
    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Right-justified mask covering the field's width
    pub fn mask(&self) -> Word {
        self.mask
    }

    /// The mask in its position within the word
    pub fn shifted_mask(&self) -> Word {
        self.mask << self.shift
    }

    /// Number of bits in the field
    pub fn width(&self) -> u32 {
        self.mask.count_ones()
    }

    /// Number of words a blob needs to hold this field
    pub fn words_needed(&self) -> usize {
        self.word + 1
    }

    /// Extract the field from a word array.
    ///
    /// # Panics
    /// Panics if `words` is too short to hold the field.
    pub fn get(&self, words: &[Word]) -> Word {
        (words[self.word] >> self.shift) & self.mask
    }

    /// Store `value` into the field, leaving every other bit untouched.
    ///
    /// Bits of `value` beyond the field's width are discarded.
    ///
    /// # Panics
    /// Panics if `words` is too short to hold the field.
    pub fn set(&self, words: &mut [Word], value: Word) {
        let current = words[self.word] & !(self.mask << self.shift);
        words[self.word] = current | ((value & self.mask) << self.shift);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_top_bit() {
        let field = BitField::new(0, 0).unwrap();
        assert_eq!(field.word(), 0);
        assert_eq!(field.shift(), 31);
        assert_eq!(field.mask(), 1);
        assert_eq!(field.shifted_mask(), 0x8000_0000);
    }

    #[test]
    fn whole_word() {
        let field = BitField::new(32, 63).unwrap();
        assert_eq!(field.word(), 1);
        assert_eq!(field.shift(), 0);
        assert_eq!(field.mask(), Word::MAX);
        assert_eq!(field.width(), 32);
        assert_eq!(field.words_needed(), 2);
    }

    #[test]
    fn low_bits_of_second_word() {
        let field = BitField::new(60, 63).unwrap();
        assert_eq!(field.word(), 1);
        assert_eq!(field.shift(), 0);
        assert_eq!(field.mask(), 0xF);
    }

    #[test]
    fn crossing_rejected() {
        assert!(BitField::new(30, 33).is_none());
        assert!(BitField::new(31, 32).is_none());
        assert!(BitField::new(5, 4).is_none());
    }

    #[test]
    fn set_preserves_neighbours() {
        let low = BitField::new(28, 31).unwrap();
        let high = BitField::new(24, 27).unwrap();
        let mut words = [0xFFFF_FFFFu32];

        low.set(&mut words, 0x3);
        assert_eq!(words[0], 0xFFFF_FFF3);
        assert_eq!(high.get(&words), 0xF);

        high.set(&mut words, 0x0);
        assert_eq!(words[0], 0xFFFF_FF03);
        assert_eq!(low.get(&words), 0x3);
    }

    #[test]
    fn set_truncates_value() {
        let field = BitField::new(0, 1).unwrap();
        let mut words = [0u32];
        field.set(&mut words, 0x7);
        assert_eq!(field.get(&words), 0x3);
        assert_eq!(words[0], 0xC000_0000);
    }
}
