use crate::context::{partmap::Inherit, BitField, Word};

/// The packed context words valid from one split point onwards.
///
/// Next to the values, every blob carries a parallel committed mask with one bit per value bit.
/// A committed bit marks a value that was explicitly painted at this split point, as opposed to
/// one inherited from the preceding blob. Point paints stop running forward when they reach a
/// blob in which their field is committed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextBlob {
    values: Vec<Word>,
    committed: Vec<Word>,
}

impl ContextBlob {
    /// Create a zeroed blob of `words` words
    pub fn new(words: usize) -> Self {
        ContextBlob {
            values: vec![0; words],
            committed: vec![0; words],
        }
    }

    /// Number of words in the blob
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the blob holds no words
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Grow the blob to at least `words` words, new words are zero
    pub fn grow(&mut self, words: usize) {
        if words > self.values.len() {
            self.values.resize(words, 0);
            self.committed.resize(words, 0);
        }
    }

    /// The packed values
    pub fn values(&self) -> &[Word] {
        &self.values
    }

    /// The committed mask
    pub fn committed(&self) -> &[Word] {
        &self.committed
    }

    /// Read a field
    pub fn get(&self, field: &BitField) -> Word {
        field.get(&self.values)
    }

    /// Write a field without touching the committed mask
    pub fn set(&mut self, field: &BitField, value: Word) {
        field.set(&mut self.values, value);
    }

    /// Returns true if any bit of `mask` in `word` was painted at this split point
    pub fn is_committed(&self, word: usize, mask: Word) -> bool {
        self.committed[word] & mask != 0
    }

    /// Mark the bits of `mask` in `word` as painted at this split point
    pub fn commit(&mut self, word: usize, mask: Word) {
        self.committed[word] |= mask;
    }

    /// Replace the bits of `mask` in `word` by the matching bits of `value`.
    ///
    /// `value` is expected in its position within the word.
    pub fn write_masked(&mut self, word: usize, mask: Word, value: Word) {
        self.values[word] = (self.values[word] & !mask) | (value & mask);
    }
}

impl Inherit for ContextBlob {
    fn inherit(&self) -> Self {
        ContextBlob {
            values: self.values.clone(),
            committed: vec![0; self.committed.len()],
        }
    }
}
