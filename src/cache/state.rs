use crate::{
    address::Address,
    context::{BitField, ContextLookup, Word},
};

/// A record the [`crate::cache::DecodeContextCache`] can hand out and recycle.
///
/// The cache only needs to bind a record to an address and return it to a blank state when the
/// record is reused for another address. Everything else about the record belongs to the
/// decoder.
pub trait DecodeState {
    /// The address the record is bound to, `None` while unbound
    fn address(&self) -> Option<&Address>;

    /// Bind the record to `addr`
    fn set_address(&mut self, addr: Address);

    /// Drop every decoded result, the address binding is left to the caller
    fn reset(&mut self);
}

/// How far decoding of the instruction at a record's address has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePhase {
    /// Nothing decoded yet
    #[default]
    Uninitialized,
    /// Instruction matched, operands resolved for display
    Disassembly,
    /// Semantics generated as well
    Pcode,
}

/// Decode state of one instruction address.
///
/// Holds the context words the instruction was decoded under, so repeated lookups of the same
/// address do not consult the context store again.
#[derive(Debug, Clone, Default)]
pub struct ParserState {
    addr: Option<Address>,
    phase: ParsePhase,
    context: Vec<Word>,
}

impl ParserState {
    /// Create an unbound, uninitialized record
    pub fn new() -> Self {
        Self::default()
    }

    /// Current decode phase
    pub fn phase(&self) -> ParsePhase {
        self.phase
    }

    /// Advance or rewind the decode phase
    pub fn set_phase(&mut self, phase: ParsePhase) {
        self.phase = phase;
    }

    /// The context words loaded for this record, empty until [`ParserState::load_context`]
    pub fn context(&self) -> &[Word] {
        &self.context
    }

    /// Extract one context variable from the loaded words.
    ///
    /// Fields beyond the loaded words read as zero.
    pub fn context_value(&self, field: &BitField) -> Word {
        if field.word() < self.context.len() {
            field.get(&self.context)
        } else {
            0
        }
    }

    /// Copy the context words covering the record's address out of `lookup`.
    ///
    /// Returns false and leaves the record untouched if it is not bound to an address.
    pub fn load_context(&mut self, lookup: &mut ContextLookup<'_>) -> bool {
        let Some(addr) = &self.addr else {
            return false;
        };

        let words = lookup.get_context(addr);
        self.context.clear();
        self.context.extend_from_slice(words);
        true
    }
}

impl DecodeState for ParserState {
    fn address(&self) -> Option<&Address> {
        self.addr.as_ref()
    }

    fn set_address(&mut self, addr: Address) {
        self.addr = Some(addr);
    }

    fn reset(&mut self) {
        self.phase = ParsePhase::Uninitialized;
        self.context.clear();
    }
}
