use log::trace;

use crate::{
    address::Address,
    context::{ContextStore, Word},
    Result,
};

/// The last blob fetched, with the window of offsets it is valid for.
#[derive(Debug, Clone)]
struct Window {
    space: u32,
    first: u64,
    last: u64,
    words: Vec<Word>,
}

impl Window {
    fn fetch(store: &ContextStore, addr: &Address) -> Self {
        let range = store.get_context(addr);
        trace!(
            "context window refill at {addr}: {:#x} - {:#x}",
            range.first,
            range.last
        );
        Window {
            space: addr.space().index(),
            first: range.first,
            last: range.last,
            words: range.words.to_vec(),
        }
    }

    fn contains(&self, addr: &Address) -> bool {
        self.space == addr.space().index()
            && self.first <= addr.offset()
            && addr.offset() <= self.last
    }

    /// A forward paint starting at `addr` may run into the window
    fn reachable_from(&self, addr: &Address) -> bool {
        self.space == addr.space().index() && addr.offset() <= self.last
    }

    fn overlaps(&self, lo: &Address, hi: &Address) -> bool {
        self.space == lo.space().index() && lo.offset() <= self.last && hi.offset() >= self.first
    }
}

/// Decoder-side access to a [`ContextStore`].
///
/// Consecutive instructions usually share one blob, so the lookup keeps a copy of the last
/// blob fetched together with its validity window and only consults the store again once an
/// address falls outside it. Writes made while decoding (global context changes) go through the
/// lookup so the window is dropped whenever they may touch it. Writes can be switched off, for
/// instance while re-decoding for display only.
///
/// # Example
///
/// ```rust
/// use ctxscope::{address::{AddrSpace, Address, SpaceManager}, context::{ContextLookup, ContextStore}};
///
/// let mut spaces = SpaceManager::new();
/// let ram = spaces.insert(AddrSpace::new("ram", 1, 4, 1, false));
///
/// let mut store = ContextStore::new();
/// store.register_variable("thumb", 0, 0)?;
///
/// let mut lookup = ContextLookup::new(&mut store);
/// lookup.set_context(&Address::new(&ram, 0x100)?, 0, 0x8000_0000, 0x8000_0000)?;
/// assert_eq!(lookup.get_context(&Address::new(&ram, 0x104)?)[0], 0x8000_0000);
/// # Ok::<(), ctxscope::Error>(())
/// ```
#[derive(Debug)]
pub struct ContextLookup<'a> {
    store: &'a mut ContextStore,
    allow_set: bool,
    window: Option<Window>,
}

impl<'a> ContextLookup<'a> {
    /// Create a lookup over `store` with writes enabled
    pub fn new(store: &'a mut ContextStore) -> Self {
        ContextLookup {
            store,
            allow_set: true,
            window: None,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &ContextStore {
        &*self.store
    }

    /// Enable or disable writes through this lookup
    pub fn allow_set(&mut self, allow: bool) {
        self.allow_set = allow;
    }

    /// Forget the remembered window
    pub fn reset(&mut self) {
        self.window = None;
    }

    /// The packed context words covering `addr`
    pub fn get_context(&mut self, addr: &Address) -> &[Word] {
        let window = match self.window.take() {
            Some(window) if window.contains(addr) => window,
            _ => Window::fetch(&*self.store, addr),
        };
        &self.window.insert(window).words
    }

    /// Point paint raw context bits from `addr` forward, see
    /// [`ContextStore::set_context_change_point`]. Ignored while writes are disabled.
    ///
    /// # Errors
    /// Returns [`crate::Error::WordOutOfRange`] if `word` lies past the end of the blob.
    pub fn set_context(
        &mut self,
        addr: &Address,
        word: usize,
        mask: Word,
        value: Word,
    ) -> Result<()> {
        if !self.allow_set {
            return Ok(());
        }

        self.store.set_context_change_point(addr, word, mask, value)?;
        if self
            .window
            .as_ref()
            .is_some_and(|window| window.reachable_from(addr))
        {
            self.window = None;
        }
        Ok(())
    }

    /// Region paint raw context bits over `[lo, hi]`, see
    /// [`ContextStore::set_context_region`]. Ignored while writes are disabled.
    ///
    /// # Errors
    /// - [`crate::Error::WordOutOfRange`] if `word` lies past the end of the blob
    /// - [`crate::Error::InvalidRange`] if `hi` precedes `lo` or lies in another space
    pub fn set_context_region(
        &mut self,
        lo: &Address,
        hi: &Address,
        word: usize,
        mask: Word,
        value: Word,
    ) -> Result<()> {
        if !self.allow_set {
            return Ok(());
        }

        self.store.set_context_region(lo, hi, word, mask, value)?;
        if self
            .window
            .as_ref()
            .is_some_and(|window| window.overlaps(lo, hi))
        {
            self.window = None;
        }
        Ok(())
    }
}
