//! Address-indexed storage of context variables.
//!
//! The [`ContextStore`] keeps one [`ContextBlob`] per split point. Variables are registered once
//! as bit fields of that blob, then painted either forward from a point or over an explicit
//! region. A point paint runs forward until it reaches a split point where the same field was
//! painted on its own, so later independent decisions are never overwritten by an earlier one.
//!
//! # Example
//!
//! ```rust
//! use ctxscope::{address::{AddrSpace, Address, SpaceManager}, context::ContextStore};
//!
//! let mut spaces = SpaceManager::new();
//! let ram = spaces.insert(AddrSpace::new("ram", 1, 4, 1, false));
//! let at = |offset| Address::new(&ram, offset);
//!
//! let mut store = ContextStore::new();
//! store.register_variable("mode", 0, 0)?;
//! store.set_value("mode", &at(0x1000)?, 1)?;
//! store.set_value("mode", &at(0x2000)?, 0)?;
//!
//! assert_eq!(store.get_value("mode", &at(0x0500)?)?, 0);
//! assert_eq!(store.get_value("mode", &at(0x1500)?)?, 1);
//! assert_eq!(store.get_value("mode", &at(0x2500)?)?, 0);
//! # Ok::<(), ctxscope::Error>(())
//! ```

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::{
    address::{Address, SpaceManager},
    context::{check_range, partmap::PartitionMap, BitField, ContextBlob, Word},
    encoding::{AttributeId, Element, ElementId},
    Error, Result,
};

/// The context words covering an address, with the offsets bounding their validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextRange<'a> {
    /// The packed context words
    pub words: &'a [Word],
    /// First offset in the address's space covered by `words`
    pub first: u64,
    /// Last offset in the address's space covered by `words`
    pub last: u64,
}

/// Interval-indexed store of context variables.
#[derive(Debug, Clone)]
pub struct ContextStore {
    variables: BTreeMap<String, BitField>,
    blobs: PartitionMap<ContextBlob>,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStore {
    /// Create an empty store without variables
    pub fn new() -> Self {
        ContextStore {
            variables: BTreeMap::new(),
            blobs: PartitionMap::new(ContextBlob::new(0)),
        }
    }

    /// Register a context variable occupying the absolute bits `[start, end]`.
    ///
    /// The blob grows to hold the new field. Registering a name again replaces its layout.
    ///
    /// # Errors
    /// - [`Error::RegistrationFrozen`] if any value has been painted already
    /// - [`Error::BitFieldSpan`] if the span crosses a word boundary or is reversed
    pub fn register_variable(&mut self, name: &str, start: u32, end: u32) -> Result<()> {
        if !self.blobs.is_empty() {
            return Err(Error::RegistrationFrozen(name.to_string()));
        }

        let field = BitField::new(start, end).ok_or_else(|| Error::BitFieldSpan {
            name: name.to_string(),
            start,
            end,
        })?;

        self.blobs
            .default_value_mut()
            .grow(field.words_needed());
        self.variables.insert(name.to_string(), field);

        debug!(
            "registered context variable '{name}' at bits [{start},{end}], blob is {} words",
            self.context_size()
        );
        Ok(())
    }

    /// Look up the layout of a variable.
    ///
    /// # Errors
    /// Returns [`Error::UnknownVariable`] if no such variable was registered.
    pub fn variable(&self, name: &str) -> Result<&BitField> {
        self.variables
            .get(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    /// Iterate the registered variables in name order
    pub fn variables(&self) -> impl Iterator<Item = (&str, &BitField)> {
        self.variables
            .iter()
            .map(|(name, field)| (name.as_str(), field))
    }

    /// Number of words in a context blob
    pub fn context_size(&self) -> usize {
        self.blobs.default_value().len()
    }

    /// The blob applying where nothing was painted
    pub fn default_blob(&self) -> &ContextBlob {
        self.blobs.default_value()
    }

    /// Set the default value of a variable.
    ///
    /// # Errors
    /// Returns [`Error::UnknownVariable`] if no such variable was registered.
    pub fn set_variable_default(&mut self, name: &str, value: Word) -> Result<()> {
        let field = *self.variable(name)?;
        self.blobs.default_value_mut().set(&field, value);
        Ok(())
    }

    /// Get the default value of a variable.
    ///
    /// # Errors
    /// Returns [`Error::UnknownVariable`] if no such variable was registered.
    pub fn get_variable_default(&self, name: &str) -> Result<Word> {
        let field = self.variable(name)?;
        Ok(self.blobs.default_value().get(field))
    }

    /// Paint `value` into a variable from `addr` forward.
    ///
    /// The value holds until the first later split point at which this variable was itself
    /// painted. That split point, and everything after it, keeps its value.
    ///
    /// # Errors
    /// Returns [`Error::UnknownVariable`] if no such variable was registered.
    pub fn set_value(&mut self, name: &str, addr: &Address, value: Word) -> Result<()> {
        let field = *self.variable(name)?;
        trace!("paint '{name}' = {value:#x} from {addr}");
        self.paint_forward(addr, field.word(), field.shifted_mask(), |blob| {
            blob.set(&field, value);
        });
        Ok(())
    }

    /// Paint `value` into a variable for every address in `[lo, hi]`.
    ///
    /// Addresses outside the region keep their values.
    ///
    /// # Errors
    /// - [`Error::UnknownVariable`] if no such variable was registered
    /// - [`Error::InvalidRange`] if `hi` precedes `lo` or lies in another space
    pub fn set_value_region(
        &mut self,
        name: &str,
        lo: &Address,
        hi: &Address,
        value: Word,
    ) -> Result<()> {
        let field = *self.variable(name)?;
        check_range(lo, hi)?;
        trace!("paint '{name}' = {value:#x} over {lo} - {hi}");
        self.paint_region(lo, hi, field.word(), field.shifted_mask(), |blob| {
            blob.set(&field, value);
        });
        Ok(())
    }

    /// Read a variable at `addr`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownVariable`] if no such variable was registered.
    pub fn get_value(&self, name: &str, addr: &Address) -> Result<Word> {
        let field = self.variable(name)?;
        Ok(self.blobs.get(addr).get(field))
    }

    /// The packed context words covering `addr`
    pub fn get_context_blob(&self, addr: &Address) -> &[Word] {
        self.blobs.get(addr).values()
    }

    /// The packed context words covering `addr`, with the offsets bounding their validity
    pub fn get_context(&self, addr: &Address) -> ContextRange<'_> {
        let bounds = self.blobs.bounds(addr);
        ContextRange {
            words: bounds.value.values(),
            first: bounds.before.map_or(0, Address::offset),
            last: bounds
                .after
                .map_or(addr.space().highest(), |after| after.offset() - 1),
        }
    }

    /// Point paint of raw bits: replace the bits of `mask` in `word` by those of `value`, from
    /// `addr` forward until a split point where any of these bits was painted on its own.
    ///
    /// `value` is expected in its position within the word.
    ///
    /// # Errors
    /// Returns [`Error::WordOutOfRange`] if `word` is not below [`ContextStore::context_size`].
    pub fn set_context_change_point(
        &mut self,
        addr: &Address,
        word: usize,
        mask: Word,
        value: Word,
    ) -> Result<()> {
        self.check_word(word)?;
        self.paint_forward(addr, word, mask, |blob| blob.write_masked(word, mask, value));
        Ok(())
    }

    /// Region paint of raw bits: replace the bits of `mask` in `word` by those of `value` for
    /// every address in `[lo, hi]`.
    ///
    /// # Errors
    /// - [`Error::WordOutOfRange`] if `word` is not below [`ContextStore::context_size`]
    /// - [`Error::InvalidRange`] if `hi` precedes `lo` or lies in another space
    pub fn set_context_region(
        &mut self,
        lo: &Address,
        hi: &Address,
        word: usize,
        mask: Word,
        value: Word,
    ) -> Result<()> {
        self.check_word(word)?;
        check_range(lo, hi)?;
        self.paint_region(lo, hi, word, mask, |blob| blob.write_masked(word, mask, value));
        Ok(())
    }

    /// Iterate the split points and their blobs in address order
    pub fn split_points(&self) -> impl Iterator<Item = (&Address, &ContextBlob)> {
        self.blobs.iter()
    }

    /// Returns true if no value was painted at any address
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Drop every split point. Variables and defaults are kept.
    pub fn clear(&mut self) {
        self.blobs.clear();
    }

    fn check_word(&self, word: usize) -> Result<()> {
        if word >= self.context_size() {
            return Err(Error::WordOutOfRange {
                word,
                size: self.context_size(),
            });
        }
        Ok(())
    }

    fn paint_forward<F>(&mut self, addr: &Address, word: usize, mask: Word, mut apply: F)
    where
        F: FnMut(&mut ContextBlob),
    {
        self.blobs.split(addr);

        let mut points = self.blobs.range_mut(addr, None);
        if let Some((_, blob)) = points.next() {
            apply(blob);
            blob.commit(word, mask);
        }
        for (point, blob) in points {
            if blob.is_committed(word, mask) {
                trace!("paint stops at independently set point {point}");
                break;
            }
            apply(blob);
        }
    }

    fn paint_region<F>(&mut self, lo: &Address, hi: &Address, word: usize, mask: Word, mut apply: F)
    where
        F: FnMut(&mut ContextBlob),
    {
        let end = hi.successor();
        if let Some(end) = &end {
            self.blobs.split(end);
        }
        self.blobs.split(lo);

        for (_, blob) in self.blobs.range_mut(lo, end.as_ref()) {
            apply(blob);
            blob.commit(word, mask);
        }
    }

    /// Encode the default blob and every split point as `context_pointset` elements.
    ///
    /// Each pointset carries one `set` child per registered variable. The default blob is
    /// written first, without address attributes.
    pub fn encode(&self) -> Vec<Element> {
        let mut points = Vec::with_capacity(self.blobs.len() + 1);
        points.push(self.encode_pointset(None, self.blobs.default_value()));
        for (addr, blob) in self.blobs.iter() {
            points.push(self.encode_pointset(Some(addr), blob));
        }
        points
    }

    fn encode_pointset(&self, addr: Option<&Address>, blob: &ContextBlob) -> Element {
        let mut pointset = Element::new(ElementId::ContextPointset);
        if let Some(addr) = addr {
            pointset = pointset.with_address(addr);
        }

        for (name, field) in &self.variables {
            pointset.push_child(
                Element::new(ElementId::Set)
                    .with_string(AttributeId::Name, name)
                    .with_unsigned(AttributeId::Val, u64::from(blob.get(field))),
            );
        }
        pointset
    }

    /// Replay one `context_pointset` element.
    ///
    /// A pointset with an address paints its values from that address to the end of the space;
    /// a pointset without attributes restores default values. Pointsets are expected in
    /// increasing address order so that later ones take over from earlier ones.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] for unknown variables, unexpected children or values wider
    /// than their field.
    pub fn decode_pointset(&mut self, pointset: &Element, spaces: &SpaceManager) -> Result<()> {
        pointset.expect(ElementId::ContextPointset)?;

        let addr = if pointset.has_attributes() {
            Some(pointset.read_address(spaces)?)
        } else {
            None
        };

        for set in pointset.children() {
            let (field, value) = self.decode_set(set)?;
            match &addr {
                Some(addr) => {
                    self.blobs.split(addr);
                    for (_, blob) in self.blobs.range_mut(addr, None) {
                        blob.set(&field, value);
                        blob.commit(field.word(), field.shifted_mask());
                    }
                }
                None => self.blobs.default_value_mut().set(&field, value),
            }
        }
        Ok(())
    }

    /// Apply one `context_set` element: paint every `set` child over the element's range.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] for unknown variables, unexpected children or values wider
    /// than their field.
    pub fn decode_context_set(&mut self, context_set: &Element, spaces: &SpaceManager) -> Result<()> {
        context_set.expect(ElementId::ContextSet)?;
        let (lo, hi) = context_set.read_range(spaces)?;

        for set in context_set.children() {
            let (field, value) = self.decode_set(set)?;
            self.paint_region(&lo, &hi, field.word(), field.shifted_mask(), |blob| {
                blob.set(&field, value);
            });
        }
        Ok(())
    }

    fn decode_set(&self, set: &Element) -> Result<(BitField, Word)> {
        set.expect(ElementId::Set)?;

        let name = set.read_string(AttributeId::Name)?;
        let field = *self
            .variables
            .get(name)
            .ok_or_else(|| malformed_error!("Unknown context variable '{}'", name))?;

        let value = set.read_unsigned(AttributeId::Val)?;
        if value > u64::from(field.mask()) {
            return Err(malformed_error!(
                "Value {:#x} does not fit context variable '{}' of {} bits",
                value,
                name,
                field.width()
            ));
        }

        Ok((field, value as Word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddrSpace, AddrSpaceRc};

    fn ram() -> AddrSpaceRc {
        let mut spaces = SpaceManager::new();
        spaces.insert(AddrSpace::new("ram", 1, 4, 1, false))
    }

    fn at(space: &AddrSpaceRc, offset: u64) -> Address {
        Address::new(space, offset).unwrap()
    }

    fn store() -> ContextStore {
        let mut store = ContextStore::new();
        store.register_variable("mode", 0, 0).unwrap();
        store.register_variable("bank", 1, 3).unwrap();
        store.register_variable("seg", 32, 47).unwrap();
        store
    }

    #[test]
    fn registration_grows_blob() {
        let store = store();
        assert_eq!(store.context_size(), 2);
        assert_eq!(store.variable("seg").unwrap().word(), 1);
        assert_eq!(
            store.variables().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["bank", "mode", "seg"]
        );
    }

    #[test]
    fn registration_rejects_straddling_field() {
        let mut store = ContextStore::new();
        assert!(matches!(
            store.register_variable("wide", 28, 35),
            Err(Error::BitFieldSpan { start: 28, end: 35, .. })
        ));
        assert_eq!(store.context_size(), 0);
    }

    #[test]
    fn registration_frozen_after_paint() {
        let ram = ram();
        let mut store = store();
        store.set_value("mode", &at(&ram, 0x10), 1).unwrap();

        assert!(matches!(
            store.register_variable("late", 4, 4),
            Err(Error::RegistrationFrozen(name)) if name == "late"
        ));
    }

    #[test]
    fn unknown_name() {
        let ram = ram();
        let mut store = store();
        assert!(matches!(
            store.get_value("nope", &at(&ram, 0)),
            Err(Error::UnknownVariable(_))
        ));
        assert!(store.set_value("nope", &at(&ram, 0), 1).is_err());
        assert!(store.set_variable_default("nope", 1).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn defaults() {
        let ram = ram();
        let mut store = store();
        store.set_variable_default("bank", 5).unwrap();

        assert_eq!(store.get_variable_default("bank").unwrap(), 5);
        assert_eq!(store.get_value("bank", &at(&ram, 0x4000)).unwrap(), 5);
        assert_eq!(store.default_blob().values()[0], 0x5000_0000);
    }

    #[test]
    fn point_paint_runs_forward() {
        let ram = ram();
        let mut store = store();
        store.set_value("bank", &at(&ram, 0x100), 1).unwrap();
        store.set_value("mode", &at(&ram, 0x200), 1).unwrap();

        // stops where bank was set on its own, not at the split created for mode
        store.set_value("bank", &at(&ram, 0x080), 3).unwrap();
        assert_eq!(store.get_value("bank", &at(&ram, 0x090)).unwrap(), 3);
        assert_eq!(store.get_value("bank", &at(&ram, 0x100)).unwrap(), 1);
        assert_eq!(store.get_value("bank", &at(&ram, 0x300)).unwrap(), 1);
    }

    #[test]
    fn point_paint_passes_other_fields_commits() {
        let ram = ram();
        let mut store = store();
        store.set_value("mode", &at(&ram, 0x200), 1).unwrap();
        store.set_value("bank", &at(&ram, 0x100), 6).unwrap();

        assert_eq!(store.get_value("bank", &at(&ram, 0x200)).unwrap(), 6);
        assert_eq!(store.get_value("bank", &at(&ram, 0xFFFF_FFFF)).unwrap(), 6);
        assert_eq!(store.get_value("mode", &at(&ram, 0x100)).unwrap(), 0);
        assert_eq!(store.get_value("mode", &at(&ram, 0x200)).unwrap(), 1);
    }

    #[test]
    fn repaint_same_point() {
        let ram = ram();
        let mut store = store();
        store.set_value("bank", &at(&ram, 0x100), 2).unwrap();
        store.set_value("bank", &at(&ram, 0x100), 4).unwrap();

        assert_eq!(store.get_value("bank", &at(&ram, 0x100)).unwrap(), 4);
        assert_eq!(store.split_points().count(), 1);
    }

    #[test]
    fn region_paint_is_contained() {
        let ram = ram();
        let mut store = store();
        store.set_value("bank", &at(&ram, 0x100), 1).unwrap();
        store
            .set_value_region("bank", &at(&ram, 0x180), &at(&ram, 0x1FF), 7)
            .unwrap();

        assert_eq!(store.get_value("bank", &at(&ram, 0x17F)).unwrap(), 1);
        assert_eq!(store.get_value("bank", &at(&ram, 0x180)).unwrap(), 7);
        assert_eq!(store.get_value("bank", &at(&ram, 0x1FF)).unwrap(), 7);
        assert_eq!(store.get_value("bank", &at(&ram, 0x200)).unwrap(), 1);
    }

    #[test]
    fn region_paint_stops_point_paint() {
        let ram = ram();
        let mut store = store();
        store
            .set_value_region("bank", &at(&ram, 0x200), &at(&ram, 0x2FF), 2)
            .unwrap();
        store.set_value("bank", &at(&ram, 0x100), 5).unwrap();

        assert_eq!(store.get_value("bank", &at(&ram, 0x1FF)).unwrap(), 5);
        assert_eq!(store.get_value("bank", &at(&ram, 0x200)).unwrap(), 2);
        // the paint does not resume after the region
        assert_eq!(store.get_value("bank", &at(&ram, 0x300)).unwrap(), 0);
    }

    #[test]
    fn region_paint_to_end_of_space() {
        let ram = ram();
        let mut store = store();
        store
            .set_value_region("mode", &at(&ram, 0xFFFF_0000), &at(&ram, 0xFFFF_FFFF), 1)
            .unwrap();

        assert_eq!(store.get_value("mode", &at(&ram, 0xFFFF_FFFF)).unwrap(), 1);
        assert_eq!(store.get_value("mode", &at(&ram, 0xFFFE_FFFF)).unwrap(), 0);
        assert_eq!(store.split_points().count(), 1);
    }

    #[test]
    fn region_paint_rejects_reversed_range() {
        let ram = ram();
        let mut store = store();
        assert!(matches!(
            store.set_value_region("mode", &at(&ram, 0x200), &at(&ram, 0x100), 1),
            Err(Error::InvalidRange { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn region_paint_rejects_cross_space_range() {
        let mut spaces = SpaceManager::new();
        let ram = spaces.insert(AddrSpace::new("ram", 1, 4, 1, false));
        let io = spaces.insert(AddrSpace::new("io", 2, 2, 1, false));
        let mut store = store();

        assert!(matches!(
            store.set_value_region("mode", &at(&ram, 0x10), &at(&io, 0x20), 1),
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(
            store.set_context_region(&at(&ram, 0x10), &at(&io, 0x20), 0, 0x8000_0000, 0x8000_0000),
            Err(Error::InvalidRange { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn context_bounds() {
        let ram = ram();
        let mut store = store();
        store.set_value("seg", &at(&ram, 0x1000), 0xBEEF).unwrap();
        store.set_value("seg", &at(&ram, 0x2000), 0xCAFE).unwrap();

        let range = store.get_context(&at(&ram, 0x1800));
        assert_eq!(range.first, 0x1000);
        assert_eq!(range.last, 0x1FFF);
        assert_eq!(range.words[1], 0xBEEF_0000);

        let head = store.get_context(&at(&ram, 0x10));
        assert_eq!(head.first, 0);
        assert_eq!(head.last, 0xFFF);

        let tail = store.get_context(&at(&ram, 0x3000));
        assert_eq!(tail.first, 0x2000);
        assert_eq!(tail.last, 0xFFFF_FFFF);
        assert_eq!(store.get_context_blob(&at(&ram, 0x3000))[1], 0xCAFE_0000);
    }

    #[test]
    fn raw_change_point() {
        let ram = ram();
        let mut store = store();
        let bank = *store.variable("bank").unwrap();

        store
            .set_context_change_point(&at(&ram, 0x100), 0, bank.shifted_mask(), 0x3000_0000)
            .unwrap();
        assert_eq!(store.get_value("bank", &at(&ram, 0x100)).unwrap(), 3);

        // a field-level paint before it stops at the raw commit
        store.set_value("bank", &at(&ram, 0x50), 1).unwrap();
        assert_eq!(store.get_value("bank", &at(&ram, 0x100)).unwrap(), 3);
    }

    #[test]
    fn raw_region() {
        let ram = ram();
        let mut store = store();
        store
            .set_context_region(&at(&ram, 0x10), &at(&ram, 0x1F), 1, 0x0000_FF00, 0x0000_AB00)
            .unwrap();

        assert_eq!(store.get_context_blob(&at(&ram, 0x10))[1], 0x0000_AB00);
        assert_eq!(store.get_context_blob(&at(&ram, 0x20))[1], 0);
    }

    #[test]
    fn raw_paints_reject_word_past_blob() {
        let ram = ram();
        let mut store = store();

        assert!(matches!(
            store.set_context_change_point(&at(&ram, 0x10), 2, 0xFF, 0x1),
            Err(Error::WordOutOfRange { word: 2, size: 2 })
        ));
        assert!(matches!(
            store.set_context_region(&at(&ram, 0x10), &at(&ram, 0x20), 5, 0xFF, 0x1),
            Err(Error::WordOutOfRange { word: 5, size: 2 })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn clear_keeps_defaults() {
        let ram = ram();
        let mut store = store();
        store.set_variable_default("mode", 1).unwrap();
        store.set_value("mode", &at(&ram, 0x10), 0).unwrap();

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.get_value("mode", &at(&ram, 0x10)).unwrap(), 1);
    }
}
