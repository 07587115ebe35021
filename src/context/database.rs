use log::debug;

use crate::{
    address::SpaceManager,
    context::{ContextLookup, ContextStore, TrackedValueStore},
    encoding::{Element, ElementId, StreamFormat},
    Result,
};

/// The context state of one analysis session.
///
/// A database owns the [`ContextStore`] with the context variables and the
/// [`TrackedValueStore`] with known register values. It is created per session and handed to
/// whatever needs it, there is no process wide instance.
///
/// # Persistence
///
/// [`ContextDatabase::encode`] produces a `context_points` element holding the default blob,
/// every context split point and every tracked split point. [`ContextDatabase::decode`] restores
/// such a tree into a database with the same variables registered.
/// [`ContextDatabase::decode_from_spec`] applies the range based `context_data` block a
/// processor description ships with.
///
/// # Example
///
/// ```rust
/// use ctxscope::prelude::*;
///
/// let mut spaces = SpaceManager::new();
/// let ram = spaces.insert(AddrSpace::new("ram", 1, 4, 1, false));
///
/// let mut db = ContextDatabase::new();
/// db.context_mut().register_variable("thumb", 0, 0)?;
/// db.context_mut().set_value("thumb", &Address::new(&ram, 0x8000)?, 1)?;
///
/// let bytes = db.save(StreamFormat::Packed)?;
///
/// let mut restored = ContextDatabase::new();
/// restored.context_mut().register_variable("thumb", 0, 0)?;
/// restored.load(&bytes, StreamFormat::Packed, &spaces)?;
/// assert_eq!(restored.context().get_value("thumb", &Address::new(&ram, 0x9000)?)?, 1);
/// # Ok::<(), ctxscope::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextDatabase {
    context: ContextStore,
    tracked: TrackedValueStore,
}

impl ContextDatabase {
    /// Create a database without variables or tracked values
    pub fn new() -> Self {
        Self::default()
    }

    /// The context variable store
    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Mutable access to the context variable store
    pub fn context_mut(&mut self) -> &mut ContextStore {
        &mut self.context
    }

    /// The tracked value store
    pub fn tracked(&self) -> &TrackedValueStore {
        &self.tracked
    }

    /// Mutable access to the tracked value store
    pub fn tracked_mut(&mut self) -> &mut TrackedValueStore {
        &mut self.tracked
    }

    /// A decoder-side lookup over the context store
    pub fn lookup(&mut self) -> ContextLookup<'_> {
        ContextLookup::new(&mut self.context)
    }

    /// Drop every split point of both stores. Variables and defaults are kept.
    pub fn clear(&mut self) {
        self.context.clear();
        self.tracked.clear();
    }

    /// Encode both stores as one `context_points` element
    pub fn encode(&self) -> Element {
        let mut root = Element::new(ElementId::ContextPoints);
        for pointset in self.context.encode() {
            root.push_child(pointset);
        }
        for pointset in self.tracked.encode() {
            root.push_child(pointset);
        }
        root
    }

    /// Replace the contents of both stores by a `context_points` element.
    ///
    /// The variables of the encoded database must already be registered.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unexpected elements, unknown variables or spaces,
    /// values wider than their field and tracked locations of unsupported size. The database
    /// is left partially restored in that case.
    pub fn decode(&mut self, root: &Element, spaces: &SpaceManager) -> Result<()> {
        root.expect(ElementId::ContextPoints)?;
        self.clear();

        for child in root.children() {
            match child.id() {
                ElementId::ContextPointset => self.context.decode_pointset(child, spaces)?,
                ElementId::TrackedPointset => self.tracked.decode_pointset(child, spaces)?,
                other => {
                    return Err(malformed_error!("Unexpected <{}> in <{}>", other, root.id()));
                }
            }
        }

        debug!(
            "restored {} context and {} tracked split points",
            self.context.split_points().count(),
            self.tracked.split_points().count()
        );
        Ok(())
    }

    /// Apply the initial values of a `context_data` element.
    ///
    /// Values are painted on top of the current contents, `context_set` ranges as region paints
    /// and `tracked_set` ranges replacing the tracked list.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unexpected elements, unknown variables or spaces,
    /// and a range error for reversed ranges.
    pub fn decode_from_spec(&mut self, root: &Element, spaces: &SpaceManager) -> Result<()> {
        root.expect(ElementId::ContextData)?;

        for child in root.children() {
            match child.id() {
                ElementId::ContextSet => self.context.decode_context_set(child, spaces)?,
                ElementId::TrackedSet => self.tracked.decode_tracked_set(child, spaces)?,
                other => {
                    return Err(malformed_error!("Unexpected <{}> in <{}>", other, root.id()));
                }
            }
        }

        debug!("applied {} initial context entries", root.children().len());
        Ok(())
    }

    /// Serialize the database in the given wire format.
    ///
    /// # Errors
    /// Returns an error if the XML writer fails.
    pub fn save(&self, format: StreamFormat) -> Result<Vec<u8>> {
        format.encode(&self.encode())
    }

    /// Restore the database from bytes in the given wire format, see [`ContextDatabase::decode`].
    ///
    /// # Errors
    /// Returns an error if `data` is not a valid stream or does not describe a database with
    /// the registered variables.
    pub fn load(&mut self, data: &[u8], format: StreamFormat, spaces: &SpaceManager) -> Result<()> {
        let root = format.decode(data)?;
        self.decode(&root, spaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address::{AddrSpace, AddrSpaceRc, Address, VarnodeData},
        context::TrackedValue,
        encoding::{xml, AttributeId},
        Error,
    };

    struct Fixture {
        spaces: SpaceManager,
        ram: AddrSpaceRc,
        reg: AddrSpaceRc,
    }

    fn fixture() -> Fixture {
        let mut spaces = SpaceManager::new();
        let ram = spaces.insert(AddrSpace::new("ram", 1, 4, 1, false));
        let reg = spaces.insert(AddrSpace::new("register", 2, 4, 1, false));
        Fixture { spaces, ram, reg }
    }

    fn at(space: &AddrSpaceRc, offset: u64) -> Address {
        Address::new(space, offset).unwrap()
    }

    fn database() -> ContextDatabase {
        let mut db = ContextDatabase::new();
        db.context_mut().register_variable("mode", 0, 0).unwrap();
        db.context_mut().register_variable("bank", 4, 7).unwrap();
        db
    }

    #[test]
    fn encode_layout() {
        let f = fixture();
        let mut db = database();
        db.context_mut().set_variable_default("bank", 2).unwrap();
        db.context_mut().set_value("mode", &at(&f.ram, 0x100), 1).unwrap();
        db.tracked_mut()
            .create_set(&at(&f.ram, 0x0), &at(&f.ram, 0xFF))
            .unwrap()
            .push(TrackedValue {
                location: VarnodeData::new(&f.reg, 0x10, 2),
                value: 0x40,
            });

        let root = db.encode();
        let ids: Vec<_> = root.children().iter().map(Element::id).collect();
        assert_eq!(
            ids,
            vec![
                ElementId::ContextPointset,
                ElementId::ContextPointset,
                ElementId::TrackedPointset,
                ElementId::TrackedPointset,
            ]
        );

        let default = &root.children()[0];
        assert!(!default.has_attributes());
        assert_eq!(default.children().len(), 2);

        // the list ending at 0xFF is closed by an empty pointset
        assert!(root.children()[3].children().is_empty());
        assert_eq!(root.children()[3].read_unsigned(AttributeId::Offset).unwrap(), 0x100);
    }

    #[test]
    fn decode_replaces_contents() {
        let f = fixture();
        let mut db = database();
        db.context_mut().set_value("bank", &at(&f.ram, 0x100), 3).unwrap();
        let saved = db.encode();

        db.context_mut().set_value("bank", &at(&f.ram, 0x50), 9).unwrap();
        db.context_mut().set_variable_default("mode", 1).unwrap();
        db.decode(&saved, &f.spaces).unwrap();

        assert_eq!(db.context().split_points().count(), 1);
        assert_eq!(db.context().get_value("bank", &at(&f.ram, 0x50)).unwrap(), 0);
        assert_eq!(db.context().get_value("bank", &at(&f.ram, 0x100)).unwrap(), 3);
        assert_eq!(db.context().get_variable_default("mode").unwrap(), 0);
    }

    #[test]
    fn decode_rejects_unknown_variable() {
        let f = fixture();
        let text = r#"
            <context_points>
              <context_pointset space="ram" offset="0x10">
                <set name="missing" val="1"/>
              </context_pointset>
            </context_points>"#;

        let mut db = database();
        let result = db.decode(&xml::parse(text).unwrap(), &f.spaces);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn decode_rejects_wide_value() {
        let f = fixture();
        let text = r#"
            <context_points>
              <context_pointset space="ram" offset="0x10">
                <set name="bank" val="0x10"/>
              </context_pointset>
            </context_points>"#;

        let mut db = database();
        assert!(db.decode(&xml::parse(text).unwrap(), &f.spaces).is_err());
    }

    #[test]
    fn decode_rejects_unexpected_children() {
        let f = fixture();
        let mut db = database();

        let wrong_root = Element::new(ElementId::ContextData);
        assert!(db.decode(&wrong_root, &f.spaces).is_err());

        let wrong_child =
            Element::new(ElementId::ContextPoints).with_child(Element::new(ElementId::Set));
        assert!(db.decode(&wrong_child, &f.spaces).is_err());
    }

    #[test]
    fn initial_values_block() {
        let f = fixture();
        let text = r#"
            <context_data>
              <context_set space="ram" first="0x1000" last="0x1fff">
                <set name="mode" val="1"/>
                <set name="bank" val="5"/>
              </context_set>
              <tracked_set space="ram" first="0x0" last="0xffff">
                <set space="register" offset="0x10" size="2" val="0x1234"/>
              </tracked_set>
            </context_data>"#;

        let mut db = database();
        db.decode_from_spec(&xml::parse(text).unwrap(), &f.spaces).unwrap();

        let ctx = db.context();
        assert_eq!(ctx.get_value("mode", &at(&f.ram, 0x0FFF)).unwrap(), 0);
        assert_eq!(ctx.get_value("mode", &at(&f.ram, 0x1000)).unwrap(), 1);
        assert_eq!(ctx.get_value("bank", &at(&f.ram, 0x1FFF)).unwrap(), 5);
        assert_eq!(ctx.get_value("bank", &at(&f.ram, 0x2000)).unwrap(), 0);

        let ds = VarnodeData::new(&f.reg, 0x10, 2);
        assert_eq!(db.tracked().get_tracked_value(&ds, &at(&f.ram, 0x8000)), 0x1234);
        assert_eq!(db.tracked().get_tracked_value(&ds, &at(&f.ram, 0x10000)), 0);
    }

    #[test]
    fn initial_values_reject_bad_size() {
        let f = fixture();
        let text = r#"
            <context_data>
              <tracked_set space="ram">
                <set space="register" offset="0x10" size="9" val="1"/>
              </tracked_set>
            </context_data>"#;

        let mut db = database();
        assert!(matches!(
            db.decode_from_spec(&xml::parse(text).unwrap(), &f.spaces),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn lookup_writes_through() {
        let f = fixture();
        let mut db = database();
        db.lookup()
            .set_context(&at(&f.ram, 0x40), 0, 0x8000_0000, 0x8000_0000)
            .unwrap();

        assert_eq!(db.context().get_value("mode", &at(&f.ram, 0x40)).unwrap(), 1);
    }
}
