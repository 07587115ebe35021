use crate::{
    address::{AddrSpaceRc, Address, SpaceManager, VarnodeData},
    context::check_range,
    encoding::{AttributeId, ElementId},
    Result,
};

/// The value of one attribute.
///
/// The packed form keeps values typed. The XML form only knows text, so parsed XML attributes
/// are always [`AttributeValue::String`] and numeric reads parse them on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// An unsigned integer
    Unsigned(u64),
    /// A text value
    String(String),
}

impl AttributeValue {
    /// The value as an unsigned integer, parsing text as `0x` prefixed hex or decimal
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            AttributeValue::Unsigned(value) => Some(*value),
            AttributeValue::String(text) => {
                let text = text.trim();
                match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16).ok(),
                    None => text.parse().ok(),
                }
            }
        }
    }

    /// The value as text, `None` for typed integers
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(text) => Some(text),
            AttributeValue::Unsigned(_) => None,
        }
    }
}

/// One node of a structured stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    id: ElementId,
    attributes: Vec<(AttributeId, AttributeValue)>,
    children: Vec<Element>,
}

impl Element {
    /// Create an element without attributes or children
    pub fn new(id: ElementId) -> Self {
        Element {
            id,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The element's id
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Attributes in the order they were written
    pub fn attributes(&self) -> &[(AttributeId, AttributeValue)] {
        &self.attributes
    }

    /// Returns true if the element carries any attribute
    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// Child elements in order
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Append an attribute
    pub fn push_attribute(&mut self, id: AttributeId, value: AttributeValue) {
        self.attributes.push((id, value));
    }

    /// Append a child element
    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Builder form of [`Element::push_attribute`] for integers
    #[must_use]
    pub fn with_unsigned(mut self, id: AttributeId, value: u64) -> Self {
        self.push_attribute(id, AttributeValue::Unsigned(value));
        self
    }

    /// Builder form of [`Element::push_attribute`] for text
    #[must_use]
    pub fn with_string(mut self, id: AttributeId, value: impl Into<String>) -> Self {
        self.push_attribute(id, AttributeValue::String(value.into()));
        self
    }

    /// Builder form of [`Element::push_child`]
    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    /// Add `space` and `offset` attributes describing `addr`
    #[must_use]
    pub fn with_address(self, addr: &Address) -> Self {
        self.with_string(AttributeId::Space, addr.space().name())
            .with_unsigned(AttributeId::Offset, addr.offset())
    }

    /// Add `space`, `offset` and `size` attributes describing `location`
    #[must_use]
    pub fn with_varnode(self, location: &VarnodeData) -> Self {
        self.with_string(AttributeId::Space, location.space.name())
            .with_unsigned(AttributeId::Offset, location.offset)
            .with_unsigned(AttributeId::Size, u64::from(location.size))
    }

    /// Look up an attribute
    pub fn attribute(&self, id: AttributeId) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(attr, _)| *attr == id)
            .map(|(_, value)| value)
    }

    /// Check the element's id.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the element is not an `id` element.
    pub fn expect(&self, id: ElementId) -> Result<()> {
        if self.id != id {
            return Err(malformed_error!("Expected <{}> but found <{}>", id, self.id));
        }
        Ok(())
    }

    /// Read an optional integer attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the attribute is present but not an integer.
    pub fn read_unsigned_opt(&self, id: AttributeId) -> Result<Option<u64>> {
        match self.attribute(id) {
            None => Ok(None),
            Some(value) => value.as_unsigned().map(Some).ok_or_else(|| {
                malformed_error!("Attribute '{}' of <{}> is not an integer", id, self.id)
            }),
        }
    }

    /// Read a required integer attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the attribute is missing or not an integer.
    pub fn read_unsigned(&self, id: AttributeId) -> Result<u64> {
        self.read_unsigned_opt(id)?
            .ok_or_else(|| malformed_error!("Missing attribute '{}' on <{}>", id, self.id))
    }

    /// Read a required text attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the attribute is missing or not text.
    pub fn read_string(&self, id: AttributeId) -> Result<&str> {
        let value = self
            .attribute(id)
            .ok_or_else(|| malformed_error!("Missing attribute '{}' on <{}>", id, self.id))?;
        value
            .as_str()
            .ok_or_else(|| malformed_error!("Attribute '{}' of <{}> is not text", id, self.id))
    }

    /// Resolve the `space` attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the attribute is missing or names an unknown space.
    pub fn read_space(&self, spaces: &SpaceManager) -> Result<AddrSpaceRc> {
        let name = self.read_string(AttributeId::Space)?;
        spaces
            .by_name(name)
            .cloned()
            .ok_or_else(|| malformed_error!("Unknown address space '{}'", name))
    }

    /// Read the address described by the `space` and `offset` attributes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for missing attributes or an unknown space, and
    /// [`crate::Error::OffsetOutOfRange`] if the offset does not fit the space.
    pub fn read_address(&self, spaces: &SpaceManager) -> Result<Address> {
        let space = self.read_space(spaces)?;
        Address::new(&space, self.read_unsigned(AttributeId::Offset)?)
    }

    /// Read the storage location described by the `space`, `offset` and `size` attributes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for missing attributes, an unknown space or a size
    /// that does not fit 32 bits.
    pub fn read_varnode(&self, spaces: &SpaceManager) -> Result<VarnodeData> {
        let space = self.read_space(spaces)?;
        let offset = self.read_unsigned(AttributeId::Offset)?;
        let size = self.read_unsigned(AttributeId::Size)?;
        let size = u32::try_from(size)
            .map_err(|_| malformed_error!("Storage size {:#x} is too large", size))?;
        Ok(VarnodeData::new(&space, offset, size))
    }

    /// Read the inclusive range described by `space`, `first` and `last`.
    ///
    /// Missing `first` or `last` attributes extend the range to the start or end of the space.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown space, and a range error if the
    /// bounds are reversed or exceed the space.
    pub fn read_range(&self, spaces: &SpaceManager) -> Result<(Address, Address)> {
        let space = self.read_space(spaces)?;
        let first = self.read_unsigned_opt(AttributeId::First)?.unwrap_or(0);
        let last = self
            .read_unsigned_opt(AttributeId::Last)?
            .unwrap_or_else(|| space.highest());

        let lo = Address::new(&space, first)?;
        let hi = Address::new(&space, last)?;
        check_range(&lo, &hi)?;
        Ok((lo, hi))
    }
}
