//! Structured stream protocol used to persist context state.
//!
//! State is exchanged as a tree of [`Element`]s: every element has an [`ElementId`], a list of
//! typed attributes keyed by [`AttributeId`] and an ordered list of children. The tree has two
//! wire forms:
//!
//! - [`xml`] - verbose tagged form, readable and diffable
//! - [`packed`] - compact binary form, one header byte per element or attribute
//!
//! # Example
//!
//! ```rust
//! use ctxscope::encoding::{xml, packed, AttributeId, Element, ElementId};
//!
//! let set = Element::new(ElementId::Set)
//!     .with_string(AttributeId::Name, "mode")
//!     .with_unsigned(AttributeId::Val, 1);
//! let root = Element::new(ElementId::ContextPoints).with_child(set);
//!
//! let text = xml::to_string(&root)?;
//! assert_eq!(xml::parse(&text)?.children()[0].read_string(AttributeId::Name)?, "mode");
//!
//! let bytes = packed::encode(&root);
//! assert_eq!(packed::decode(&bytes)?.children()[0].read_unsigned(AttributeId::Val)?, 1);
//! # Ok::<(), ctxscope::Error>(())
//! ```

mod element;
pub mod packed;
pub mod xml;

pub use element::{AttributeValue, Element};

use strum::{Display, EnumString, FromRepr, IntoStaticStr};

use crate::Result;

/// Deepest element nesting either wire form accepts
pub(crate) const MAX_DEPTH: usize = 64;

/// Element names of the stream protocol.
///
/// The discriminant is the element's id in the packed form; the snake case name is its tag in
/// the XML form.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, FromRepr,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum ElementId {
    /// Container of all persisted context and tracked split points
    ContextPoints = 1,
    /// Context variable values at one split point
    ContextPointset = 2,
    /// Tracked values at one split point
    TrackedPointset = 3,
    /// A single variable value or tracked value
    Set = 4,
    /// Container of initial values shipped with a processor description
    ContextData = 5,
    /// Context variable values over an address range
    ContextSet = 6,
    /// Tracked values over an address range
    TrackedSet = 7,
}

/// Attribute names of the stream protocol.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, FromRepr,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum AttributeId {
    /// Name of an address space
    Space = 1,
    /// Offset within a space
    Offset = 2,
    /// Size of a storage location in bytes
    Size = 3,
    /// Name of a context variable
    Name = 4,
    /// A value
    Val = 5,
    /// First offset of a range
    First = 6,
    /// Last offset of a range
    Last = 7,
}

/// The wire forms an element tree can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFormat {
    /// Tagged XML text
    #[default]
    Xml,
    /// Compact binary
    Packed,
}

impl StreamFormat {
    /// Serialize `root` in this format
    ///
    /// # Errors
    /// Returns an error if the XML writer fails.
    pub fn encode(self, root: &Element) -> Result<Vec<u8>> {
        match self {
            StreamFormat::Xml => Ok(xml::to_string(root)?.into_bytes()),
            StreamFormat::Packed => Ok(packed::encode(root)),
        }
    }

    /// Parse a tree from `data` in this format
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] or [`crate::Error::XmlError`] if `data` is not a
    /// valid stream.
    pub fn decode(self, data: &[u8]) -> Result<Element> {
        match self {
            StreamFormat::Xml => {
                let text = std::str::from_utf8(data)
                    .map_err(|err| malformed_error!("Stream is not valid UTF-8 - {}", err))?;
                xml::parse(text)
            }
            StreamFormat::Packed => packed::decode(data),
        }
    }
}
