//! Addresses and storage locations.
//!
//! The context layer treats an address as an opaque, totally ordered `(space, offset)` pair. The
//! types in this module carry just enough of the surrounding address-space model for that:
//!
//! - [`AddrSpace`] - Name, ordering index, offset size and byte order of a space
//! - [`SpaceManager`] - Resolves space names found in persisted streams
//! - [`Address`] - A location within a space, ordered by space index then offset
//! - [`VarnodeData`] - A sized storage location, used to key tracked register values
//!
//! # Example
//!
//! ```rust
//! use ctxscope::address::{AddrSpace, Address, SpaceManager};
//!
//! let mut spaces = SpaceManager::new();
//! let ram = spaces.insert(AddrSpace::new("ram", 1, 4, 1, false));
//!
//! let a = Address::new(&ram, 0x1000)?;
//! let b = Address::new(&ram, 0x2000)?;
//! assert!(a < b);
//! assert!(Address::new(&ram, 0x1_0000_0000).is_err());
//! # Ok::<(), ctxscope::Error>(())
//! ```

mod space;
mod varnode;

pub use space::{AddrSpace, AddrSpaceRc, SpaceManager};
pub use varnode::VarnodeData;

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{Error, Result};

/// A location within an address space.
///
/// Equality, ordering and hashing only look at the space index and the offset, so two handles
/// to the same space compare equal even if they are distinct allocations.
#[derive(Debug, Clone)]
pub struct Address {
    space: AddrSpaceRc,
    offset: u64,
}

impl Address {
    /// Create a new address, validating the offset against the space.
    ///
    /// ## Arguments
    /// * 'space'  - The space the address lives in
    /// * 'offset' - Offset within the space
    ///
    /// # Errors
    /// Returns [`Error::OffsetOutOfRange`] if `offset` exceeds [`AddrSpace::highest`].
    pub fn new(space: &AddrSpaceRc, offset: u64) -> Result<Self> {
        if offset > space.highest() {
            return Err(Error::OffsetOutOfRange {
                space: space.name().to_string(),
                offset,
            });
        }

        Ok(Address {
            space: Arc::clone(space),
            offset,
        })
    }

    /// The space of this address
    pub fn space(&self) -> &AddrSpaceRc {
        &self.space
    }

    /// The offset of this address
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns true if both addresses live in the same space
    pub fn same_space(&self, other: &Address) -> bool {
        self.space.index() == other.space.index()
    }

    /// The address directly following this one, or `None` at the highest offset of the space
    #[must_use]
    pub fn successor(&self) -> Option<Address> {
        if self.offset >= self.space.highest() {
            None
        } else {
            Some(Address {
                space: Arc::clone(&self.space),
                offset: self.offset + 1,
            })
        }
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.same_space(other) && self.offset == other.offset
    }
}

impl Eq for Address {}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.space
            .index()
            .cmp(&other.space.index())
            .then(self.offset.cmp(&other.offset))
    }
}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.space.index().hash(state);
        self.offset.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#x}", self.space.name(), self.offset)
    }
}
