use std::fmt;

use crate::{
    address::{AddrSpaceRc, Address},
    Result,
};

/// A sized storage location: `size` bytes starting at `offset` in `space`.
#[derive(Debug, Clone)]
pub struct VarnodeData {
    /// The space holding the storage
    pub space: AddrSpaceRc,
    /// Offset of the first byte
    pub offset: u64,
    /// Number of bytes
    pub size: u32,
}

impl VarnodeData {
    /// Create a new storage location
    pub fn new(space: &AddrSpaceRc, offset: u64, size: u32) -> Self {
        VarnodeData {
            space: space.clone(),
            offset,
            size,
        }
    }

    /// Offset of the last byte of the storage
    pub fn last_offset(&self) -> u64 {
        self.offset
            .saturating_add(u64::from(self.size).saturating_sub(1))
    }

    /// The starting address of the storage
    ///
    /// # Errors
    /// Returns [`crate::Error::OffsetOutOfRange`] if the offset does not fit the space.
    pub fn addr(&self) -> Result<Address> {
        Address::new(&self.space, self.offset)
    }

    /// Returns true if every byte of `other` lies within this storage
    pub fn contains(&self, other: &VarnodeData) -> bool {
        self.space.index() == other.space.index()
            && self.offset <= other.offset
            && other.last_offset() <= self.last_offset()
    }
}

impl PartialEq for VarnodeData {
    fn eq(&self, other: &Self) -> bool {
        self.space.index() == other.space.index()
            && self.offset == other.offset
            && self.size == other.size
    }
}

impl Eq for VarnodeData {}

impl fmt::Display for VarnodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{:#x},{})", self.space.name(), self.offset, self.size)
    }
}
