//! Address space descriptors and the registry that resolves them by name.

use std::{collections::HashMap, fmt, sync::Arc};

/// A reference-counted pointer to an [`AddrSpace`]
pub type AddrSpaceRc = Arc<AddrSpace>;

/// Description of one address space.
///
/// Only the properties the context layer needs are carried: identity (name and index), the
/// size of an offset, and the byte order used when trimming tracked register values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrSpace {
    name: String,
    index: u32,
    addr_size: u32,
    word_size: u32,
    big_endian: bool,
}

impl AddrSpace {
    /// Create a new space description.
    ///
    /// ## Arguments
    /// * 'name'       - Unique name of the space, used in persisted streams
    /// * 'index'      - Unique index, defines ordering between spaces
    /// * 'addr_size'  - Size of an offset in bytes
    /// * 'word_size'  - Number of bytes per addressable unit
    /// * 'big_endian' - Byte order of values stored in this space
    pub fn new(name: &str, index: u32, addr_size: u32, word_size: u32, big_endian: bool) -> Self {
        AddrSpace {
            name: name.to_string(),
            index,
            addr_size,
            word_size: word_size.max(1),
            big_endian,
        }
    }

    /// Name of the space
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the space, spaces are ordered by it
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Size of an offset in bytes
    pub fn addr_size(&self) -> u32 {
        self.addr_size
    }

    /// Number of bytes per addressable unit
    pub fn word_size(&self) -> u32 {
        self.word_size
    }

    /// Returns true if values in this space are stored most significant byte first
    pub fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    /// The highest addressable offset of the space.
    #[must_use]
    pub fn highest(&self) -> u64 {
        if self.addr_size >= 8 {
            u64::MAX
        } else {
            (1u64 << (self.addr_size * 8)) - 1
        }
    }
}

impl fmt::Display for AddrSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Registry of the address spaces known to an analysis session.
///
/// Decoders use it to turn `space="..."` attributes back into shared space references.
#[derive(Debug, Default, Clone)]
pub struct SpaceManager {
    spaces: Vec<AddrSpaceRc>,
    by_name: HashMap<String, usize>,
}

impl SpaceManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a space, replacing any earlier space with the same name.
    ///
    /// Returns the shared handle to the registered space.
    pub fn insert(&mut self, space: AddrSpace) -> AddrSpaceRc {
        let space = Arc::new(space);
        match self.by_name.get(space.name()) {
            Some(&slot) => self.spaces[slot] = space.clone(),
            None => {
                self.by_name
                    .insert(space.name().to_string(), self.spaces.len());
                self.spaces.push(space.clone());
            }
        }
        space
    }

    /// Look up a space by its name
    pub fn by_name(&self, name: &str) -> Option<&AddrSpaceRc> {
        self.by_name.get(name).map(|&slot| &self.spaces[slot])
    }

    /// Look up a space by its index
    pub fn by_index(&self, index: u32) -> Option<&AddrSpaceRc> {
        self.spaces.iter().find(|space| space.index() == index)
    }

    /// Iterate all registered spaces in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &AddrSpaceRc> {
        self.spaces.iter()
    }

    /// Number of registered spaces
    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    /// Returns true if no space has been registered
    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }
}
