//! Bounded pool of per-address decode state.
//!
//! Decoding an instruction produces a state record that later steps (operand display, semantic
//! generation, flow following) keep referring to. The [`DecodeContextCache`] owns a fixed number
//! of such records and hands them out per address, so that asking for the same address twice in
//! a row yields the same record, and recently requested addresses never share a record.
//!
//! # Layout
//!
//! The records sit in a ring with a cursor pointing at the next one to recycle. A direct-mapped
//! table indexed by the low bits of the address offset remembers which record was last bound
//! for each bucket. A lookup either finds its address in the bucket's record, or recycles the
//! record under the cursor.
//!
//! # Example
//!
//! ```rust
//! use ctxscope::{address::{AddrSpace, Address, SpaceManager}, cache::{CacheConfig, DecodeContextCache, ParserState}};
//!
//! let mut spaces = SpaceManager::new();
//! let ram = spaces.insert(AddrSpace::new("ram", 1, 4, 1, false));
//!
//! let mut cache: DecodeContextCache<ParserState> = DecodeContextCache::new(&CacheConfig::default())?;
//! let (first, _) = cache.get_parser_context(&Address::new(&ram, 0x1000)?);
//! let (again, _) = cache.get_parser_context(&Address::new(&ram, 0x1000)?);
//! assert_eq!(first, again);
//! # Ok::<(), ctxscope::Error>(())
//! ```

mod config;
mod state;

pub use config::CacheConfig;
pub use state::{DecodeState, ParsePhase, ParserState};

use log::{debug, trace};

use crate::{address::Address, Result};

/// Identity of one record of a [`DecodeContextCache`].
///
/// Two lookups returning equal ids were served by the same record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    /// Position of the record in the pool
    pub fn index(self) -> usize {
        self.0
    }
}

/// Fixed-capacity, address-keyed pool of decode state records.
#[derive(Debug)]
pub struct DecodeContextCache<R> {
    records: Vec<R>,
    hashtable: Vec<usize>,
    next_free: usize,
    bucket_mask: u64,
    hits: u64,
    misses: u64,
}

impl<R: DecodeState + Default> DecodeContextCache<R> {
    /// Create a cache whose records start out as `R::default()`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidCacheConfig`] if `config` does not validate.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        Self::with_records(config, R::default)
    }
}

impl<R: DecodeState> DecodeContextCache<R> {
    /// Create a cache with `config.capacity` records built by `factory`.
    ///
    /// Records are built once here and recycled for the lifetime of the cache.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidCacheConfig`] if `config` does not validate.
    pub fn with_records<F>(config: &CacheConfig, factory: F) -> Result<Self>
    where
        F: FnMut() -> R,
    {
        config.validate()?;

        let records: Vec<R> = std::iter::repeat_with(factory)
            .take(config.capacity)
            .collect();

        debug!(
            "decode cache with {} records and {} buckets",
            config.capacity, config.hash_size
        );
        Ok(DecodeContextCache {
            records,
            hashtable: vec![0; config.hash_size],
            next_free: 0,
            bucket_mask: config.hash_size as u64 - 1,
            hits: 0,
            misses: 0,
        })
    }

    /// The record for `addr`.
    ///
    /// If the record last bound to `addr`'s bucket is still bound to `addr` it is returned as
    /// is. Otherwise the record under the cursor is reset, bound to `addr` and returned, and
    /// the cursor moves on. Up to `capacity` consecutive misses therefore return distinct
    /// records.
    pub fn get_parser_context(&mut self, addr: &Address) -> (SlotId, &mut R) {
        let bucket = (addr.offset() & self.bucket_mask) as usize;

        let bound = self.hashtable[bucket];
        if self.records[bound].address() == Some(addr) {
            self.hits += 1;
            trace!("decode cache hit at {addr}, slot {bound}");
            return (SlotId(bound), &mut self.records[bound]);
        }

        let slot = self.next_free;
        self.next_free = (slot + 1) % self.records.len();
        self.hashtable[bucket] = slot;
        self.misses += 1;
        trace!("decode cache miss at {addr}, recycling slot {slot}");

        let record = &mut self.records[slot];
        record.reset();
        record.set_address(addr.clone());
        (SlotId(slot), record)
    }

    /// The record with identity `id`.
    ///
    /// # Panics
    /// Panics if `id` was not handed out by this cache.
    pub fn record(&self, id: SlotId) -> &R {
        &self.records[id.0]
    }

    /// Mutable access to the record with identity `id`.
    ///
    /// # Panics
    /// Panics if `id` was not handed out by this cache.
    pub fn record_mut(&mut self, id: SlotId) -> &mut R {
        &mut self.records[id.0]
    }

    /// Number of records in the pool
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Number of hash buckets
    pub fn hash_size(&self) -> usize {
        self.hashtable.len()
    }

    /// Lookups served by an already bound record
    pub fn hit_count(&self) -> u64 {
        self.hits
    }

    /// Lookups that recycled a record
    pub fn miss_count(&self) -> u64 {
        self.misses
    }
}
