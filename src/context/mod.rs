//! Disassembly context: per-address context variables and tracked register values.
//!
//! This module holds the interval-indexed stores a specification-driven decoder consults for
//! every instruction it decodes.
//!
//! # Key Types
//! - [`BitField`] - Placement of one named context variable inside the packed word array
//! - [`ContextBlob`] - Packed context words plus the mask of bits painted at their split point
//! - [`ContextStore`] - Context variables painted over the address line
//! - [`TrackedValueStore`] - Register values known to be constant over address ranges
//! - [`ContextLookup`] - Decoder-side view remembering the last blob window it fetched
//! - [`ContextDatabase`] - Both stores of one analysis session, with persistence
//!
//! # Painting
//!
//! Both stores are step functions over the address line of each space. A value stored at a
//! split point applies up to the next split point in the same space. Context variables can be
//! painted forward from a point, where the paint runs until a point at which the same variable
//! was set on its own, or over an explicit region. Tracked values are always replaced as a
//! whole list over a region.

mod bitfield;
mod blob;
mod database;
mod lookup;
mod partmap;
mod store;
mod tracked;

pub use bitfield::BitField;
pub use blob::ContextBlob;
pub use database::ContextDatabase;
pub use lookup::ContextLookup;
pub use partmap::{Bounds, Inherit, PartitionMap};
pub use store::{ContextRange, ContextStore};
pub use tracked::{TrackedSet, TrackedValue, TrackedValueStore};

use crate::{address::Address, Error, Result};

/// One word of a packed context blob
pub type Word = u32;

/// Number of bits in a [`Word`]
pub const BITS_PER_WORD: u32 = Word::BITS;

/// Validate that `[lo, hi]` is a non-empty range within one space.
pub(crate) fn check_range(lo: &Address, hi: &Address) -> Result<()> {
    if !lo.same_space(hi) || hi < lo {
        return Err(Error::InvalidRange {
            first: lo.to_string(),
            last: hi.to_string(),
        });
    }
    Ok(())
}
