//! Register values known to be constant over address ranges.
//!
//! A tracked value records that a storage location holds a known constant for a range of
//! addresses, typically a segment or mode register fixed by the processor specification. Unlike
//! context variables these never influence decoding; they are handed to later analysis.
//! Lists are replaced wholesale over a range, never merged entry by entry.

use log::trace;

use crate::{
    address::{Address, SpaceManager, VarnodeData},
    context::{check_range, partmap::Inherit, partmap::PartitionMap},
    encoding::{AttributeId, Element, ElementId},
    Result,
};

/// A storage location together with its known value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedValue {
    /// The storage holding the value
    pub location: VarnodeData,
    /// The value, right-justified
    pub value: u64,
}

/// The ordered list of tracked values valid over a range of addresses
pub type TrackedSet = Vec<TrackedValue>;

impl Inherit for TrackedSet {
    fn inherit(&self) -> Self {
        self.clone()
    }
}

/// Interval-indexed store of tracked value lists.
#[derive(Debug, Clone)]
pub struct TrackedValueStore {
    sets: PartitionMap<TrackedSet>,
}

impl Default for TrackedValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackedValueStore {
    /// Create a store where every address sees an empty list
    pub fn new() -> Self {
        TrackedValueStore {
            sets: PartitionMap::new(TrackedSet::new()),
        }
    }

    /// Replace the tracked list for `[lo, hi]` by a fresh, empty list and return it for filling.
    ///
    /// Every split point inside the range is dropped; addresses after `hi` keep their list.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidRange`] if `hi` precedes `lo` or lies in another space.
    pub fn create_set(&mut self, lo: &Address, hi: &Address) -> Result<&mut TrackedSet> {
        check_range(lo, hi)?;
        trace!("new tracked set over {lo} - {hi}");

        let end = hi.successor();
        let set = self.sets.clear_range(lo, end.as_ref());
        set.clear();
        Ok(set)
    }

    /// The tracked list effective at `addr`
    pub fn get_tracked_set(&self, addr: &Address) -> &TrackedSet {
        self.sets.get(addr)
    }

    /// The tracked list applying where no range was defined
    pub fn get_tracked_default(&self) -> &TrackedSet {
        self.sets.default_value()
    }

    /// Mutable access to the default tracked list
    pub fn tracked_default_mut(&mut self) -> &mut TrackedSet {
        self.sets.default_value_mut()
    }

    /// The known value of `location` at `addr`.
    ///
    /// The first tracked entry whose storage fully contains `location` supplies the value. The
    /// bytes belonging to `location` are selected according to the byte order of its space and
    /// trimmed to its size. Without a containing entry the value is zero.
    pub fn get_tracked_value(&self, location: &VarnodeData, addr: &Address) -> u64 {
        for entry in self.get_tracked_set(addr) {
            if !entry.location.contains(location) {
                continue;
            }

            let skipped_bytes = if location.space.is_big_endian() {
                entry.location.last_offset() - location.last_offset()
            } else {
                location.offset - entry.location.offset
            };

            let value = skipped_bytes
                .checked_mul(8)
                .and_then(|bits| u32::try_from(bits).ok())
                .and_then(|bits| entry.value.checked_shr(bits))
                .unwrap_or(0);
            return value & byte_mask(location.size);
        }

        0
    }

    /// Iterate the split points and their lists in address order
    pub fn split_points(&self) -> impl Iterator<Item = (&Address, &TrackedSet)> {
        self.sets.iter()
    }

    /// Returns true if no range has been defined
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Drop every split point. The default list is kept.
    pub fn clear(&mut self) {
        self.sets.clear();
    }

    /// Encode every split point as a `tracked_pointset` element.
    ///
    /// Empty lists are written too, they end the list of the preceding split point.
    pub fn encode(&self) -> Vec<Element> {
        self.sets
            .iter()
            .map(|(addr, set)| {
                let mut pointset = Element::new(ElementId::TrackedPointset).with_address(addr);
                for tracked in set {
                    pointset.push_child(
                        Element::new(ElementId::Set)
                            .with_varnode(&tracked.location)
                            .with_unsigned(AttributeId::Val, tracked.value),
                    );
                }
                pointset
            })
            .collect()
    }

    /// Replay one `tracked_pointset` element, replacing the list at its split point.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unexpected children or unusable locations.
    pub fn decode_pointset(&mut self, pointset: &Element, spaces: &SpaceManager) -> Result<()> {
        pointset.expect(ElementId::TrackedPointset)?;

        let addr = pointset.read_address(spaces)?;
        let values = decode_values(pointset, spaces)?;
        *self.sets.split(&addr) = values;
        Ok(())
    }

    /// Apply one `tracked_set` element: replace the list over the element's range.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unexpected children or unusable locations.
    pub fn decode_tracked_set(&mut self, tracked_set: &Element, spaces: &SpaceManager) -> Result<()> {
        tracked_set.expect(ElementId::TrackedSet)?;

        let (lo, hi) = tracked_set.read_range(spaces)?;
        let values = decode_values(tracked_set, spaces)?;
        *self.create_set(&lo, &hi)? = values;
        Ok(())
    }
}

fn decode_values(parent: &Element, spaces: &SpaceManager) -> Result<TrackedSet> {
    let mut values = TrackedSet::with_capacity(parent.children().len());
    for set in parent.children() {
        set.expect(ElementId::Set)?;

        let location = set.read_varnode(spaces)?;
        if location.size == 0 || location.size > 8 {
            return Err(malformed_error!(
                "Tracked location {} has unsupported size {}",
                location,
                location.size
            ));
        }

        values.push(TrackedValue {
            location,
            value: set.read_unsigned(AttributeId::Val)?,
        });
    }
    Ok(values)
}

fn byte_mask(size: u32) -> u64 {
    if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (size * 8)) - 1
    }
}
