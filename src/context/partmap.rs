//! Step function over the address line.
//!
//! A [`PartitionMap`] holds one value per split point. The value stored at a split point applies
//! to every address from that point up to, but excluding, the next split point in the same
//! space. Addresses before the first split point of their space see the default value. Both
//! the context store and the tracked value store are built on this map.

use std::{
    collections::{btree_map, BTreeMap},
    ops::Bound::{Excluded, Unbounded},
};

use log::trace;

use crate::address::Address;

/// How a value is derived for a freshly created split point from the value covering it.
pub trait Inherit {
    /// Produce the value for a new split point that was covered by `self`
    fn inherit(&self) -> Self;
}

/// The value covering an address, together with the split points bounding it.
#[derive(Debug)]
pub struct Bounds<'a, V> {
    /// The covering value
    pub value: &'a V,
    /// The split point the value starts at, `None` if the default value applies
    pub before: Option<&'a Address>,
    /// The next split point in the same space, `None` if the value runs to the end of the space
    pub after: Option<&'a Address>,
}

/// An address-keyed step function with a default value.
#[derive(Debug, Clone)]
pub struct PartitionMap<V> {
    default: V,
    splits: BTreeMap<Address, V>,
}

impl<V> PartitionMap<V> {
    /// Create an empty map where every address sees `default`
    pub fn new(default: V) -> Self {
        PartitionMap {
            default,
            splits: BTreeMap::new(),
        }
    }

    /// The value applying before the first split point of every space
    pub fn default_value(&self) -> &V {
        &self.default
    }

    /// Mutable access to the default value
    pub fn default_value_mut(&mut self) -> &mut V {
        &mut self.default
    }

    /// The value covering `addr`
    pub fn get(&self, addr: &Address) -> &V {
        self.covering(addr).map_or(&self.default, |(_, value)| value)
    }

    /// The value covering `addr` and the split points around it
    pub fn bounds(&self, addr: &Address) -> Bounds<'_, V> {
        let (before, value) = match self.covering(addr) {
            Some((point, value)) => (Some(point), value),
            None => (None, &self.default),
        };

        let after = self
            .splits
            .range((Excluded(addr), Unbounded))
            .next()
            .map(|(point, _)| point)
            .filter(|point| point.same_space(addr));

        Bounds {
            value,
            before,
            after,
        }
    }

    /// The value stored exactly at `addr`, if `addr` is a split point
    pub fn get_exact(&self, addr: &Address) -> Option<&V> {
        self.splits.get(addr)
    }

    /// Iterate the split points of `lo`'s space starting at `lo`, stopping before `end`.
    ///
    /// With `end` set to `None` the iteration runs to the end of the space.
    pub fn range_mut<'a>(
        &'a mut self,
        lo: &Address,
        end: Option<&'a Address>,
    ) -> impl Iterator<Item = (&'a Address, &'a mut V)> + 'a {
        let space = lo.space().index();
        self.splits
            .range_mut(lo..)
            .take_while(move |(point, _)| {
                point.space().index() == space && end.is_none_or(|end| *point < end)
            })
    }

    /// Iterate all split points in address order
    pub fn iter(&self) -> btree_map::Iter<'_, Address, V> {
        self.splits.iter()
    }

    /// Number of split points
    pub fn len(&self) -> usize {
        self.splits.len()
    }

    /// Returns true if no split point exists
    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    /// Drop every split point, the default value is kept
    pub fn clear(&mut self) {
        self.splits.clear();
    }

    fn covering(&self, addr: &Address) -> Option<(&Address, &V)> {
        self.splits
            .range(..=addr)
            .next_back()
            .filter(|(point, _)| point.same_space(addr))
    }
}

impl<V: Inherit> PartitionMap<V> {
    /// Make `addr` a split point and return its value.
    ///
    /// An existing split point is returned unchanged, otherwise a new one is created by
    /// inheriting from the value currently covering `addr`.
    pub fn split(&mut self, addr: &Address) -> &mut V {
        let inherited = if self.splits.contains_key(addr) {
            None
        } else {
            trace!("new split point at {addr}");
            Some(self.get(addr).inherit())
        };

        let default = &self.default;
        self.splits
            .entry(addr.clone())
            .or_insert_with(|| inherited.unwrap_or_else(|| default.inherit()))
    }

    /// Collapse `[lo, end)` into a single split point at `lo`.
    ///
    /// Split points are forced at `lo` and `end` first, so values outside the range are not
    /// affected. With `end` set to `None` the range runs to the end of `lo`'s space.
    pub fn clear_range(&mut self, lo: &Address, end: Option<&Address>) -> &mut V {
        if let Some(end) = end {
            self.split(end);
        }
        self.split(lo);

        let space = lo.space().index();
        let doomed: Vec<Address> = self
            .splits
            .range((Excluded(lo), Unbounded))
            .map(|(point, _)| point)
            .take_while(|point| {
                point.space().index() == space && end.is_none_or(|end| *point < end)
            })
            .cloned()
            .collect();
        for point in &doomed {
            self.splits.remove(point);
        }

        self.split(lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddrSpace, AddrSpaceRc, SpaceManager};

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(u32);

    impl Inherit for Tag {
        fn inherit(&self) -> Self {
            self.clone()
        }
    }

    fn spaces() -> (AddrSpaceRc, AddrSpaceRc) {
        let mut manager = SpaceManager::new();
        let ram = manager.insert(AddrSpace::new("ram", 1, 4, 1, false));
        let io = manager.insert(AddrSpace::new("io", 2, 2, 1, false));
        (ram, io)
    }

    fn at(space: &AddrSpaceRc, offset: u64) -> Address {
        Address::new(space, offset).unwrap()
    }

    #[test]
    fn empty_map_returns_default() {
        let (ram, _) = spaces();
        let map = PartitionMap::new(Tag(7));

        assert_eq!(map.get(&at(&ram, 0x1234)), &Tag(7));
        assert!(map.is_empty());
    }

    #[test]
    fn split_inherits_covering_value() {
        let (ram, _) = spaces();
        let mut map = PartitionMap::new(Tag(0));

        map.split(&at(&ram, 0x100)).0 = 1;
        assert_eq!(map.split(&at(&ram, 0x180)), &Tag(1));
        assert_eq!(map.split(&at(&ram, 0x080)), &Tag(0));
        assert_eq!(map.len(), 3);

        // existing point is returned untouched
        map.split(&at(&ram, 0x180)).0 = 9;
        assert_eq!(map.split(&at(&ram, 0x180)), &Tag(9));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn spaces_do_not_leak() {
        let (ram, io) = spaces();
        let mut map = PartitionMap::new(Tag(0));

        map.split(&at(&ram, 0x100)).0 = 5;
        assert_eq!(map.get(&at(&io, 0x200)), &Tag(0));
        assert_eq!(map.get(&at(&ram, 0xFFFF_FFFF)), &Tag(5));

        let bounds = map.bounds(&at(&ram, 0x200));
        assert_eq!(bounds.before, Some(&at(&ram, 0x100)));
        assert!(bounds.after.is_none());
    }

    #[test]
    fn bounds() {
        let (ram, _) = spaces();
        let mut map = PartitionMap::new(Tag(0));
        map.split(&at(&ram, 0x100)).0 = 1;
        map.split(&at(&ram, 0x200)).0 = 2;

        let below = map.bounds(&at(&ram, 0x50));
        assert_eq!(below.value, &Tag(0));
        assert!(below.before.is_none());
        assert_eq!(below.after, Some(&at(&ram, 0x100)));

        let exact = map.bounds(&at(&ram, 0x100));
        assert_eq!(exact.value, &Tag(1));
        assert_eq!(exact.before, Some(&at(&ram, 0x100)));
        assert_eq!(exact.after, Some(&at(&ram, 0x200)));
    }

    #[test]
    fn range_mut_respects_end_and_space() {
        let (ram, io) = spaces();
        let mut map = PartitionMap::new(Tag(0));
        for offset in [0x100, 0x200, 0x300] {
            map.split(&at(&ram, offset));
        }
        map.split(&at(&io, 0x10));

        let end = at(&ram, 0x300);
        let visited: Vec<u64> = map
            .range_mut(&at(&ram, 0x100), Some(&end))
            .map(|(point, _)| point.offset())
            .collect();
        assert_eq!(visited, vec![0x100, 0x200]);

        let to_space_end = map.range_mut(&at(&ram, 0x150), None).count();
        assert_eq!(to_space_end, 2);
    }

    #[test]
    fn clear_range_collapses_interior() {
        let (ram, _) = spaces();
        let mut map = PartitionMap::new(Tag(0));
        map.split(&at(&ram, 0x100)).0 = 1;
        map.split(&at(&ram, 0x200)).0 = 2;
        map.split(&at(&ram, 0x300)).0 = 3;

        map.clear_range(&at(&ram, 0x180), Some(&at(&ram, 0x280))).0 = 8;

        assert_eq!(map.get(&at(&ram, 0x17F)), &Tag(1));
        assert_eq!(map.get(&at(&ram, 0x180)), &Tag(8));
        assert_eq!(map.get(&at(&ram, 0x27F)), &Tag(8));
        assert_eq!(map.get(&at(&ram, 0x280)), &Tag(2));
        assert_eq!(map.get(&at(&ram, 0x300)), &Tag(3));
        assert!(map.get_exact(&at(&ram, 0x200)).is_none());
    }
}
