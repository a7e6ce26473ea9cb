//! Arena positions.
//!
//! Nothing inside a table ever stores an address. Every reference between
//! slots, buckets and the free list is an index into the arena, so the bytes
//! stay meaningful wherever a process maps the segment.

use core::fmt;

/// Position of a live slot inside a table's arena.
///
/// A `SlotIndex` is only meaningful for the table that produced it and only
/// until that slot is erased. It is never an address.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct SlotIndex(u32);

impl SlotIndex {
    pub(crate) const fn new(raw: u32) -> Self {
        SlotIndex(raw)
    }

    pub(crate) const fn from_usize(i: usize) -> Self {
        SlotIndex(i as u32)
    }

    /// The arena position as an index.
    #[inline]
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stored form of an optional `SlotIndex`: bucket heads, chain links and
/// free-list links. `u32::MAX` means "none".
#[derive(Copy, Clone, Eq, PartialEq)]
#[repr(transparent)]
pub(crate) struct Link(u32);

impl Link {
    pub(crate) const NONE: Link = Link(u32::MAX);

    #[inline]
    pub(crate) const fn to(i: SlotIndex) -> Link {
        Link(i.raw())
    }

    #[inline]
    pub(crate) fn from_option(i: Option<SlotIndex>) -> Link {
        i.map_or(Link::NONE, Link::to)
    }

    #[inline]
    pub(crate) const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    /// The raw stored value; unchecked against any capacity.
    #[inline]
    pub(crate) const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("-")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_round_trips_through_option() {
        let i = SlotIndex::new(7);
        assert_eq!(Link::from_option(Some(i)).raw(), 7);
        assert!(Link::from_option(None).is_none());
        assert!(!Link::to(i).is_none());
    }

    #[test]
    fn none_link_is_not_a_valid_index() {
        assert_eq!(Link::NONE.raw(), u32::MAX);
        assert_eq!(format!("{:?}", Link::NONE), "-");
        assert_eq!(format!("{}", SlotIndex::new(3)), "#3");
    }
}
