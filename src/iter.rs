//! Traversal in chain-then-bucket order.
//!
//! An iterator follows the chain of its current bucket; when the chain ends
//! it scans forward for the next non-empty bucket. A full walk therefore costs
//! `O(capacity + len)`: with a fixed bucket count, empty buckets are visited
//! too.

use crate::arena::{Node, NodeState, TAG_LIVE};
use crate::chains::Chains;
use crate::index::{Link, SlotIndex};
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ptr::addr_of;
use tracing::error;

/// Read-only iterator over values, optionally bounded by an end position.
///
/// Yields at most as many values as the table holds, so a corrupted,
/// cyclic chain is logged and ends the walk.
pub struct Iter<'a, V, const N: usize> {
    chains: &'a Chains<V, N>,
    cur: Option<SlotIndex>,
    bucket: usize,
    end: Option<SlotIndex>,
    remaining: usize,
}

impl<'a, V, const N: usize> Iter<'a, V, N> {
    /// Walk from `start` (which sits in `bucket`) up to, not including, `end`.
    pub(crate) fn new(
        chains: &'a Chains<V, N>,
        start: Option<(usize, SlotIndex)>,
        end: Option<SlotIndex>,
    ) -> Self {
        let (bucket, cur) = match start {
            Some((bucket, i)) => (bucket, Some(i)),
            None => (N, None),
        };
        Iter {
            chains,
            cur,
            bucket,
            end,
            remaining: chains.len(),
        }
    }

    pub(crate) fn full(chains: &'a Chains<V, N>) -> Self {
        Self::new(chains, chains.next_occupied(0), None)
    }

    /// Position of the value the next call to `next` yields; `None` once the
    /// iterator is exhausted.
    pub fn position(&self) -> Option<SlotIndex> {
        if self.cur == self.end {
            None
        } else {
            self.cur
        }
    }

    /// Like `next`, also reporting the position of the yielded value.
    pub fn next_with_position(&mut self) -> Option<(SlotIndex, &'a V)> {
        if self.cur == self.end {
            return None;
        }
        let i = self.cur?;
        if self.remaining == 0 {
            error!(slot = i.get(), "iterator walked more slots than the table holds");
            self.cur = None;
            return None;
        }
        self.remaining -= 1;
        let Some(value) = self.chains.arena.value(i) else {
            error!(slot = i.get(), "iterator reached a free slot");
            self.cur = None;
            return None;
        };
        match self.chains.chain_next(i) {
            Some(next) => self.cur = Some(next),
            None => match self.chains.next_occupied(self.bucket + 1) {
                Some((bucket, head)) => {
                    self.bucket = bucket;
                    self.cur = Some(head);
                }
                None => {
                    self.bucket = N;
                    self.cur = None;
                }
            },
        }
        Some((i, value))
    }
}

impl<'a, V, const N: usize> Clone for Iter<'a, V, N> {
    fn clone(&self) -> Self {
        Iter {
            chains: self.chains,
            cur: self.cur,
            bucket: self.bucket,
            end: self.end,
            remaining: self.remaining,
        }
    }
}

impl<'a, V, const N: usize> Iterator for Iter<'a, V, N> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.next_with_position().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.position() {
            None => (0, Some(0)),
            Some(_) => (self.remaining.min(1), Some(self.remaining)),
        }
    }
}

impl<'a, V, const N: usize> FusedIterator for Iter<'a, V, N> {}

/// Mutable iterator over values in traversal order.
///
/// Changing a value in a way that changes its key's hash or equality leaves
/// it in the wrong bucket; lookups for it will then fail. Like for
/// `std::collections::HashMap`, this is a logic error, not undefined
/// behavior.
pub struct IterMut<'a, V, const N: usize> {
    buckets: *const Link,
    nodes: *mut Node<V>,
    cur: Option<SlotIndex>,
    bucket: usize,
    remaining: usize,
    _marker: PhantomData<&'a mut Chains<V, N>>,
}

impl<'a, V, const N: usize> IterMut<'a, V, N> {
    pub(crate) fn new(chains: &'a mut Chains<V, N>) -> Self {
        let (bucket, cur) = match chains.next_occupied(0) {
            Some((bucket, head)) => (bucket, Some(head)),
            None => (N, None),
        };
        let remaining = chains.len();
        let buckets = chains.buckets.as_ptr();
        let nodes = chains.arena.nodes_mut_ptr();
        IterMut {
            buckets,
            nodes,
            cur,
            bucket,
            remaining,
            _marker: PhantomData,
        }
    }

    /// Resolve a chain or bucket link without forming a reference to any
    /// node, since values yielded earlier are mutably borrowed.
    ///
    /// # Safety
    ///
    /// `self.nodes` must point at the `N` nodes this iterator borrows.
    unsafe fn resolve(&self, link: Link) -> Option<SlotIndex> {
        if link.is_none() {
            return None;
        }
        let i = link.raw() as usize;
        if i >= N {
            error!(index = link.raw(), capacity = N, "link points outside the arena");
            return None;
        }
        let node = self.nodes.add(i);
        let live = addr_of!((*node).state).cast::<u8>().read() == TAG_LIVE;
        if addr_of!((*node).index).read() as usize != i || !live {
            error!(slot = i, "iterator reached an inconsistent slot");
            return None;
        }
        Some(SlotIndex::from_usize(i))
    }
}

impl<'a, V, const N: usize> Iterator for IterMut<'a, V, N> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<&'a mut V> {
        let i = self.cur?;
        if self.remaining == 0 {
            error!(slot = i.get(), "iterator walked more slots than the table holds");
            self.cur = None;
            return None;
        }
        self.remaining -= 1;

        // SAFETY: `i` was resolved against the arena, and the iterator holds
        // the table's unique borrow for 'a. Chains of a table are acyclic and
        // disjoint (maintained by every mutation, and required of resumed
        // segments by `HashTable::resume_in`), so each slot is yielded at most
        // once. Links are read through raw pointers to the `next` field, which
        // never overlaps a yielded value.
        unsafe {
            let node = self.nodes.add(i.get());
            let next = addr_of!((*node).next).read();
            self.cur = match self.resolve(next) {
                Some(n) => Some(n),
                None => {
                    let mut found = None;
                    for b in self.bucket + 1..N {
                        if let Some(head) = self.resolve(self.buckets.add(b).read()) {
                            self.bucket = b;
                            found = Some(head);
                            break;
                        }
                    }
                    found
                }
            };
            match &mut (*node).state {
                NodeState::Live(v) => Some(v),
                NodeState::Free => {
                    self.cur = None;
                    None
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.cur {
            None => (0, Some(0)),
            Some(_) => (self.remaining.min(1), Some(self.remaining)),
        }
    }
}

impl<'a, V, const N: usize> FusedIterator for IterMut<'a, V, N> {}
