//! Fixed node arena with an index-linked free list.
//!
//! Every slot is always present in the arena; a slot is either `Free` (linked
//! into the free chain) or `Live` (holding a value and linked into exactly one
//! bucket chain). The same `next` field serves both chains.

use crate::error::ResumeError;
use crate::index::{Link, SlotIndex};
use crate::resume::Resumable;
use core::mem;
use core::ptr::{addr_of, addr_of_mut};
use tracing::error;

#[repr(C)]
pub(crate) struct Node<V> {
    /// Next slot in the bucket chain while live, next free slot while free.
    pub(crate) next: Link,
    /// The slot's own arena position.
    pub(crate) index: u32,
    pub(crate) state: NodeState<V>,
}

// `repr(C, u8)`: the tag is the first byte of the state, followed by the
// payload. Resume relies on this to inspect slots before trusting them.
#[repr(C, u8)]
pub(crate) enum NodeState<V> {
    Free,
    Live(V),
}

pub(crate) const TAG_FREE: u8 = 0;
pub(crate) const TAG_LIVE: u8 = 1;

impl<V> Node<V> {
    fn free(index: usize, next: Link) -> Self {
        Node {
            next,
            index: index as u32,
            state: NodeState::Free,
        }
    }

    #[inline]
    pub(crate) fn value(&self) -> Option<&V> {
        match &self.state {
            NodeState::Live(v) => Some(v),
            NodeState::Free => None,
        }
    }

    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        matches!(self.state, NodeState::Live(_))
    }
}

#[repr(C)]
pub(crate) struct Arena<V, const N: usize> {
    free_head: Link,
    nodes: [Node<V>; N],
}

impl<V, const N: usize> Arena<V, N> {
    const fn free_successor(i: usize) -> Link {
        if i + 1 < N {
            Link::to(SlotIndex::from_usize(i + 1))
        } else {
            Link::NONE
        }
    }

    const fn first_free() -> Link {
        if N > 0 {
            Link::to(SlotIndex::new(0))
        } else {
            Link::NONE
        }
    }

    /// Lay out an empty arena in place: all slots free, threaded `0..N`.
    ///
    /// # Safety
    ///
    /// `arena` must be valid for writes of `Self` and suitably aligned. Any
    /// values previously stored there are overwritten without being dropped.
    pub(crate) unsafe fn init_raw(arena: *mut Self) {
        addr_of_mut!((*arena).free_head).write(Self::first_free());
        let nodes = addr_of_mut!((*arena).nodes) as *mut Node<V>;
        for i in 0..N {
            nodes.add(i).write(Node::free(i, Self::free_successor(i)));
        }
    }

    /// Check the bytes of an arena left behind by an earlier attachment
    /// without forming a reference to any value. Returns the number of live
    /// slots.
    ///
    /// # Safety
    ///
    /// `arena` must be valid for reads of `Self`, with initialized bytes.
    pub(crate) unsafe fn validate_raw(arena: *const Self) -> Result<usize, ResumeError> {
        let head = addr_of!((*arena).free_head).read();
        if !head.is_none() && head.raw() as usize >= N {
            return Err(ResumeError::LinkOutOfRange {
                slot: None,
                index: head.raw(),
            });
        }

        let nodes = addr_of!((*arena).nodes) as *const Node<V>;
        let mut live = 0;
        for i in 0..N {
            let node = nodes.add(i);
            let index = addr_of!((*node).index).read();
            if index as usize != i {
                return Err(ResumeError::SelfIndexMismatch { slot: i, found: index });
            }
            let next = addr_of!((*node).next).read();
            if !next.is_none() && next.raw() as usize >= N {
                return Err(ResumeError::LinkOutOfRange {
                    slot: Some(i),
                    index: next.raw(),
                });
            }
            match addr_of!((*node).state).cast::<u8>().read() {
                TAG_FREE => {}
                TAG_LIVE => live += 1,
                tag => return Err(ResumeError::CorruptSlot { slot: i, tag }),
            }
        }
        Ok(live)
    }

    /// Resolve a stored link to a position, checking it against the arena.
    ///
    /// A link outside `0..N` or pointing at a slot whose self-index disagrees
    /// with its position means the structure is corrupt; this is logged and
    /// treated like the end of the chain.
    pub(crate) fn resolve(&self, link: Link) -> Option<SlotIndex> {
        if link.is_none() {
            return None;
        }
        let i = link.raw() as usize;
        match self.nodes.get(i) {
            None => {
                error!(index = link.raw(), capacity = N, "link points outside the arena");
                None
            }
            Some(node) if node.index as usize != i => {
                error!(slot = i, recorded = node.index, "slot self-index mismatch");
                None
            }
            Some(_) => Some(SlotIndex::from_usize(i)),
        }
    }

    /// Like `resolve`, for links that must lead to a live slot (bucket heads
    /// and chain links).
    pub(crate) fn resolve_live(&self, link: Link) -> Option<SlotIndex> {
        let i = self.resolve(link)?;
        if self.nodes[i.get()].is_live() {
            Some(i)
        } else {
            error!(slot = i.get(), "free slot linked into a bucket chain");
            None
        }
    }

    #[inline]
    pub(crate) fn next_link(&self, i: SlotIndex) -> Link {
        self.nodes.get(i.get()).map_or(Link::NONE, |n| n.next)
    }

    #[inline]
    pub(crate) fn set_next(&mut self, i: SlotIndex, link: Link) {
        if let Some(node) = self.nodes.get_mut(i.get()) {
            node.next = link;
        }
    }

    #[inline]
    pub(crate) fn value(&self, i: SlotIndex) -> Option<&V> {
        self.nodes.get(i.get()).and_then(Node::value)
    }

    #[inline]
    pub(crate) fn value_mut(&mut self, i: SlotIndex) -> Option<&mut V> {
        match self.nodes.get_mut(i.get()).map(|n| &mut n.state) {
            Some(NodeState::Live(v)) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn is_live(&self, i: SlotIndex) -> bool {
        self.nodes.get(i.get()).map_or(false, Node::is_live)
    }

    pub(crate) fn free_head(&self) -> Link {
        self.free_head
    }

    pub(crate) fn nodes(&self) -> &[Node<V>] {
        &self.nodes
    }

    pub(crate) fn nodes_mut_ptr(&mut self) -> *mut Node<V> {
        self.nodes.as_mut_ptr()
    }

    /// Take the free-list head and store `value` there. The new slot is
    /// unlinked (`next` is none). Returns `None` when no slot is free.
    pub(crate) fn allocate(&mut self, value: V) -> Option<SlotIndex> {
        let i = self.resolve(self.free_head)?;
        let node = &mut self.nodes[i.get()];
        if node.is_live() {
            error!(slot = i.get(), "free list reaches a live slot");
            return None;
        }
        self.free_head = node.next;
        node.next = Link::NONE;
        node.state = NodeState::Live(value);
        Some(i)
    }

    /// Mark a live slot free and push it onto the free-list head, handing
    /// the value back. The caller must already have unlinked it from its
    /// bucket chain.
    pub(crate) fn recycle(&mut self, i: SlotIndex) -> Option<V> {
        let node = self.nodes.get_mut(i.get())?;
        match mem::replace(&mut node.state, NodeState::Free) {
            NodeState::Live(v) => {
                node.next = self.free_head;
                self.free_head = Link::to(i);
                Some(v)
            }
            NodeState::Free => None,
        }
    }

    /// Drop every live value and thread the whole arena back onto the free
    /// list in index order.
    pub(crate) fn rethread(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.state = NodeState::Free;
            node.next = Self::free_successor(i);
            node.index = i as u32;
        }
        self.free_head = Self::first_free();
    }
}

impl<V: Resumable, const N: usize> Arena<V, N> {
    /// Run the resume hook of every live value. Free slots and their links
    /// are left untouched.
    pub(crate) fn resume_live(&mut self) {
        for node in self.nodes.iter_mut() {
            if let NodeState::Live(v) = &mut node.state {
                v.resume();
            }
        }
    }
}
