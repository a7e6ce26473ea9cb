//! Bucket directory and chain algorithms.
//!
//! `Chains` owns the live count, one head link per bucket and the arena. All
//! structural mutation of a table happens here; the public layer in `table`
//! only adds the reentrancy guard and the lifecycle.
//!
//! Chains are singly linked and slots carry no predecessor link, so removing
//! a given slot re-walks its bucket to find the predecessor. Equal keys are
//! kept contiguous within a chain, which lets an equal range end at the first
//! slot of the next non-empty bucket.

use crate::arena::Arena;
use crate::error::{InsertError, ResumeError};
use crate::index::{Link, SlotIndex};
use crate::policy::KeyPolicy;
use core::ptr::{addr_of, addr_of_mut};
use tracing::{debug, error, warn};

#[repr(C)]
pub(crate) struct Chains<V, const N: usize> {
    pub(crate) len: u32,
    pub(crate) buckets: [Link; N],
    pub(crate) arena: Arena<V, N>,
}

/// Positions along one bucket chain. Stops after `N` steps so a corrupted,
/// cyclic chain cannot hang the caller.
pub(crate) struct Chain<'a, V, const N: usize> {
    chains: &'a Chains<V, N>,
    cur: Option<SlotIndex>,
    budget: usize,
}

impl<'a, V, const N: usize> Iterator for Chain<'a, V, N> {
    type Item = SlotIndex;

    fn next(&mut self) -> Option<SlotIndex> {
        let i = self.cur?;
        if self.budget == 0 {
            error!(slot = i.get(), capacity = N, "bucket chain longer than the arena");
            self.cur = None;
            return None;
        }
        self.budget -= 1;
        self.cur = self.chains.chain_next(i);
        Some(i)
    }
}

impl<V, const N: usize> Chains<V, N> {
    /// Lay out an empty directory and arena in place.
    ///
    /// # Safety
    ///
    /// `chains` must be valid for writes of `Self` and suitably aligned.
    pub(crate) unsafe fn init_raw(chains: *mut Self) {
        addr_of_mut!((*chains).len).write(0);
        let buckets = addr_of_mut!((*chains).buckets) as *mut Link;
        for b in 0..N {
            buckets.add(b).write(Link::NONE);
        }
        Arena::init_raw(addr_of_mut!((*chains).arena));
    }

    /// Check bytes left by an earlier attachment before they are trusted.
    ///
    /// # Safety
    ///
    /// `chains` must be valid for reads of `Self`, with initialized bytes.
    pub(crate) unsafe fn validate_raw(chains: *const Self) -> Result<(), ResumeError> {
        let len = addr_of!((*chains).len).read();
        if len as usize > N {
            return Err(ResumeError::LengthOutOfRange { len, capacity: N });
        }
        let buckets = addr_of!((*chains).buckets) as *const Link;
        for bucket in 0..N {
            let head = buckets.add(bucket).read();
            if !head.is_none() && head.raw() as usize >= N {
                return Err(ResumeError::BucketOutOfRange {
                    bucket,
                    index: head.raw(),
                });
            }
        }
        let live = Arena::validate_raw(addr_of!((*chains).arena))?;
        if live != len as usize {
            return Err(ResumeError::LengthMismatch { recorded: len, live });
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.len() >= N
    }

    #[inline]
    pub(crate) fn bucket_of<P: KeyPolicy<V>>(key: &P::Key) -> usize {
        (P::hash(key) % N as u64) as usize
    }

    #[inline]
    pub(crate) fn key_at<P: KeyPolicy<V>>(&self, i: SlotIndex) -> Option<&P::Key> {
        self.arena.value(i).map(P::extract_key)
    }

    #[inline]
    fn matches<P: KeyPolicy<V>>(&self, i: SlotIndex, key: &P::Key) -> bool {
        self.key_at::<P>(i).map_or(false, |k| P::equal(k, key))
    }

    pub(crate) fn head(&self, bucket: usize) -> Option<SlotIndex> {
        self.buckets
            .get(bucket)
            .and_then(|&link| self.arena.resolve_live(link))
    }

    #[inline]
    pub(crate) fn chain_next(&self, i: SlotIndex) -> Option<SlotIndex> {
        self.arena.resolve_live(self.arena.next_link(i))
    }

    pub(crate) fn chain(&self, bucket: usize) -> Chain<'_, V, N> {
        self.chain_from(self.head(bucket))
    }

    pub(crate) fn chain_from(&self, start: Option<SlotIndex>) -> Chain<'_, V, N> {
        Chain {
            chains: self,
            cur: start,
            budget: N,
        }
    }

    /// Head of the first non-empty bucket at or after `bucket`.
    pub(crate) fn first_from(&self, bucket: usize) -> Option<SlotIndex> {
        self.next_occupied(bucket).map(|(_, head)| head)
    }

    /// First non-empty bucket at or after `bucket`, with its head.
    pub(crate) fn next_occupied(&self, bucket: usize) -> Option<(usize, SlotIndex)> {
        (bucket..N).find_map(|b| self.head(b).map(|head| (b, head)))
    }

    /// Traversal successor of `i`, recomputing its bucket from its key when
    /// the chain ends.
    pub(crate) fn successor<P: KeyPolicy<V>>(&self, i: SlotIndex) -> Option<SlotIndex> {
        self.chain_next(i).or_else(|| {
            let bucket = Self::bucket_of::<P>(self.key_at::<P>(i)?);
            self.first_from(bucket + 1)
        })
    }

    pub(crate) fn find_in_bucket<P: KeyPolicy<V>>(
        &self,
        bucket: usize,
        key: &P::Key,
    ) -> Option<SlotIndex> {
        self.chain(bucket).find(|&i| self.matches::<P>(i, key))
    }

    pub(crate) fn find<P: KeyPolicy<V>>(&self, key: &P::Key) -> Option<SlotIndex> {
        self.find_in_bucket::<P>(Self::bucket_of::<P>(key), key)
    }

    pub(crate) fn count<P: KeyPolicy<V>>(&self, key: &P::Key) -> usize {
        self.chain(Self::bucket_of::<P>(key))
            .filter(|&i| self.matches::<P>(i, key))
            .count()
    }

    /// Bounds `[lower, upper)` of the run of slots equal to `key`, in
    /// traversal order. `(None, None)` when the key is absent.
    pub(crate) fn equal_range<P: KeyPolicy<V>>(
        &self,
        key: &P::Key,
    ) -> (Option<SlotIndex>, Option<SlotIndex>) {
        let bucket = Self::bucket_of::<P>(key);
        let Some(first) = self.find_in_bucket::<P>(bucket, key) else {
            return (None, None);
        };
        match self
            .chain_from(Some(first))
            .skip(1)
            .find(|&i| !self.matches::<P>(i, key))
        {
            Some(upper) => (Some(first), Some(upper)),
            None => (Some(first), self.first_from(bucket + 1)),
        }
    }

    pub(crate) fn elems_in_bucket(&self, bucket: usize) -> usize {
        self.chain(bucket).count()
    }

    /// Position before `i` in `bucket`'s chain: `Some(None)` when `i` is the
    /// head, `None` when `i` is not in that chain at all.
    fn predecessor(&self, bucket: usize, i: SlotIndex) -> Option<Option<SlotIndex>> {
        let mut pred = None;
        for j in self.chain(bucket) {
            if j == i {
                return Some(pred);
            }
            pred = Some(j);
        }
        None
    }

    fn link_after(&mut self, bucket: usize, pred: Option<SlotIndex>, next: Link) {
        match pred {
            None => self.buckets[bucket] = next,
            Some(p) => self.arena.set_next(p, next),
        }
    }

    fn take(&mut self, i: SlotIndex) -> Option<V> {
        let v = self.arena.recycle(i)?;
        self.len -= 1;
        Some(v)
    }

    fn allocate(&mut self, value: V) -> Result<SlotIndex, InsertError> {
        match self.arena.allocate(value) {
            Some(i) => {
                self.len += 1;
                Ok(i)
            }
            None => {
                debug!(capacity = N, "insert into a full table");
                Err(InsertError::Full)
            }
        }
    }

    fn push_front(&mut self, bucket: usize, value: V) -> Result<SlotIndex, InsertError> {
        let i = self.allocate(value)?;
        self.arena.set_next(i, self.buckets[bucket]);
        self.buckets[bucket] = Link::to(i);
        Ok(i)
    }

    pub(crate) fn insert_unique<P: KeyPolicy<V>>(
        &mut self,
        value: V,
    ) -> Result<SlotIndex, InsertError> {
        let key = P::extract_key(&value);
        let bucket = Self::bucket_of::<P>(key);
        if let Some(existing) = self.find_in_bucket::<P>(bucket, key) {
            return Err(InsertError::Duplicate(existing));
        }
        self.push_front(bucket, value)
    }

    /// Insert allowing duplicates. A key already present gets the new slot
    /// spliced after the last slot of its run, so the run stays contiguous
    /// and lists values in insertion order.
    pub(crate) fn insert_equal<P: KeyPolicy<V>>(
        &mut self,
        value: V,
    ) -> Result<SlotIndex, InsertError> {
        let (bucket, run_end) = {
            let key = P::extract_key(&value);
            let bucket = Self::bucket_of::<P>(key);
            let mut last = None;
            for i in self.chain(bucket) {
                if self.matches::<P>(i, key) {
                    last = Some(i);
                } else if last.is_some() {
                    break;
                }
            }
            (bucket, last)
        };

        let Some(tail) = run_end else {
            return self.push_front(bucket, value);
        };
        let after = self.arena.next_link(tail);
        let i = self.allocate(value)?;
        self.arena.set_next(i, after);
        self.arena.set_next(tail, Link::to(i));
        Ok(i)
    }

    /// Remove every slot whose key equals `key`.
    pub(crate) fn erase_key<P: KeyPolicy<V>>(&mut self, key: &P::Key) -> usize {
        let bucket = Self::bucket_of::<P>(key);
        let mut removed = 0;
        let mut pred = None;
        let mut cur = self.head(bucket);
        let mut budget = N;
        while let Some(i) = cur {
            if budget == 0 {
                error!(bucket, capacity = N, "bucket chain longer than the arena");
                break;
            }
            budget -= 1;
            let next = self.chain_next(i);
            if self.matches::<P>(i, key) {
                self.link_after(bucket, pred, self.arena.next_link(i));
                drop(self.take(i));
                removed += 1;
            } else {
                pred = Some(i);
            }
            cur = next;
        }
        removed
    }

    /// Remove exactly the slot at `i`.
    pub(crate) fn erase_at<P: KeyPolicy<V>>(&mut self, i: SlotIndex) -> Option<V> {
        let Some(key) = self.key_at::<P>(i) else {
            warn!(slot = i.get(), "erase through a position holding no value");
            return None;
        };
        let bucket = Self::bucket_of::<P>(key);
        let Some(pred) = self.predecessor(bucket, i) else {
            error!(slot = i.get(), bucket, "live slot missing from its bucket chain");
            return None;
        };
        self.link_after(bucket, pred, self.arena.next_link(i));
        self.take(i)
    }

    /// Remove the slots of `[first, last)` in traversal order.
    pub(crate) fn erase_range<P: KeyPolicy<V>>(
        &mut self,
        first: Option<SlotIndex>,
        last: Option<SlotIndex>,
    ) -> usize {
        let Some(f) = first else { return 0 };
        if first == last {
            return 0;
        }
        let Some(first_bucket) = self.key_at::<P>(f).map(Self::bucket_of::<P>) else {
            warn!(slot = f.get(), "erase range starting at a position holding no value");
            return 0;
        };
        let last_bucket = match last {
            None => N,
            Some(l) => match self.key_at::<P>(l).map(Self::bucket_of::<P>) {
                Some(b) => b,
                None => {
                    warn!(slot = l.get(), "erase range ending at a position holding no value");
                    return 0;
                }
            },
        };
        if last_bucket < first_bucket {
            warn!(first = f.get(), "erase range ends before it starts");
            return 0;
        }

        if first_bucket == last_bucket {
            return self.erase_in_bucket(first_bucket, f, last);
        }
        let mut removed = self.erase_in_bucket(first_bucket, f, None);
        for bucket in first_bucket + 1..last_bucket {
            if let Some(head) = self.head(bucket) {
                removed += self.erase_in_bucket(bucket, head, None);
            }
        }
        if last_bucket < N {
            if let Some(head) = self.head(last_bucket) {
                removed += self.erase_in_bucket(last_bucket, head, last);
            }
        }
        removed
    }

    /// Remove the run from `from` up to (not including) `to` within one chain.
    fn erase_in_bucket(&mut self, bucket: usize, from: SlotIndex, to: Option<SlotIndex>) -> usize {
        let Some(pred) = self.predecessor(bucket, from) else {
            error!(slot = from.get(), bucket, "live slot missing from its bucket chain");
            return 0;
        };
        if to.is_some() && !self.chain_from(Some(from)).any(|j| Some(j) == to) {
            warn!(slot = from.get(), bucket, "erase range end does not follow its start");
            return 0;
        }

        let mut removed = 0;
        let mut cur = Some(from);
        while cur != to {
            let Some(i) = cur else { break };
            cur = self.chain_next(i);
            drop(self.take(i));
            removed += 1;
        }
        self.link_after(bucket, pred, Link::from_option(cur));
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.buckets.fill(Link::NONE);
        self.arena.rethread();
        self.len = 0;
    }

    /// Make `self` hold copies of `other`'s values, replaying each bucket's
    /// chain in order into freshly allocated slots.
    pub(crate) fn assign_from(&mut self, other: &Self)
    where
        V: Clone,
    {
        self.clear();
        for bucket in 0..N {
            let mut tail: Option<SlotIndex> = None;
            for j in other.chain(bucket) {
                let Some(v) = other.arena.value(j) else { continue };
                let Ok(i) = self.allocate(v.clone()) else {
                    error!(bucket, "copy ran out of slots");
                    return;
                };
                self.link_after(bucket, tail, Link::to(i));
                tail = Some(i);
            }
        }
    }

    pub(crate) fn chains_equal(&self, other: &Self) -> bool
    where
        V: PartialEq,
    {
        self.len == other.len
            && (0..N).all(|bucket| {
                self.chain(bucket)
                    .map(|i| self.arena.value(i))
                    .eq(other.chain(bucket).map(|i| other.arena.value(i)))
            })
    }
}
