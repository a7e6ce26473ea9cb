//! HashTable: the public engine over a fixed arena and bucket directory.

use crate::chains::Chains;
use crate::error::InsertError;
use crate::index::SlotIndex;
use crate::iter::{Iter, IterMut};
use crate::lifecycle::Header;
use crate::policy::{First, Identity, KeyPolicy};
use crate::reentrancy::DebugReentrancy;
use core::fmt;
use core::marker::PhantomData;
use tracing::warn;

/// A fixed-capacity hash table whose state is position independent.
///
/// `N` is both the arena capacity and the bucket count; it never changes.
/// `P` decides how keys are extracted from values, hashed and compared.
/// Every internal reference is an arena index, so the table may live in a
/// memory segment mapped at different addresses by different processes.
///
/// The table does no locking. Callers sharing one between processes must
/// serialize every operation themselves.
#[repr(C)]
pub struct HashTable<V, P, const N: usize> {
    pub(crate) header: Header,
    pub(crate) guard: DebugReentrancy,
    pub(crate) chains: Chains<V, N>,
    _policy: PhantomData<fn() -> P>,
}

/// Set of unique keys.
pub type ShmHashSet<K, const N: usize> = HashTable<K, Identity, N>;

/// Map from keys to payloads, stored as `(key, payload)` pairs.
pub type ShmHashMap<K, T, const N: usize> = HashTable<(K, T), First, N>;

impl<V, P, const N: usize> HashTable<V, P, N>
where
    P: KeyPolicy<V>,
{
    #[inline]
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of live values, fixed by `N`.
    #[inline]
    pub fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.chains.is_full()
    }

    /// Number of values that can still be inserted.
    #[inline]
    pub fn remaining(&self) -> usize {
        N - self.len()
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        N
    }

    /// Length of bucket `n`'s chain; zero for `n >= bucket_count()`.
    pub fn elems_in_bucket(&self, n: usize) -> usize {
        let _g = self.guard.enter();
        self.chains.elems_in_bucket(n)
    }

    /// Bucket a key hashes to.
    pub fn bucket_of(&self, key: &P::Key) -> usize {
        let _g = self.guard.enter();
        Chains::<V, N>::bucket_of::<P>(key)
    }

    /// Insert unless an equal key is present.
    ///
    /// On a duplicate the table is unchanged and the existing position is
    /// reported; this is checked before capacity, so a full table still
    /// reports duplicates.
    pub fn insert_unique(&mut self, value: V) -> Result<SlotIndex, InsertError> {
        let _g = self.guard.enter();
        self.chains.insert_unique::<P>(value)
    }

    /// Insert, keeping all values with equal keys adjacent in insertion
    /// order. Fails only when the table is full.
    pub fn insert_equal(&mut self, value: V) -> Result<SlotIndex, InsertError> {
        let _g = self.guard.enter();
        self.chains.insert_equal::<P>(value)
    }

    /// Unique-insert each value in order; returns how many were stored.
    /// Values that do not fit are dropped, nothing is rolled back.
    pub fn extend_unique<I>(&mut self, values: I) -> usize
    where
        I: IntoIterator<Item = V>,
    {
        let mut stored = 0;
        for v in values {
            if self.insert_unique(v).is_ok() {
                stored += 1;
            }
        }
        stored
    }

    /// Equal-insert each value in order; returns how many were stored.
    pub fn extend_equal<I>(&mut self, values: I) -> usize
    where
        I: IntoIterator<Item = V>,
    {
        let mut stored = 0;
        for v in values {
            if self.insert_equal(v).is_ok() {
                stored += 1;
            }
        }
        stored
    }

    /// Position of the first value whose key equals `key`.
    pub fn find(&self, key: &P::Key) -> Option<SlotIndex> {
        let _g = self.guard.enter();
        self.chains.find::<P>(key)
    }

    pub fn contains(&self, key: &P::Key) -> bool {
        self.find(key).is_some()
    }

    /// First value whose key equals `key`.
    pub fn get_by_key(&self, key: &P::Key) -> Option<&V> {
        let i = self.find(key)?;
        self.chains.arena.value(i)
    }

    /// Number of values whose key equals `key`: 0 or 1 when only
    /// `insert_unique` is used.
    pub fn count(&self, key: &P::Key) -> usize {
        let _g = self.guard.enter();
        self.chains.count::<P>(key)
    }

    /// Value at `pos`.
    ///
    /// A position that holds no value (erased, or from another table) is
    /// logged and yields `None`.
    pub fn get(&self, pos: SlotIndex) -> Option<&V> {
        let v = self.chains.arena.value(pos);
        if v.is_none() {
            warn!(slot = pos.get(), "dereferenced a position holding no value");
        }
        v
    }

    /// Mutable value at `pos`. Mutating the key part of the value is a logic
    /// error: the value stays in the bucket of its old key.
    pub fn get_mut(&mut self, pos: SlotIndex) -> Option<&mut V> {
        let v = self.chains.arena.value_mut(pos);
        if v.is_none() {
            warn!(slot = pos.get(), "dereferenced a position holding no value");
        }
        v
    }

    /// Position of the first value in traversal order.
    pub fn first_position(&self) -> Option<SlotIndex> {
        self.chains.first_from(0)
    }

    /// Position after `pos` in traversal order: the next slot of its chain,
    /// else the head of the next non-empty bucket. `None` at the end, or if
    /// `pos` holds no value.
    pub fn next_position(&self, pos: SlotIndex) -> Option<SlotIndex> {
        let _g = self.guard.enter();
        if !self.chains.arena.is_live(pos) {
            warn!(slot = pos.get(), "advanced a position holding no value");
            return None;
        }
        self.chains.successor::<P>(pos)
    }

    pub fn iter(&self) -> Iter<'_, V, N> {
        Iter::full(&self.chains)
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, V, N> {
        IterMut::new(&mut self.chains)
    }

    /// Values from `first` up to, not including, `last`, in traversal order.
    pub fn range(&self, first: Option<SlotIndex>, last: Option<SlotIndex>) -> Iter<'_, V, N> {
        let _g = self.guard.enter();
        let start = first.and_then(|i| {
            let key = self.chains.key_at::<P>(i)?;
            Some((Chains::<V, N>::bucket_of::<P>(key), i))
        });
        if first.is_some() && start.is_none() {
            warn!("range starts at a position holding no value");
        }
        Iter::new(&self.chains, start, last)
    }

    /// Positions `[lower, upper)` of the values whose key equals `key`.
    /// `(None, None)` when the key is absent.
    pub fn equal_range_bounds(&self, key: &P::Key) -> (Option<SlotIndex>, Option<SlotIndex>) {
        let _g = self.guard.enter();
        self.chains.equal_range::<P>(key)
    }

    /// All values whose key equals `key`, in insertion order when they were
    /// added with `insert_equal`.
    pub fn equal_range(&self, key: &P::Key) -> Iter<'_, V, N> {
        let _g = self.guard.enter();
        let (lower, upper) = self.chains.equal_range::<P>(key);
        let start = lower.map(|i| (Chains::<V, N>::bucket_of::<P>(key), i));
        Iter::new(&self.chains, start, upper)
    }

    /// Remove every value whose key equals `key`; returns how many.
    pub fn erase(&mut self, key: &P::Key) -> usize {
        let _g = self.guard.enter();
        self.chains.erase_key::<P>(key)
    }

    /// Remove the value at `pos` and hand it back.
    ///
    /// Slots do not know their predecessor, so this re-walks the bucket:
    /// `O(chain length)`.
    pub fn erase_at(&mut self, pos: SlotIndex) -> Option<V> {
        let _g = self.guard.enter();
        self.chains.erase_at::<P>(pos)
    }

    /// Remove the values from `first` up to, not including, `last`, in
    /// traversal order; returns how many.
    pub fn erase_range(&mut self, first: Option<SlotIndex>, last: Option<SlotIndex>) -> usize {
        let _g = self.guard.enter();
        self.chains.erase_range::<P>(first, last)
    }

    /// Remove everything. `O(capacity)`.
    pub fn clear(&mut self) {
        let _g = self.guard.enter();
        self.chains.clear();
        tracing::debug!(capacity = N, "cleared table");
    }
}

impl<V, P, const N: usize> PartialEq for HashTable<V, P, N>
where
    V: PartialEq,
    P: KeyPolicy<V>,
{
    /// Same length, and every bucket's chain equal element by element.
    fn eq(&self, other: &Self) -> bool {
        let _g = self.guard.enter();
        self.chains.chains_equal(&other.chains)
    }
}

impl<V, P, const N: usize> Eq for HashTable<V, P, N>
where
    V: Eq,
    P: KeyPolicy<V>,
{
}

impl<V, P, const N: usize> fmt::Debug for HashTable<V, P, N>
where
    V: fmt::Debug,
    P: KeyPolicy<V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, V, P, const N: usize> IntoIterator for &'a HashTable<V, P, N>
where
    P: KeyPolicy<V>,
{
    type Item = &'a V;
    type IntoIter = Iter<'a, V, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, V, P, const N: usize> IntoIterator for &'a mut HashTable<V, P, N>
where
    P: KeyPolicy<V>,
{
    type Item = &'a mut V;
    type IntoIter = IterMut<'a, V, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
