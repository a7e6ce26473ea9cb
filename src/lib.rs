//! shm-hashtable: fixed-capacity hash tables whose entire state lives in one
//! contiguous block of memory, so the block can sit in a shared segment and
//! be picked up again by another process or a later run.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a chained hash table with no heap, no pointers and no per-instance
//!   hasher state, built in small layers that can each be checked on their
//!   own.
//! - Layers:
//!   - `Arena<V, N>`: `N` slots, each free or live, with a free list threaded
//!     through the same `next` field the bucket chains use.
//!   - `Chains<V, N>`: one head link per bucket plus the live count; every
//!     insert, lookup and erase algorithm lives here.
//!   - `HashTable<V, P, N>`: public API. Adds the header used to recognise a
//!     table in foreign memory, the create/resume lifecycle and a debug-only
//!     reentrancy guard.
//!
//! Constraints
//! - Capacity is a const parameter and never changes; the bucket count
//!   equals the capacity. Inserting into a full table fails.
//! - Every link is an arena index (`u32::MAX` for none). Nothing stored in
//!   the table is an address, so it may be mapped at a different address in
//!   every process.
//! - Key policies are types (`KeyPolicy`), resolved at compile time. Hashing
//!   must be deterministic across processes; `FixedState` is the default.
//! - No internal synchronization. Sharing a segment between processes needs
//!   an external lock.
//!
//! Duplicates
//! - `insert_unique` rejects a key that is present and reports where it is.
//! - `insert_equal` appends to the end of the key's run, so equal keys are
//!   contiguous within their chain and listed in insertion order. This is why
//!   `equal_range` can be expressed as a `[first, last)` pair of positions.
//!
//! Traversal
//! - Bucket 0 to `N - 1`, each chain head to tail. A full walk visits every
//!   bucket, so it costs `O(capacity + len)`.
//!
//! Reentrancy policy
//! - While a table method runs, only the key policy and the value's
//!   `Resumable::resume` hook are called back. Neither may touch the same
//!   table; debug builds panic if they do, release builds skip the check.
//!
//! Corruption
//! - Walks are bounded by the capacity and every link is range and tag
//!   checked. Inconsistencies found while walking are logged through
//!   `tracing` and read as end of chain rather than followed.
//!   `HashTable::verify` reports them as errors.

mod arena;
mod chains;
mod diagnostics;
mod error;
mod index;
mod iter;
mod lifecycle;
mod policy;
pub mod reentrancy;
mod resume;
mod segment;
mod table;

#[cfg(test)]
mod table_proptest;

pub use diagnostics::{BucketStats, Dump, DumpLevel};
pub use error::{ConsistencyError, InsertError, ResumeError, SegmentError};
pub use index::SlotIndex;
pub use iter::{Iter, IterMut};
pub use lifecycle::InitMode;
pub use policy::{First, FixedState, Identity, KeyPolicy};
pub use resume::Resumable;
pub use segment::Segment;
pub use table::{HashTable, ShmHashMap, ShmHashSet};
