//! Error types.
//!
//! None of these are raised by unwinding; every fallible operation returns
//! them (or a sentinel `Option`/count) and the caller decides.

use crate::index::SlotIndex;

/// Why an insertion stored nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InsertError {
    /// Unique insertion found an equal key already stored at this position.
    #[error("key already present at slot {0}")]
    Duplicate(SlotIndex),
    /// Every arena slot is in use.
    #[error("table is full")]
    Full,
}

/// Why the bytes of a segment could not be resumed as a table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResumeError {
    #[error("segment does not hold a table (magic {found:#018x})")]
    NotATable { found: u64 },
    #[error("segment layout {found:#018x} does not match this table type ({expected:#018x})")]
    LayoutMismatch { expected: u64, found: u64 },
    #[error("segment table was never completely created")]
    Uninitialized,
    #[error("recorded length {len} exceeds capacity {capacity}")]
    LengthOutOfRange { len: u32, capacity: usize },
    #[error("recorded length {recorded} disagrees with {live} live slots")]
    LengthMismatch { recorded: u32, live: usize },
    #[error("slot {slot} carries an invalid state tag {tag}")]
    CorruptSlot { slot: usize, tag: u8 },
    #[error("slot {slot} records self-index {found}")]
    SelfIndexMismatch { slot: usize, found: u32 },
    #[error("link {index} out of range (slot {slot:?}, `None` for the free-list head)")]
    LinkOutOfRange { slot: Option<usize>, index: u32 },
    #[error("bucket {bucket} head {index} out of range")]
    BucketOutOfRange { bucket: usize, index: u32 },
}

/// A structural defect found by [`HashTable::verify`](crate::HashTable::verify).
///
/// Any of these indicates memory corruption, typically from mutating a
/// shared table without external synchronization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsistencyError {
    #[error("link {index} points outside the arena of {capacity} slots")]
    IndexOutOfRange { index: u32, capacity: usize },
    #[error("slot {slot} records self-index {found}")]
    SelfIndexMismatch { slot: usize, found: u32 },
    #[error("bucket {bucket} chain reaches free slot {slot}")]
    FreeSlotInChain { bucket: usize, slot: usize },
    #[error("slot {slot} is in bucket {found}'s chain but hashes to bucket {expected}")]
    WrongBucket { slot: usize, expected: usize, found: usize },
    #[error("slot {slot} is reachable more than once")]
    Revisited { slot: usize },
    #[error("free list reaches live slot {slot}")]
    LiveSlotInFreeList { slot: usize },
    #[error("recorded length {recorded} disagrees with {reachable} reachable slots")]
    LengthMismatch { recorded: usize, reachable: usize },
    #[error("{free} free and {live} live slots do not cover capacity {capacity}")]
    Leaked { free: usize, live: usize, capacity: usize },
    #[error("bucket {bucket}: equal keys split around slot {slot}")]
    Interleaved { bucket: usize, slot: usize },
}

/// Failure to hand out a table over a mapped segment.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("failed to map segment: {0}")]
    Io(#[from] std::io::Error),
    #[error("segment of {have} bytes cannot hold a table of {need} bytes")]
    TooSmall { need: usize, have: usize },
    #[error("segment address is not aligned to {align} bytes")]
    Misaligned { align: usize },
    #[error(transparent)]
    Resume(#[from] ResumeError),
}
