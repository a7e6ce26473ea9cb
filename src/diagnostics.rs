//! Structural checks and dumps. Not needed for correctness; useful when a
//! shared segment is suspected to have been mutated without synchronization.

use crate::chains::Chains;
use crate::error::ConsistencyError;
use crate::index::SlotIndex;
use crate::policy::KeyPolicy;
use crate::table::HashTable;
use core::fmt;

/// Occupancy summary of the bucket directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BucketStats {
    pub occupied: usize,
    pub longest_chain: usize,
}

/// How much a [`Dump`] prints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpLevel {
    /// One line: length, capacity, occupied buckets.
    Simple,
    /// Every non-empty bucket with the slot indices of its chain, and the
    /// free-list head.
    Structure,
    /// Like `Structure`, with each slot's value.
    Detail,
}

/// `Display` adaptor returned by [`HashTable::dump`].
pub struct Dump<'a, V, P, const N: usize> {
    table: &'a HashTable<V, P, N>,
    level: DumpLevel,
}

impl<V, P, const N: usize> HashTable<V, P, N>
where
    P: KeyPolicy<V>,
{
    /// Walk the whole structure and report the first defect found.
    ///
    /// Checks every link against the arena, self-indices, that each chain
    /// only holds live slots hashing to its bucket, that no slot is reached
    /// twice, that free and live slots together cover the arena, that the
    /// recorded length matches, and that equal keys are contiguous within
    /// each chain. `O(capacity^2)` in the worst case; no allocation.
    pub fn verify(&self) -> Result<(), ConsistencyError> {
        let _g = self.guard.enter();
        let chains = &self.chains;
        let nodes = chains.arena.nodes();

        for (slot, node) in nodes.iter().enumerate() {
            if node.index as usize != slot {
                return Err(ConsistencyError::SelfIndexMismatch {
                    slot,
                    found: node.index,
                });
            }
            let next = node.next;
            if !next.is_none() && next.raw() as usize >= N {
                return Err(ConsistencyError::IndexOutOfRange {
                    index: next.raw(),
                    capacity: N,
                });
            }
        }

        let mut reachable = 0;
        for bucket in 0..N {
            let head = chains.buckets[bucket];
            if !head.is_none() && head.raw() as usize >= N {
                return Err(ConsistencyError::IndexOutOfRange {
                    index: head.raw(),
                    capacity: N,
                });
            }
            let mut steps = 0;
            let mut link = head;
            while !link.is_none() {
                let slot = link.raw() as usize;
                let node = &nodes[slot];
                let Some(value) = node.value() else {
                    return Err(ConsistencyError::FreeSlotInChain { bucket, slot });
                };
                let expected = Chains::<V, N>::bucket_of::<P>(P::extract_key(value));
                if expected != bucket {
                    return Err(ConsistencyError::WrongBucket {
                        slot,
                        expected,
                        found: bucket,
                    });
                }
                steps += 1;
                if steps > N {
                    return Err(ConsistencyError::Revisited { slot });
                }
                link = node.next;
            }
            reachable += steps;
            self.check_contiguous(bucket)?;
        }
        if reachable > N {
            return Err(ConsistencyError::LengthMismatch {
                recorded: chains.len(),
                reachable,
            });
        }

        let mut free = 0;
        let mut link = chains.arena.free_head();
        while !link.is_none() {
            let slot = link.raw() as usize;
            if slot >= N {
                return Err(ConsistencyError::IndexOutOfRange {
                    index: link.raw(),
                    capacity: N,
                });
            }
            if nodes[slot].is_live() {
                return Err(ConsistencyError::LiveSlotInFreeList { slot });
            }
            free += 1;
            if free > N {
                return Err(ConsistencyError::Revisited { slot });
            }
            link = nodes[slot].next;
        }

        let live = nodes.iter().filter(|n| n.is_live()).count();
        if free + live != N {
            return Err(ConsistencyError::Leaked {
                free,
                live,
                capacity: N,
            });
        }
        // Every chain only holds live slots and together they reach `live`
        // slots exactly when no slot is shared between chains.
        if reachable != live || live != chains.len() {
            return Err(ConsistencyError::LengthMismatch {
                recorded: chains.len(),
                reachable,
            });
        }
        Ok(())
    }

    /// Equal keys within one chain form a single run.
    fn check_contiguous(&self, bucket: usize) -> Result<(), ConsistencyError> {
        let chains = &self.chains;
        for (pos, i) in chains.chain(bucket).enumerate() {
            let Some(key) = chains.key_at::<P>(i) else { continue };
            let mut left_run = false;
            for j in chains.chain(bucket).skip(pos + 1) {
                let same = chains.key_at::<P>(j).map_or(false, |k| P::equal(k, key));
                if !same {
                    left_run = true;
                } else if left_run {
                    return Err(ConsistencyError::Interleaved {
                        bucket,
                        slot: j.get(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn bucket_stats(&self) -> BucketStats {
        let _g = self.guard.enter();
        let mut stats = BucketStats::default();
        for bucket in 0..N {
            let len = self.chains.elems_in_bucket(bucket);
            if len > 0 {
                stats.occupied += 1;
                stats.longest_chain = stats.longest_chain.max(len);
            }
        }
        stats
    }

    pub fn dump(&self, level: DumpLevel) -> Dump<'_, V, P, N> {
        Dump { table: self, level }
    }
}

impl<'a, V, P, const N: usize> fmt::Display for Dump<'a, V, P, N>
where
    V: fmt::Debug,
    P: KeyPolicy<V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table;
        let stats = table.bucket_stats();
        write!(
            f,
            "table len={} capacity={} occupied_buckets={} longest_chain={}",
            table.len(),
            N,
            stats.occupied,
            stats.longest_chain
        )?;
        if self.level == DumpLevel::Simple {
            return Ok(());
        }
        writeln!(f, " free_head={:?}", table.chains.arena.free_head())?;
        for bucket in 0..N {
            let mut chain = table.chains.chain(bucket).peekable();
            if chain.peek().is_none() {
                continue;
            }
            write!(f, "  [{bucket}]")?;
            for i in chain {
                self.slot(f, i)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<'a, V, P, const N: usize> Dump<'a, V, P, N>
where
    V: fmt::Debug,
{
    fn slot(&self, f: &mut fmt::Formatter<'_>, i: SlotIndex) -> fmt::Result {
        match (self.level, self.table.chains.arena.value(i)) {
            (DumpLevel::Detail, Some(v)) => write!(f, " {}={:?}", i.get(), v),
            _ => write!(f, " {}", i.get()),
        }
    }
}
