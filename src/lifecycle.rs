//! Create and resume.
//!
//! A table's bytes are its persisted state. Mapping a segment either lays
//! out a fresh table over it (`Create`) or picks up a table an earlier
//! attachment left behind (`Resume`). The two paths are different entry
//! points on purpose: create may overwrite anything, resume may only read
//! and then repair per-value state through [`Resumable`].

use crate::chains::Chains;
use crate::error::ResumeError;
use crate::policy::KeyPolicy;
use crate::reentrancy::DebugReentrancy;
use crate::resume::Resumable;
use crate::table::HashTable;
use core::mem::{self, MaybeUninit};
use core::ptr::{addr_of, addr_of_mut};
use tracing::debug;

/// First word of every table: `SHMHTB01`.
pub(crate) const MAGIC: u64 = u64::from_le_bytes(*b"SHMHTB01");

const STATE_CREATING: u32 = 0;
const STATE_READY: u32 = 0x5245_4459;

/// How to initialize a table over memory that may already hold one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InitMode {
    /// Lay out an empty table, discarding whatever the memory held.
    Create,
    /// Trust the memory to hold a table of this exact type from an earlier
    /// attachment and continue using it.
    Resume,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct Header {
    magic: u64,
    layout: u64,
    state: u32,
    _reserved: u32,
}

impl Header {
    /// Capacity in the high half, node size in the low half. Catches
    /// resuming a segment with a table of a different shape.
    pub(crate) fn layout<V, const N: usize>() -> u64 {
        ((N as u64) << 32) | mem::size_of::<crate::arena::Node<V>>() as u64
    }

    fn creating<V, const N: usize>() -> Self {
        Header {
            magic: MAGIC,
            layout: Self::layout::<V, N>(),
            state: STATE_CREATING,
            _reserved: 0,
        }
    }

    fn validate<V, const N: usize>(&self) -> Result<(), ResumeError> {
        if self.magic != MAGIC {
            return Err(ResumeError::NotATable { found: self.magic });
        }
        let expected = Self::layout::<V, N>();
        if self.layout != expected {
            return Err(ResumeError::LayoutMismatch {
                expected,
                found: self.layout,
            });
        }
        if self.state != STATE_READY {
            return Err(ResumeError::Uninitialized);
        }
        Ok(())
    }
}

impl<V, P, const N: usize> HashTable<V, P, N>
where
    P: KeyPolicy<V>,
{
    const CAPACITY_OK: () = assert!(N > 0 && N < u32::MAX as usize, "capacity out of range");

    /// An empty table owned by the caller.
    ///
    /// The whole arena is inline, so for large capacities prefer
    /// [`create_in`](Self::create_in) over memory you provide.
    pub fn new() -> Self {
        let mut mem = MaybeUninit::uninit();
        Self::create_in(&mut mem);
        // SAFETY: `create_in` initialized every field.
        unsafe { mem.assume_init() }
    }

    /// Lay out an empty table in `mem`: every bucket empty, the free list
    /// threading slots `0..N`, length zero. The ready flag is written last.
    ///
    /// Whatever `mem` held is overwritten without running destructors.
    pub fn create_in(mem: &mut MaybeUninit<Self>) -> &mut Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;
        let table = mem.as_mut_ptr();
        // SAFETY: `table` comes from a `&mut MaybeUninit<Self>`, so it is
        // valid for writes and aligned. Every field is written before
        // `assume_init_mut`; the policy marker is zero-sized.
        unsafe {
            addr_of_mut!((*table).header).write(Header::creating::<V, N>());
            addr_of_mut!((*table).guard).write(DebugReentrancy::new());
            Chains::init_raw(addr_of_mut!((*table).chains));
            addr_of_mut!((*table).header.state).write(STATE_READY);
            debug!(capacity = N, "created table");
            mem.assume_init_mut()
        }
    }

    /// Continue using a table an earlier attachment left in `mem`.
    ///
    /// The header, every slot's tag and self-index, all links and the live
    /// count are checked before the bytes are trusted. Then every live value
    /// has [`Resumable::resume`] run on it; free slots and the free list are
    /// left untouched.
    ///
    /// # Safety
    ///
    /// `mem` must hold initialized bytes (for example a mapped file), and if
    /// they pass the header check they must have been written by a
    /// `HashTable<V, P, N>` of this exact type and policy, built from the
    /// same binary or one with identical layout and hashing. No other party
    /// may mutate the memory while the returned reference is alive.
    pub unsafe fn resume_in(mem: &mut MaybeUninit<Self>) -> Result<&mut Self, ResumeError>
    where
        V: Resumable,
    {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;
        let table = mem.as_mut_ptr();
        addr_of!((*table).header).read().validate::<V, N>()?;
        Chains::validate_raw(addr_of!((*table).chains))?;

        let table = mem.assume_init_mut();
        {
            let _g = table.guard.enter();
            table.chains.arena.resume_live();
        }
        debug!(capacity = N, len = table.len(), "resumed table");
        Ok(table)
    }

    /// Initialize `mem` as `mode` says.
    ///
    /// # Safety
    ///
    /// As for [`resume_in`](Self::resume_in) when `mode` is
    /// [`InitMode::Resume`]; creating is always safe.
    pub unsafe fn attach(
        mem: &mut MaybeUninit<Self>,
        mode: InitMode,
    ) -> Result<&mut Self, ResumeError>
    where
        V: Resumable,
    {
        match mode {
            InitMode::Create => Ok(Self::create_in(mem)),
            InitMode::Resume => Self::resume_in(mem),
        }
    }

    /// Exchange the contents of two tables.
    ///
    /// The arena is embedded storage, not a separately owned buffer, so there
    /// is no handle to swap: the full state of both tables is exchanged
    /// through a temporary, costing `O(capacity)`.
    pub fn swap(&mut self, other: &mut Self) {
        let _g = self.guard.enter();
        let _h = other.guard.enter();
        mem::swap(&mut self.chains, &mut other.chains);
    }
}

impl<V, P, const N: usize> Default for HashTable<V, P, N>
where
    P: KeyPolicy<V>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, P, const N: usize> Clone for HashTable<V, P, N>
where
    V: Clone,
    P: KeyPolicy<V>,
{
    fn clone(&self) -> Self {
        let mut copy = Self::new();
        copy.clone_from(self);
        copy
    }

    /// Clear `self`, then replay every bucket of `source` in chain order into
    /// fresh slots. Arena positions are not preserved; chain order, and with
    /// it the contiguity of equal keys, is.
    fn clone_from(&mut self, source: &Self) {
        let _g = self.guard.enter();
        let _s = source.guard.enter();
        self.chains.assign_from(&source.chains);
    }
}
