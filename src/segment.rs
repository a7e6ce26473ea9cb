//! File-backed shared segments.
//!
//! A [`Segment`] maps a file read-write and shared, so every process mapping
//! the same file sees the same table bytes. The table is placed at offset
//! zero; mappings are page aligned, which satisfies the alignment of any
//! table type.

use crate::error::SegmentError;
use crate::lifecycle::InitMode;
use crate::policy::KeyPolicy;
use crate::resume::Resumable;
use crate::table::HashTable;
use core::mem::{self, MaybeUninit};
use memmap2::MmapMut;
use std::fs::File;
use tracing::debug;

/// A shared, writable mapping of a file.
pub struct Segment {
    map: MmapMut,
}

impl Segment {
    /// Map the whole of `file` as it is.
    pub fn open(file: &File) -> Result<Self, SegmentError> {
        // SAFETY: the mapping is only reached through `Segment`, whose table
        // accessor is itself unsafe and documents the sharing requirements.
        let map = unsafe { MmapMut::map_mut(file)? };
        debug!(len = map.len(), "mapped segment");
        Ok(Segment { map })
    }

    /// Size `file` to hold exactly one `T` and map it.
    ///
    /// A file that is already large enough keeps its length and contents.
    pub fn create<T>(file: &File) -> Result<Self, SegmentError> {
        let need = mem::size_of::<T>() as u64;
        if file.metadata()?.len() < need {
            file.set_len(need)?;
        }
        Self::open(file)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Write dirty pages back to the file and wait for completion.
    pub fn flush(&self) -> Result<(), SegmentError> {
        self.map.flush()?;
        Ok(())
    }

    /// The table at the start of the segment, created or resumed per `mode`.
    ///
    /// # Safety
    ///
    /// With [`InitMode::Resume`], the segment must have been initialized by
    /// a `HashTable<V, P, N>` of this exact type (see
    /// [`HashTable::resume_in`]). The table performs no synchronization of
    /// its own: while the returned reference is used to mutate, or to create
    /// the table, no other mapping of the file may access it. Read-only
    /// operations through several mappings at once are fine; they write
    /// nothing to the segment. Resuming runs every value's
    /// [`Resumable::resume`] hook and counts as mutation unless that hook
    /// leaves the value unchanged.
    pub unsafe fn table<V, P, const N: usize>(
        &mut self,
        mode: InitMode,
    ) -> Result<&mut HashTable<V, P, N>, SegmentError>
    where
        V: Resumable,
        P: KeyPolicy<V>,
    {
        let need = mem::size_of::<HashTable<V, P, N>>();
        let have = self.map.len();
        if have < need {
            return Err(SegmentError::TooSmall { need, have });
        }
        let base = self.map.as_mut_ptr();
        let align = mem::align_of::<HashTable<V, P, N>>();
        if base.align_offset(align) != 0 {
            return Err(SegmentError::Misaligned { align });
        }
        let mem = &mut *base.cast::<MaybeUninit<HashTable<V, P, N>>>();
        Ok(HashTable::attach(mem, mode)?)
    }
}
