//! Slab layout and construction: an aligned region holding a header plus a
//! fixed array of blocks, threaded into an intrusive free list.
//!
//! A slab region is aligned to its own size, so any block address masked with
//! `SLAB_MASK` yields the region start, and the first word of the region is a
//! back-pointer to the header. That single mask-and-load is how `free`
//! recovers the owning slab without any lookup structure.

use crate::config::{BLOCK_COUNT, BLOCK_SIZE};
use crate::platform;
use crate::{stat_add, stat_inc};
use core::mem;
use core::ptr;

/// An intrusive free-list node stored inside a freed block.
/// The `next` pointer occupies the first bytes of the free block; the rest of
/// the payload is dead while the block sits on a free list.
#[repr(C)]
pub struct FreeBlock {
    pub next: *mut FreeBlock,
}

/// Total bytes in a slab region; also the region's alignment.
pub const SLAB_BYTES: usize = BLOCK_SIZE * BLOCK_COUNT;
/// Maps any block address down to its slab region start.
pub const SLAB_MASK: usize = !(SLAB_BYTES - 1);
/// Bytes requested from the system allocator per slab. The excess over
/// `SLAB_BYTES` guarantees an aligned region fits at some offset.
pub const SLAB_RAW_BYTES: usize = 2 * SLAB_BYTES;
/// Blocks consumed by the header at the start of the region.
pub const SLAB_OVERHEAD: usize = (mem::size_of::<Slab>() + BLOCK_SIZE - 1) / BLOCK_SIZE;
/// Allocatable blocks per slab.
pub const EFFECTIVE_BLOCKS: usize = BLOCK_COUNT - SLAB_OVERHEAD;

const _: () = assert!(BLOCK_SIZE >= mem::size_of::<FreeBlock>());
const _: () = assert!(SLAB_BYTES.is_power_of_two());
const _: () = assert!(SLAB_OVERHEAD < BLOCK_COUNT);

/// Slab header, stored at the start of its aligned region.
///
/// `mem` is the first field on purpose: it equals the header's own address,
/// so `*(region as *const *mut Slab)` recovers the header from any block
/// address masked down to the region start.
#[repr(C)]
pub struct Slab {
    /// Aligned region start (the header's own address).
    pub mem: *mut u8,
    /// Unaligned pointer returned by the system allocator, kept for release.
    pub raw_allocation: *mut u8,
    /// Head of this slab's free chain.
    pub free_list: *mut FreeBlock,
    /// Number of blocks in `free_list`.
    pub free_count: u32,
    /// Link in the owning thread's current/partial list.
    pub next: *mut Slab,
}

impl Slab {
    /// Carve a fresh slab out of a new system allocation.
    ///
    /// The raw allocation is twice the slab size; the slab lives in the first
    /// `SLAB_BYTES`-aligned range inside it. All `EFFECTIVE_BLOCKS` blocks
    /// start on the free list in ascending address order. Returns null when
    /// the system allocator refuses the request.
    pub fn allocate() -> *mut Slab {
        let raw = unsafe { platform::sys_alloc(SLAB_RAW_BYTES) };
        if raw.is_null() {
            return ptr::null_mut();
        }
        stat_inc!(slab_allocs);
        stat_add!(os_alloc_bytes, SLAB_RAW_BYTES as u64);

        let region = ((raw as usize + SLAB_BYTES - 1) & SLAB_MASK) as *mut u8;
        let slab = region as *mut Slab;
        unsafe {
            ptr::write(
                slab,
                Slab {
                    mem: region,
                    raw_allocation: raw,
                    free_list: ptr::null_mut(),
                    free_count: 0,
                    next: ptr::null_mut(),
                },
            );

            // Zero the block array up front. Touching every page here moves
            // the fault cost out of the first allocations.
            let blocks = region.add(SLAB_OVERHEAD * BLOCK_SIZE);
            ptr::write_bytes(blocks, 0, EFFECTIVE_BLOCKS * BLOCK_SIZE);

            for i in 0..EFFECTIVE_BLOCKS {
                let block = blocks.add(i * BLOCK_SIZE) as *mut FreeBlock;
                (*block).next = if i + 1 < EFFECTIVE_BLOCKS {
                    blocks.add((i + 1) * BLOCK_SIZE) as *mut FreeBlock
                } else {
                    ptr::null_mut()
                };
            }
            (*slab).free_list = blocks as *mut FreeBlock;
            (*slab).free_count = EFFECTIVE_BLOCKS as u32;
        }
        slab
    }

    /// Recover the owning slab of a block from the block address alone.
    ///
    /// # Safety
    ///
    /// `block` must lie within a live slab region produced by [`Slab::allocate`].
    #[inline]
    pub unsafe fn from_block(block: *mut u8) -> *mut Slab {
        let region = (block as usize) & SLAB_MASK;
        unsafe { *(region as *const *mut Slab) }
    }

    /// Pop one block off the free chain.
    ///
    /// # Safety
    ///
    /// The chain must be non-empty (`free_count > 0`).
    #[inline]
    pub unsafe fn pop_free(&mut self) -> *mut FreeBlock {
        let block = self.free_list;
        debug_assert!(!block.is_null());
        unsafe { self.free_list = (*block).next };
        self.free_count -= 1;
        block
    }

    /// Push a freed block onto this slab's free chain. Returns true when the
    /// slab went from fully allocated to having one free block.
    ///
    /// # Safety
    ///
    /// `block` must belong to this slab and must not already be free.
    #[inline]
    pub unsafe fn reclaim(&mut self, block: *mut FreeBlock) -> bool {
        unsafe { (*block).next = self.free_list };
        self.free_list = block;
        self.free_count += 1;
        self.free_count == 1
    }

    /// Return the backing allocation to the system allocator.
    ///
    /// # Safety
    ///
    /// `slab` must have been returned by [`Slab::allocate`] and must not be
    /// used afterwards; any outstanding block pointers into it dangle.
    pub unsafe fn release(slab: *mut Slab) {
        stat_inc!(slab_releases);
        unsafe { platform::sys_free((*slab).raw_allocation, SLAB_RAW_BYTES) };
    }
}

/// A singly-linked list of slabs, threaded through `Slab::next`.
pub struct SlabList {
    pub head: *mut Slab,
}

impl Default for SlabList {
    fn default() -> Self {
        Self::new()
    }
}

impl SlabList {
    pub const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
        }
    }

    /// Prepend a slab to the front of the list.
    ///
    /// # Safety
    ///
    /// `slab` must be valid, non-null, and not already in a list.
    #[inline]
    pub unsafe fn push(&mut self, slab: *mut Slab) {
        unsafe { (*slab).next = self.head };
        self.head = slab;
    }

    /// Pop the first slab from the list, or null when empty.
    ///
    /// # Safety
    ///
    /// The list's internal links must be valid (maintained by `push`).
    #[inline]
    pub unsafe fn pop(&mut self) -> *mut Slab {
        let slab = self.head;
        if !slab.is_null() {
            unsafe {
                self.head = (*slab).next;
                (*slab).next = ptr::null_mut();
            }
        }
        slab
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }
}
