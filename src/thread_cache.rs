//! Thread cache: the per-thread tiered allocation engine.
//!
//! Each thread owns one `ThreadCache` holding a fastbin (short LIFO of
//! recently freed blocks), one current slab, and a list of partial slabs.
//! `allocate` walks the tiers top-down (fastbin, current slab, partials,
//! fresh slab); `deallocate` pushes into the fastbin until it saturates, then
//! returns the block to its owning slab, recovered from the block address
//! alone. The steady state touches only this thread's data — no locks, no
//! atomics.

use crate::config::{BLOCK_CACHE_LIMIT, BLOCK_CACHE_REFILL_LIMIT};
use crate::slab::{FreeBlock, Slab, SlabList};
use crate::stat_inc;
use core::ptr;

/// Intrusive LIFO of recently freed blocks.
struct Fastbin {
    /// Head of the singly-linked intrusive chain.
    head: *mut FreeBlock,
    /// Number of blocks currently in the bin. Bounded by `BLOCK_CACHE_LIMIT`.
    count: u32,
}

impl Fastbin {
    const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
            count: 0,
        }
    }

    #[inline]
    fn pop(&mut self) -> *mut FreeBlock {
        let block = self.head;
        if !block.is_null() {
            self.head = unsafe { (*block).next };
            self.count -= 1;
        }
        block
    }

    #[inline]
    fn push(&mut self, block: *mut FreeBlock) {
        unsafe { (*block).next = self.head };
        self.head = block;
        self.count += 1;
    }
}

/// Per-thread cache: fastbin, current slab, partial slabs.
///
/// Every slab reachable from `current_slab` or `partial_slabs` is owned
/// exclusively by this cache's thread, and no slab appears in both lists.
/// Blocks in the fastbin are not accounted in their slab's `free_count`.
pub struct ThreadCache {
    /// Head of the current-slab list; allocations are served from the head.
    /// Null after the last current slab was exhausted.
    current_slab: *mut Slab,
    /// Thread-owned slabs with at least one free block, excluding the
    /// current slab.
    partial_slabs: SlabList,
    fastbin: Fastbin,
}

impl Default for ThreadCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadCache {
    /// Const-constructible empty cache, used with const-init TLS.
    pub const fn new() -> Self {
        Self {
            current_slab: ptr::null_mut(),
            partial_slabs: SlabList::new(),
            fastbin: Fastbin::new(),
        }
    }

    /// Acquire one block of `BLOCK_SIZE` writable bytes.
    /// Returns null when the system allocator refuses a fresh slab.
    #[inline]
    pub fn allocate(&mut self) -> *mut u8 {
        stat_inc!(alloc_count);
        let block = self.fastbin.pop();
        if !block.is_null() {
            stat_inc!(fastbin_hits);
            return block as *mut u8;
        }
        self.allocate_slow()
    }

    /// Tiers below the fastbin: current slab (with batched refill), partial
    /// slabs, fresh slab.
    #[cold]
    #[inline(never)]
    fn allocate_slow(&mut self) -> *mut u8 {
        debug_assert_eq!(self.fastbin.count, 0);
        loop {
            let slab = self.current_slab;
            if !slab.is_null() {
                // SAFETY: slabs in this cache's lists are live and exclusively
                // owned by this thread.
                unsafe {
                    if (*slab).free_count > 0 {
                        if (*slab).free_count > BLOCK_CACHE_REFILL_LIMIT {
                            self.refill_from(slab);
                        }
                        let block = (*slab).pop_free();
                        if (*slab).free_count == 0 {
                            // Fully allocated: drop the slab from our lists.
                            // It comes back through a slow-path free.
                            self.current_slab = ptr::null_mut();
                        }
                        return block as *mut u8;
                    }
                }
                self.current_slab = ptr::null_mut();
            }
            // SAFETY: list links are maintained by push/pop only.
            let partial = unsafe { self.partial_slabs.pop() };
            if !partial.is_null() {
                unsafe { (*partial).next = self.current_slab };
                self.current_slab = partial;
                continue;
            }
            if !self.grow() {
                return ptr::null_mut();
            }
        }
    }

    /// Batched refill: detach `BLOCK_CACHE_REFILL_LIMIT` blocks from the
    /// slab's free list into the fastbin, so the frees and allocations that
    /// follow stay on the fastest path. The transfer reverses block order;
    /// free blocks carry no ordering guarantee.
    ///
    /// # Safety
    ///
    /// `slab` must be live with `free_count > BLOCK_CACHE_REFILL_LIMIT`, and
    /// the fastbin must be empty (refill only runs on a fastbin miss).
    unsafe fn refill_from(&mut self, slab: *mut Slab) {
        stat_inc!(refills);
        debug_assert!(self.fastbin.count + BLOCK_CACHE_REFILL_LIMIT <= BLOCK_CACHE_LIMIT);
        for _ in 0..BLOCK_CACHE_REFILL_LIMIT {
            let block = unsafe { (*slab).pop_free() };
            self.fastbin.push(block);
        }
    }

    /// Tier 4: carve a fresh slab and install it at the head of the
    /// current-slab list.
    fn grow(&mut self) -> bool {
        let slab = Slab::allocate();
        if slab.is_null() {
            return false;
        }
        unsafe { (*slab).next = self.current_slab };
        self.current_slab = slab;
        true
    }

    /// Release one block.
    ///
    /// The fast path pushes onto the fastbin without touching the owning slab
    /// at all, so a block freed here migrates to this thread's cache even if
    /// it was allocated elsewhere.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by an `allocate` call on some thread in
    /// this process and must not have been freed since.
    #[inline]
    pub unsafe fn deallocate(&mut self, ptr: *mut u8) {
        stat_inc!(free_count);
        if self.fastbin.count < BLOCK_CACHE_LIMIT {
            self.fastbin.push(ptr as *mut FreeBlock);
            return;
        }
        unsafe { self.deallocate_slow(ptr as *mut FreeBlock) };
    }

    /// Slow path: the fastbin is saturated. Return the block to its owning
    /// slab; if that revives a fully-allocated slab, adopt the slab into this
    /// thread's partial list. The previous owner dropped the slab from its
    /// lists when it ran dry, so the adoption hands it to exactly one thread.
    #[cold]
    unsafe fn deallocate_slow(&mut self, block: *mut FreeBlock) {
        stat_inc!(slow_frees);
        unsafe {
            let slab = Slab::from_block(block as *mut u8);
            let revived = (*slab).reclaim(block);
            if revived && slab != self.current_slab {
                stat_inc!(slab_adoptions);
                self.partial_slabs.push(slab);
            }
        }
    }

    /// Fallback for a `free` arriving after this thread's cache was torn
    /// down: return the block straight to its owning slab. No adoption — the
    /// revived slab stays untracked until the owning thread exits.
    ///
    /// # Safety
    ///
    /// Same contract as [`ThreadCache::deallocate`].
    pub(crate) unsafe fn orphan_free(ptr: *mut u8) {
        stat_inc!(free_count);
        stat_inc!(slow_frees);
        unsafe {
            let slab = Slab::from_block(ptr);
            (*slab).reclaim(ptr as *mut FreeBlock);
        }
    }

    /// Release every slab this cache owns back to the system allocator and
    /// reset the cache to its empty state. Called on thread exit.
    ///
    /// Blocks sitting in the fastbin are reclaimed together with the slabs
    /// that own them, so the bin is simply dropped.
    ///
    /// # Safety
    ///
    /// Blocks handed out from this cache's slabs must no longer be accessed;
    /// their backing memory goes back to the OS.
    pub unsafe fn release_all(&mut self) {
        self.fastbin = Fastbin::new();
        unsafe {
            Self::release_chain(self.current_slab);
            Self::release_chain(self.partial_slabs.head);
        }
        self.current_slab = ptr::null_mut();
        self.partial_slabs = SlabList::new();
    }

    unsafe fn release_chain(head: *mut Slab) {
        let mut slab = head;
        while !slab.is_null() {
            let next = unsafe { (*slab).next };
            unsafe { Slab::release(slab) };
            slab = next;
        }
    }

    /// All slabs reachable from this cache's lists, current first.
    #[cfg(test)]
    fn owned_slabs(&self) -> alloc::vec::Vec<*mut Slab> {
        let mut slabs = alloc::vec::Vec::new();
        for head in [self.current_slab, self.partial_slabs.head] {
            let mut slab = head;
            while !slab.is_null() {
                slabs.push(slab);
                slab = unsafe { (*slab).next };
            }
        }
        slabs
    }
}
