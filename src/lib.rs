#![no_std]
#![cfg_attr(feature = "nightly", feature(thread_local))]

//! fbmalloc: a fixed-size-block slab allocator with thread-local caching.
//!
//! Serves 64-byte blocks through two operations, `alloc` and `free`, tiered
//! per thread:
//! - Fastbin (short LIFO of recently freed blocks) — fastest path, no slab touched
//! - Current slab (batched refill into the fastbin)
//! - Partial slabs (thread-owned slabs with free blocks)
//! - Fresh slab from the OS
//!
//! The steady state touches only thread-local memory: no locks, no atomics.
//! A block's owning slab is recovered from the block address alone by masking
//! down to the slab-aligned region and loading the header back-pointer, so
//! `free` needs no lookup structure.
//!
//! # Usage
//!
//! ```ignore
//! let p = fbmalloc::alloc();
//! assert!(!p.is_null());
//! unsafe { fbmalloc::free(p) };
//! ```

#[cfg(test)]
extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod allocator;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod platform;
pub mod slab;
pub mod stats;
pub mod thread_cache;

pub(crate) mod config {
    include!(concat!(env!("OUT_DIR"), "/config_gen.rs"));
}

/// Bytes per block (the unit of allocation).
pub const BLOCK_SIZE: usize = config::BLOCK_SIZE;
/// Blocks per slab, header overhead included.
pub const BLOCK_COUNT: usize = config::BLOCK_COUNT;
/// Fastbin capacity per thread.
pub const BLOCK_CACHE_LIMIT: u32 = config::BLOCK_CACHE_LIMIT;
/// Blocks moved from the current slab into the fastbin per refill.
pub const BLOCK_CACHE_REFILL_LIMIT: u32 = config::BLOCK_CACHE_REFILL_LIMIT;

// Re-export the hot-path entry points at crate root for convenience
pub use allocator::{alloc, free, thread_exit};

// Panic handler for staticlib builds (no_std has no default panic handler).
// Only active when panic="abort" (i.e., the `fast` profile), not during normal checks.
#[cfg(all(feature = "ffi", not(test), not(feature = "std"), panic = "abort"))]
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    unsafe extern "C" {
        fn abort() -> !;
    }
    unsafe { abort() }
}
