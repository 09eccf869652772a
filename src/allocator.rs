//! Public entry points and the thread-local cache plumbing.
//!
//! A thread's cache is created lazily on its first `alloc` or `free` and torn
//! down when the thread exits, returning every slab the thread owns to the
//! OS. Two TLS strategies (fastest first):
//! - `nightly` feature: `#[thread_local]` with const-init (single TLS read,
//!   no lazy-init branch); teardown registered through a `std` drop guard
//!   when the `std` feature is also enabled, or via an explicit
//!   [`thread_exit`] call otherwise.
//! - `std` feature: `std::thread_local!` with const-init; the cell's `Drop`
//!   is the thread-exit destructor.

use crate::thread_cache::ThreadCache;
use core::ptr;

cfg_if::cfg_if! {
    if #[cfg(feature = "nightly")] {
        #[derive(Clone, Copy, PartialEq)]
        #[repr(u8)]
        enum TlsState {
            Uninitialized = 0,
            Active = 1,
            Destroyed = 2,
        }

        struct TlsSlot {
            state: TlsState,
            cache: ThreadCache,
        }

        #[thread_local]
        static mut TC: TlsSlot = TlsSlot {
            state: TlsState::Uninitialized,
            cache: ThreadCache::new(),
        };

        /// Get a raw mutable pointer to the thread-local cache.
        #[inline(always)]
        unsafe fn tc() -> *mut ThreadCache {
            unsafe { core::ptr::addr_of_mut!(TC.cache) }
        }

        /// Activate the const-initialized cache and register teardown.
        #[cold]
        #[inline(never)]
        unsafe fn tc_init() {
            // Set BEFORE cleanup registration — if register() triggers an
            // allocation, the reentrant call sees TC as Active and uses it
            // normally.
            unsafe { TC.state = TlsState::Active };
            tc_cleanup::register();
        }

        /// Release the cache's slabs and mark TC as Destroyed (reentrancy-safe).
        #[cold]
        unsafe fn tc_destroy() {
            unsafe {
                if TC.state == TlsState::Active {
                    TC.state = TlsState::Destroyed;
                    (*tc()).release_all();
                }
            }
        }

        // -- Cleanup: nightly + std --
        #[cfg(feature = "std")]
        mod tc_cleanup {
            struct Guard;

            impl Drop for Guard {
                fn drop(&mut self) {
                    unsafe { super::tc_destroy() };
                }
            }

            std::thread_local! {
                static GUARD: Guard = const { Guard };
            }

            pub(super) fn register() {
                // Use try_with: if std's TLS is already destroyed (rare edge
                // case during thread shutdown), silently skip — the cache's
                // slabs leak.
                let _ = GUARD.try_with(|_| {});
            }
        }

        // -- Cleanup: nightly, no std. There is no exit hook; callers must
        // invoke `thread_exit` before the thread terminates. --
        #[cfg(not(feature = "std"))]
        mod tc_cleanup {
            pub(super) fn register() {}
        }

        /// Acquire one fixed-size block. Returns null when the system
        /// allocator is out of memory, or after this thread's cache has been
        /// torn down.
        #[inline]
        pub fn alloc() -> *mut u8 {
            unsafe {
                if TC.state == TlsState::Active {
                    return (*tc()).allocate();
                }
            }
            alloc_slow()
        }

        #[cold]
        #[inline(never)]
        fn alloc_slow() -> *mut u8 {
            unsafe {
                if TC.state == TlsState::Uninitialized {
                    tc_init();
                    return (*tc()).allocate();
                }
            }
            ptr::null_mut() // cache already destroyed
        }

        /// Release one block previously returned by [`alloc`] on any thread.
        ///
        /// # Safety
        ///
        /// `ptr` must come from [`alloc`] and must not have been freed since.
        #[inline]
        pub unsafe fn free(ptr: *mut u8) {
            unsafe {
                if TC.state == TlsState::Active {
                    (*tc()).deallocate(ptr);
                    return;
                }
                free_slow(ptr);
            }
        }

        #[cold]
        #[inline(never)]
        unsafe fn free_slow(ptr: *mut u8) {
            unsafe {
                if TC.state == TlsState::Uninitialized {
                    tc_init();
                    (*tc()).deallocate(ptr);
                    return;
                }
                // Cache already destroyed: hand the block straight back to
                // its owning slab.
                ThreadCache::orphan_free(ptr);
            }
        }

        /// Release the calling thread's cache now.
        ///
        /// Required on runtimes without a thread-exit hook (`nightly` without
        /// `std`). Subsequent `alloc` calls on this thread return null.
        pub fn thread_exit() {
            unsafe { tc_destroy() }
        }
    } else if #[cfg(feature = "std")] {
        use core::cell::UnsafeCell;

        /// TLS cell whose drop is the thread-exit destructor.
        struct CacheCell(UnsafeCell<ThreadCache>);

        impl Drop for CacheCell {
            fn drop(&mut self) {
                // The cache lives inside the TLS slot itself; releasing the
                // slabs is all the teardown there is.
                unsafe { (*self.0.get()).release_all() };
            }
        }

        std::thread_local! {
            static TC: CacheCell = const { CacheCell(UnsafeCell::new(ThreadCache::new())) };
        }

        /// Acquire one fixed-size block. Returns null when the system
        /// allocator is out of memory, or after this thread's cache has been
        /// torn down.
        #[inline]
        pub fn alloc() -> *mut u8 {
            TC.try_with(|cell| unsafe { (*cell.0.get()).allocate() })
                .unwrap_or(ptr::null_mut())
        }

        /// Release one block previously returned by [`alloc`] on any thread.
        ///
        /// # Safety
        ///
        /// `ptr` must come from [`alloc`] and must not have been freed since.
        #[inline]
        pub unsafe fn free(ptr: *mut u8) {
            let done = TC.try_with(|cell| unsafe { (*cell.0.get()).deallocate(ptr) });
            if done.is_err() {
                // This thread's cache is already gone: hand the block
                // straight back to its owning slab.
                unsafe { ThreadCache::orphan_free(ptr) };
            }
        }

        /// Release the calling thread's cache now.
        ///
        /// The thread may keep allocating afterwards; the cache simply starts
        /// over empty. Only useful for returning a long-lived idle thread's
        /// slabs early — normal teardown runs automatically at thread exit.
        pub fn thread_exit() {
            let _ = TC.try_with(|cell| unsafe { (*cell.0.get()).release_all() });
        }
    } else {
        compile_error!(
            "fbmalloc requires the `std` or `nightly` feature: the engine is the \
             per-thread cache, and it needs a thread-local storage mechanism"
        );
    }
}
