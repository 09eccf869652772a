//! Event counters behind the `stats` feature.
//!
//! The hot paths record events through `stat_inc!` / `stat_add!`, which
//! expand to nothing unless the feature is enabled, so steady-state code
//! keeps its no-atomics property. When enabled, the counters are `Relaxed`
//! atomics: purely observational, never used for synchronization. Use
//! `snapshot` to read them; the loads are individually atomic but not
//! mutually consistent.

/// Record one occurrence of an event on the named counter.
///
/// Expands to nothing unless the `stats` feature is enabled.
#[macro_export]
macro_rules! stat_inc {
    ($counter:ident) => {
        #[cfg(feature = "stats")]
        {
            use ::core::sync::atomic::Ordering;
            $crate::stats::STATS.$counter.fetch_add(1, Ordering::Relaxed);
        }
    };
}

/// Record an amount (cast to `u64`) on the named counter.
///
/// Expands to nothing — the amount expression included — unless the `stats`
/// feature is enabled.
#[macro_export]
macro_rules! stat_add {
    ($counter:ident, $amount:expr) => {
        #[cfg(feature = "stats")]
        {
            use ::core::sync::atomic::Ordering;
            $crate::stats::STATS
                .$counter
                .fetch_add(($amount) as u64, Ordering::Relaxed);
        }
    };
}

#[cfg(feature = "stats")]
pub use counters::{Snapshot, snapshot};

#[cfg(feature = "stats")]
pub(crate) use counters::STATS;

#[cfg(feature = "stats")]
mod counters {
    use core::sync::atomic::{AtomicU64, Ordering};

    /// One `Relaxed` atomic per tracked event.
    pub(crate) struct Stats {
        /// Calls to `alloc` served by a thread cache.
        pub(crate) alloc_count: AtomicU64,
        /// Calls to `free` handled by a thread cache.
        pub(crate) free_count: AtomicU64,
        /// Allocations served straight off the fastbin.
        pub(crate) fastbin_hits: AtomicU64,
        /// Batched transfers from a current slab into a fastbin.
        pub(crate) refills: AtomicU64,
        /// Frees that took the slow path back to the owning slab.
        pub(crate) slow_frees: AtomicU64,
        /// Full slabs revived by a slow-path free and adopted into a
        /// partial list.
        pub(crate) slab_adoptions: AtomicU64,
        /// Slabs carved from fresh system allocations.
        pub(crate) slab_allocs: AtomicU64,
        /// Slabs returned to the system allocator at thread exit.
        pub(crate) slab_releases: AtomicU64,
        /// Bytes requested from the system allocator.
        pub(crate) os_alloc_bytes: AtomicU64,
    }

    pub(crate) static STATS: Stats = Stats {
        alloc_count: AtomicU64::new(0),
        free_count: AtomicU64::new(0),
        fastbin_hits: AtomicU64::new(0),
        refills: AtomicU64::new(0),
        slow_frees: AtomicU64::new(0),
        slab_adoptions: AtomicU64::new(0),
        slab_allocs: AtomicU64::new(0),
        slab_releases: AtomicU64::new(0),
        os_alloc_bytes: AtomicU64::new(0),
    };

    /// A point-in-time copy of every counter, as plain `u64` values.
    ///
    /// Concurrent operations may race between the individual loads; for
    /// monitoring that is always sufficient.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Snapshot {
        /// Calls to `alloc` served by a thread cache.
        pub alloc_count: u64,
        /// Calls to `free` handled by a thread cache.
        pub free_count: u64,
        /// Allocations served straight off the fastbin.
        pub fastbin_hits: u64,
        /// Batched transfers from a current slab into a fastbin.
        pub refills: u64,
        /// Frees that took the slow path back to the owning slab.
        pub slow_frees: u64,
        /// Full slabs revived by a slow-path free and adopted into a
        /// partial list.
        pub slab_adoptions: u64,
        /// Slabs carved from fresh system allocations.
        pub slab_allocs: u64,
        /// Slabs returned to the system allocator at thread exit.
        pub slab_releases: u64,
        /// Bytes requested from the system allocator.
        pub os_alloc_bytes: u64,
    }

    /// Load every counter (`Relaxed`) into a [`Snapshot`].
    pub fn snapshot() -> Snapshot {
        let s = &STATS;
        Snapshot {
            alloc_count: s.alloc_count.load(Ordering::Relaxed),
            free_count: s.free_count.load(Ordering::Relaxed),
            fastbin_hits: s.fastbin_hits.load(Ordering::Relaxed),
            refills: s.refills.load(Ordering::Relaxed),
            slow_frees: s.slow_frees.load(Ordering::Relaxed),
            slab_adoptions: s.slab_adoptions.load(Ordering::Relaxed),
            slab_allocs: s.slab_allocs.load(Ordering::Relaxed),
            slab_releases: s.slab_releases.load(Ordering::Relaxed),
            os_alloc_bytes: s.os_alloc_bytes.load(Ordering::Relaxed),
        }
    }
}
