//! Thread teardown accounting: every slab a thread constructs is returned to
//! the system allocator exactly once when the thread exits.
//!
//! Built only with `--features stats` (see `[[test]]` in Cargo.toml); this
//! file holds a single test so no concurrent test run disturbs the global
//! counters.

use fbmalloc::slab::EFFECTIVE_BLOCKS;
use fbmalloc::{alloc, free, stats};

#[test]
fn thread_exit_releases_every_slab_once() {
    let before = stats::snapshot();

    std::thread::spawn(|| {
        // Two full slabs plus a couple of blocks from a third.
        let count = 2 * EFFECTIVE_BLOCKS + 2;
        let mut blocks = Vec::with_capacity(count);
        for _ in 0..count {
            let ptr = alloc();
            assert!(!ptr.is_null());
            blocks.push(ptr);
        }
        for ptr in blocks {
            unsafe { free(ptr) };
        }
    })
    .join()
    .unwrap();

    let after = stats::snapshot();
    assert_eq!(after.slab_allocs - before.slab_allocs, 3);
    assert_eq!(
        after.slab_releases - before.slab_releases,
        after.slab_allocs - before.slab_allocs
    );
    assert_eq!(
        after.alloc_count - before.alloc_count,
        (2 * EFFECTIVE_BLOCKS + 2) as u64
    );
}
