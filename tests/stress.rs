//! Stress tests with fill-pattern corruption detection.
//!
//! Inspired by mimalloc's test-stress: allocate blocks, fill with a known
//! pattern, pass between threads, and verify the pattern before freeing.
//! Any corruption (use-after-free, double-free, overlapping blocks) will
//! cause a pattern mismatch and assertion failure.

use fbmalloc::{BLOCK_SIZE, alloc, free};

/// Fill a block with a deterministic pattern derived from its address.
fn fill_pattern(ptr: *mut u8) {
    let seed = ptr as usize;
    for i in 0..BLOCK_SIZE {
        unsafe {
            *ptr.add(i) = ((seed.wrapping_add(i).wrapping_mul(0x9E37_79B9)) & 0xFF) as u8;
        }
    }
}

/// Verify the fill pattern. Returns true if intact.
fn check_pattern(ptr: *mut u8) -> bool {
    let seed = ptr as usize;
    for i in 0..BLOCK_SIZE {
        let expected = ((seed.wrapping_add(i).wrapping_mul(0x9E37_79B9)) & 0xFF) as u8;
        if unsafe { *ptr.add(i) } != expected {
            return false;
        }
    }
    true
}

#[test]
fn stress_fill_pattern_single_thread() {
    let rounds = 200;
    let batch = 50;

    let mut live: Vec<*mut u8> = Vec::new();

    for round in 0..rounds {
        // Allocate a batch
        for _ in 0..batch {
            let ptr = alloc();
            assert!(!ptr.is_null(), "alloc failed at round {round}");
            fill_pattern(ptr);
            live.push(ptr);
        }

        // Verify all live allocations
        for &ptr in &live {
            assert!(check_pattern(ptr), "corruption detected at round {round}");
        }

        // Free half (interleaved to stress free-list ordering)
        let drain_count = live.len() / 2;
        for _ in 0..drain_count {
            let idx = (round * 7 + 3) % live.len();
            let ptr = live.swap_remove(idx);
            assert!(check_pattern(ptr), "corruption before free at round {round}");
            unsafe { free(ptr) };
        }
    }

    // Final cleanup
    for ptr in live {
        assert!(check_pattern(ptr));
        unsafe { free(ptr) };
    }
}

#[test]
fn stress_fill_pattern_cross_thread() {
    use std::sync::mpsc;

    let npairs = 4;
    let ops = 2000;

    let mut producers = Vec::new();
    let mut consumers = Vec::new();

    for pair_id in 0..npairs {
        // Send raw addresses; ownership transfers cleanly with the block.
        let (tx, rx) = mpsc::channel::<usize>();

        producers.push(std::thread::spawn(move || {
            for _ in 0..ops {
                let ptr = alloc();
                assert!(!ptr.is_null());
                fill_pattern(ptr);
                tx.send(ptr as usize).unwrap();
            }
        }));

        consumers.push(std::thread::spawn(move || {
            let mut count = 0usize;
            for addr in rx {
                let ptr = addr as *mut u8;
                assert!(
                    check_pattern(ptr),
                    "cross-thread corruption at pair {pair_id}, item {count}"
                );
                unsafe { free(ptr) };
                count += 1;
            }
            count
        }));
    }

    for h in producers {
        h.join().unwrap();
    }

    let total: usize = consumers.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, npairs * ops);
}

#[test]
fn stress_many_threads_concurrent() {
    // Many threads doing alloc+fill+verify+free simultaneously
    let nthreads = 8;
    let ops_per_thread = 20_000;

    let handles: Vec<_> = (0..nthreads)
        .map(|tid| {
            std::thread::spawn(move || {
                let mut live: Vec<*mut u8> = Vec::with_capacity(64);

                for i in 0..ops_per_thread {
                    let ptr = alloc();
                    assert!(!ptr.is_null());
                    fill_pattern(ptr);
                    live.push(ptr);

                    // Periodically verify and free some
                    if live.len() > 32 {
                        for _ in 0..16 {
                            let ptr = live.pop().unwrap();
                            assert!(check_pattern(ptr), "thread {tid} corruption at op {i}");
                            unsafe { free(ptr) };
                        }
                    }
                }

                for ptr in live {
                    assert!(check_pattern(ptr));
                    unsafe { free(ptr) };
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}
