//! Black-box engine behavior: uniqueness, fill-and-drain steady state, and
//! cross-thread block migration through the public interface.

use fbmalloc::{BLOCK_SIZE, alloc, free};
use std::collections::HashSet;
use std::sync::{Arc, Barrier, mpsc};

#[test]
fn fill_and_drain_steady_state() {
    let count = 100_000;

    // Fill: every address unique and writable.
    let mut blocks = Vec::with_capacity(count);
    let mut seen = HashSet::with_capacity(count);
    for i in 0..count {
        let ptr = alloc();
        assert!(!ptr.is_null(), "alloc failed at {i}");
        assert!(seen.insert(ptr as usize), "duplicate live address at {i}");
        unsafe { *ptr = (i & 0xFF) as u8 };
        blocks.push(ptr);
    }

    // Drain in reverse order.
    for ptr in blocks.into_iter().rev() {
        unsafe { free(ptr) };
    }

    // Steady state: paired alloc/free stays on the cached paths and keeps
    // handing out valid blocks.
    let mut last = std::ptr::null_mut();
    for _ in 0..100_000 {
        let ptr = alloc();
        assert!(!ptr.is_null());
        unsafe {
            *ptr = 0xEE;
            free(ptr);
        }
        last = ptr;
    }
    assert!(!last.is_null());
}

#[test]
fn concurrent_uniqueness() {
    let nthreads = 4;
    let per_thread = 50_000;

    // Workers hold their blocks live until the main thread has checked
    // global uniqueness, so no address can be legitimately reused while the
    // sets are compared.
    let barrier = Arc::new(Barrier::new(nthreads + 1));
    let (tx, rx) = mpsc::channel::<Vec<usize>>();

    let handles: Vec<_> = (0..nthreads)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            std::thread::spawn(move || {
                let mut addrs = Vec::with_capacity(per_thread);
                for _ in 0..per_thread {
                    let ptr = alloc();
                    assert!(!ptr.is_null());
                    addrs.push(ptr as usize);
                }
                tx.send(addrs.clone()).unwrap();
                barrier.wait(); // main checks uniqueness
                for addr in addrs {
                    unsafe { free(addr as *mut u8) };
                }
            })
        })
        .collect();
    drop(tx);

    let mut all = HashSet::with_capacity(nthreads * per_thread);
    for addrs in rx.iter().take(nthreads) {
        for addr in addrs {
            assert!(all.insert(addr), "duplicate live address across threads");
        }
    }
    barrier.wait();

    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn cross_thread_free_migrates_block() {
    // Thread A allocates, thread B frees, then B hands the same slot out
    // again from its own cache.
    let addr = alloc() as usize;
    assert_ne!(addr, 0);
    unsafe { (addr as *mut u8).write_bytes(0x77, BLOCK_SIZE) };

    std::thread::spawn(move || {
        let ptr = addr as *mut u8;
        for off in 0..BLOCK_SIZE {
            assert_eq!(unsafe { *ptr.add(off) }, 0x77);
        }
        unsafe { free(ptr) };

        // The freed block sits in this thread's fastbin now; the next
        // allocation here returns it.
        let reused = alloc();
        assert_eq!(reused as usize, addr);
        unsafe { free(reused) };
    })
    .join()
    .unwrap();
}

#[test]
fn blocks_do_not_overlap() {
    // Writable for BLOCK_SIZE bytes without disturbing any other live block.
    let count = 4096;
    let mut blocks = Vec::with_capacity(count);
    for i in 0..count {
        let ptr = alloc();
        assert!(!ptr.is_null());
        unsafe { ptr.write_bytes((i % 251) as u8, BLOCK_SIZE) };
        blocks.push(ptr);
    }
    for (i, &ptr) in blocks.iter().enumerate() {
        let expected = (i % 251) as u8;
        for off in 0..BLOCK_SIZE {
            assert_eq!(unsafe { *ptr.add(off) }, expected, "block {i} byte {off}");
        }
    }
    for ptr in blocks {
        unsafe { free(ptr) };
    }
}
