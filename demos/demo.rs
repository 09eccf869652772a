use fbmalloc::{BLOCK_SIZE, alloc, free};
use std::time::Instant;

fn main() {
    println!("fbmalloc demo");
    println!("=============\n");

    // A block is BLOCK_SIZE writable bytes.
    let p = alloc();
    assert!(!p.is_null());
    unsafe { p.write_bytes(0xAB, BLOCK_SIZE) };
    println!("block:       {p:?} ({BLOCK_SIZE} bytes, slab-recovered on free)");
    unsafe { free(p) };

    // Batch fill and drain.
    let n = 100_000;
    let start = Instant::now();
    let mut blocks = Vec::with_capacity(n);
    for _ in 0..n {
        let p = alloc();
        assert!(!p.is_null());
        blocks.push(p);
    }
    for p in blocks.into_iter().rev() {
        unsafe { free(p) };
    }
    println!("fill+drain:  {n} blocks in {:?}", start.elapsed());

    // Steady state: paired alloc/free never leaves the fastbin.
    let start = Instant::now();
    for _ in 0..n {
        let p = alloc();
        unsafe { free(p) };
    }
    println!("steady:      {n} pairs in {:?}", start.elapsed());

    // Multi-threaded workload: every thread runs on its own cache.
    println!("\nMulti-threaded benchmark (8 threads, 100k pairs each):");
    let start = Instant::now();
    let handles: Vec<_> = (0..8)
        .map(|tid| {
            std::thread::spawn(move || {
                let mut live = Vec::with_capacity(128);
                for _ in 0..100_000u32 {
                    let p = alloc();
                    assert!(!p.is_null());
                    unsafe { *p = tid as u8 };
                    live.push(p);
                    if live.len() > 100 {
                        for p in live.drain(..50) {
                            unsafe { free(p) };
                        }
                    }
                }
                for p in live {
                    unsafe { free(p) };
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    println!("  completed in {:?}", start.elapsed());

    println!("\nDone.");
}
