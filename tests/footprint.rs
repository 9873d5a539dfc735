//! Working-set bound: heavy mixed-size churn across threads must not grow
//! the heap past what the live set can justify. Slab recycling and big-span
//! reuse are what keep the bound; a leak in either shows up as runaway
//! `hi - lo` growth.

use pcmalloc::{allocate, deallocate, heap_bounds, init};

#[test]
fn mixed_churn_stays_within_the_working_set_bound() {
    init().unwrap();

    let nthreads = 8;
    let ops_per_thread = 12_500; // 100k operations total
    let sizes: &[usize] = &[7, 120, 1000, 3000, 9000];
    let max_live_per_thread = 50;

    let handles: Vec<_> = (0..nthreads)
        .map(|tid| {
            std::thread::spawn(move || {
                let mut live: Vec<(*mut u8, usize)> = Vec::new();
                for i in 0..ops_per_thread {
                    let size = sizes[(tid + i) % sizes.len()];
                    let p = allocate(size);
                    assert!(!p.is_null(), "thread {tid} op {i} size {size}");
                    // Touch both ends so reuse is observable.
                    unsafe {
                        *p = tid as u8;
                        *p.add(size - 1) = i as u8;
                    }
                    live.push((p, size));

                    if live.len() >= max_live_per_thread {
                        let (old, _) = live.remove(0);
                        unsafe { deallocate(old) };
                    }
                }
                for (p, _) in live {
                    unsafe { deallocate(p) };
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let (lo, hi) = heap_bounds();
    let used = hi as usize - lo as usize;
    // Peak live set: 400 blocks of at most 3 pages each, about 5 MiB, plus
    // partially filled slabs per (processor, class) pair and descriptor
    // pages. 64 MiB leaves an order of magnitude of headroom while still
    // catching a recycling leak (unbounded churn would pass 250 MiB).
    assert!(
        used <= 64 * 1024 * 1024,
        "heap grew to {} bytes under bounded live set",
        used
    );
}
