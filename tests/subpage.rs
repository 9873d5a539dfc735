//! Sub-page behavior through the public API: block distinctness, class
//! minimality, and steady-state reuse.

use pcmalloc::config::{NUM_CLASS, PAGE_SIZE};
use pcmalloc::{allocate, deallocate, init, platform, size_class};
use std::sync::Mutex;

// Tests here assert on process-wide state (heap bounds, page population),
// so they take turns.
static GATE: Mutex<()> = Mutex::new(());

fn page_of(ptr: *mut u8) -> usize {
    ptr as usize & !(PAGE_SIZE - 1)
}

fn stamp_of(ptr: *mut u8) -> (i32, i32) {
    let base = page_of(ptr) as *const i32;
    unsafe { (base.read(), base.add(1).read()) }
}

#[test]
fn eight_byte_blocks_are_distinct_and_densely_packed() {
    let _gate = GATE.lock().unwrap();
    init().unwrap();

    let mut ptrs = Vec::new();
    for _ in 0..513 {
        let p = allocate(8);
        assert!(!p.is_null());
        ptrs.push(p);
    }

    let mut sorted = ptrs.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 513, "duplicate block handed out");

    // Blocks are 8 bytes apart at minimum and every one sits in a slab
    // stamped with class 0 and a valid processor index.
    for w in sorted.windows(2) {
        assert!(w[1] as usize - w[0] as usize >= 8);
    }
    let nproc = platform::cpu_count();
    for &p in &ptrs {
        let (proc_idx, class_idx) = stamp_of(p);
        assert!((proc_idx as usize) < nproc);
        assert_eq!(class_idx, 0);
    }

    // A slab holds 512 blocks (511 usable for full 8-byte requests), so
    // 513 blocks need a second page per arena at most.
    let mut pages: Vec<usize> = ptrs.iter().map(|&p| page_of(p)).collect();
    pages.sort();
    pages.dedup();
    assert!(pages.len() <= nproc + 1, "blocks scattered over {} pages", pages.len());

    for p in ptrs {
        unsafe { deallocate(p) };
    }
}

#[test]
fn classes_are_minimal_for_their_requests() {
    let _gate = GATE.lock().unwrap();
    init().unwrap();

    let mut live = Vec::new();
    for &sz in &[1usize, 7, 8, 9, 100, 120, 1000, 1024, 1500, 2048] {
        let want = size_class::class_for(sz).unwrap();
        let p = allocate(sz);
        assert!(!p.is_null());
        let (_, class_idx) = stamp_of(p);
        assert_eq!(class_idx as usize, want, "size {sz}");
        assert!((class_idx as usize) < NUM_CLASS);
        live.push(p);
    }
    for p in live {
        unsafe { deallocate(p) };
    }
}

#[test]
fn mixed_sizes_occupy_disjoint_ranges() {
    let _gate = GATE.lock().unwrap();
    init().unwrap();

    let sizes = [1usize, 8, 24, 100, 300, 770, 2048, 9, 60];
    let mut live: Vec<(usize, usize)> = Vec::new();
    for round in 0..40 {
        let sz = sizes[round % sizes.len()];
        let p = allocate(sz);
        assert!(!p.is_null());
        live.push((p as usize, sz));
    }

    let mut ranges = live.clone();
    ranges.sort();
    for w in ranges.windows(2) {
        let (a, a_len) = w[0];
        let (b, _) = w[1];
        assert!(a + a_len.max(1) <= b, "ranges overlap: {a:#x}+{a_len} vs {b:#x}");
    }

    for (p, _) in live {
        unsafe { deallocate(p as *mut u8) };
    }
}

#[test]
fn full_release_returns_to_steady_state() {
    let _gate = GATE.lock().unwrap();
    init().unwrap();

    let batch = |sizes: &[usize]| {
        let ptrs: Vec<*mut u8> = sizes
            .iter()
            .map(|&s| {
                let p = allocate(s);
                assert!(!p.is_null());
                p
            })
            .collect();
        for p in ptrs {
            unsafe { deallocate(p) };
        }
    };

    let sizes: Vec<usize> = (0..200).map(|i| [8, 56, 200, 1000, 2048][i % 5]).collect();

    // Warm up so the arenas this thread lands on have slabs and descriptor
    // pages, then the same traffic must not keep growing the heap: emptied
    // slabs are recycled, not abandoned. A little slack covers the thread
    // migrating to a cold arena mid-batch.
    for _ in 0..4 {
        batch(&sizes);
    }
    let (_, hi_before) = pcmalloc::heap_bounds();
    for _ in 0..8 {
        batch(&sizes);
    }
    let (_, hi_after) = pcmalloc::heap_bounds();
    let growth = hi_after as usize - hi_before as usize;
    assert!(
        growth <= 16 * PAGE_SIZE,
        "steady-state traffic grew the heap by {growth} bytes"
    );
}
