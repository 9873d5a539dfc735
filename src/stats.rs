//! Allocation event counters.
//!
//! Each counter is a relaxed atomic behind the `stats` feature; without it
//! every [`Counter`] is zero-sized and the call sites compile away. The
//! allocator's own locks provide all ordering that matters for
//! correctness, so the counters are free to race a little.
//!
//! With the feature on, read everything at once with [`snapshot()`].
//! Individual loads are atomic but the snapshot as a whole is not globally
//! consistent.

#[cfg(feature = "stats")]
use core::sync::atomic::{AtomicU64, Ordering};

/// A relaxed event counter; a no-op unit without the `stats` feature.
pub(crate) struct Counter {
    #[cfg(feature = "stats")]
    value: AtomicU64,
}

impl Counter {
    pub const fn new() -> Self {
        Self {
            #[cfg(feature = "stats")]
            value: AtomicU64::new(0),
        }
    }

    /// Count one event.
    #[inline]
    pub fn hit(&self) {
        #[cfg(feature = "stats")]
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Count `n` units (bytes, usually).
    #[inline]
    pub fn add(&self, n: u64) {
        #[cfg(feature = "stats")]
        self.value.fetch_add(n, Ordering::Relaxed);
        #[cfg(not(feature = "stats"))]
        let _ = n;
    }

    #[cfg(feature = "stats")]
    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

pub(crate) struct Stats {
    // ---- Dispatch ----
    /// Calls to `allocate`.
    pub alloc_count: Counter,
    /// Calls to `deallocate` with a non-null pointer.
    pub dealloc_count: Counter,
    /// Sum of requested byte sizes.
    pub alloc_bytes: Counter,
    /// Requests routed to the sub-page engine.
    pub subpage_allocs: Counter,
    /// Requests routed to the big engine.
    pub big_allocs: Counter,

    // ---- Slab lifecycle ----
    /// Fresh slabs bound (backing page newly extended).
    pub slabs_bound: Counter,
    /// Retained slabs rebound to a new (processor, class).
    pub slabs_rebound: Counter,
    /// Slabs emptied, zeroed, and parked for reuse.
    pub slabs_recycled: Counter,
    /// Pages carved into descriptor records.
    pub ref_pages: Counter,

    // ---- Big list ----
    /// Exact-fit reuses of a freed span.
    pub big_reuse: Counter,
    /// Tail carves from an oversized free span.
    pub big_carves: Counter,

    // ---- Heap façade ----
    /// Successful heap extensions.
    pub heap_extends: Counter,
    /// Bytes obtained from heap extensions.
    pub heap_extend_bytes: Counter,
}

impl Stats {
    const fn new() -> Self {
        Self {
            alloc_count: Counter::new(),
            dealloc_count: Counter::new(),
            alloc_bytes: Counter::new(),
            subpage_allocs: Counter::new(),
            big_allocs: Counter::new(),
            slabs_bound: Counter::new(),
            slabs_rebound: Counter::new(),
            slabs_recycled: Counter::new(),
            ref_pages: Counter::new(),
            big_reuse: Counter::new(),
            big_carves: Counter::new(),
            heap_extends: Counter::new(),
            heap_extend_bytes: Counter::new(),
        }
    }
}

pub(crate) static STATS: Stats = Stats::new();

/// A point-in-time copy of all counters.
#[cfg(feature = "stats")]
#[derive(Clone, Copy, Debug, Default)]
pub struct Snapshot {
    pub alloc_count: u64,
    pub dealloc_count: u64,
    pub alloc_bytes: u64,
    pub subpage_allocs: u64,
    pub big_allocs: u64,
    pub slabs_bound: u64,
    pub slabs_rebound: u64,
    pub slabs_recycled: u64,
    pub ref_pages: u64,
    pub big_reuse: u64,
    pub big_carves: u64,
    pub heap_extends: u64,
    pub heap_extend_bytes: u64,
}

/// Load every counter.
#[cfg(feature = "stats")]
pub fn snapshot() -> Snapshot {
    let s = &STATS;
    Snapshot {
        alloc_count: s.alloc_count.get(),
        dealloc_count: s.dealloc_count.get(),
        alloc_bytes: s.alloc_bytes.get(),
        subpage_allocs: s.subpage_allocs.get(),
        big_allocs: s.big_allocs.get(),
        slabs_bound: s.slabs_bound.get(),
        slabs_rebound: s.slabs_rebound.get(),
        slabs_recycled: s.slabs_recycled.get(),
        ref_pages: s.ref_pages.get(),
        big_reuse: s.big_reuse.get(),
        big_carves: s.big_carves.get(),
        heap_extends: s.heap_extends.get(),
        heap_extend_bytes: s.heap_extend_bytes.get(),
    }
}
