//! Heap-extension façade: one reserved region grown monotonically.
//!
//! Every byte the allocator hands out comes from a [`HeapRegion`], so
//! `lo()`/`hi()` bound all live allocations at any moment. Growth is
//! serialized by a single mutex; the bounds are readable lock-free.

use crate::platform;
use crate::stats::STATS;
use crate::sync::SpinMutex;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A monotonic heap region with published bounds.
///
/// Const-constructible so it can live in a static; [`HeapRegion::init`]
/// reserves the backing address space later, once.
pub struct HeapRegion {
    /// Region base address; 0 until `init` succeeds. Written once.
    base: AtomicUsize,
    /// Reservation size in bytes.
    capacity: AtomicUsize,
    /// Current break as an offset from `base`. Only grows.
    brk: SpinMutex<usize>,
    /// Mirror of `base + brk` for lock-free `hi()` reads.
    top: AtomicUsize,
}

impl HeapRegion {
    pub const fn new() -> Self {
        Self {
            base: AtomicUsize::new(0),
            capacity: AtomicUsize::new(0),
            brk: SpinMutex::new(0),
            top: AtomicUsize::new(0),
        }
    }

    /// Reserve `capacity` bytes of address space. Idempotent: a second call
    /// observes the existing reservation and reports success. Returns false
    /// only if the OS refuses the reservation.
    pub fn init(&self, capacity: usize) -> bool {
        let _brk = self.brk.lock();
        if self.base.load(Ordering::Acquire) != 0 {
            return true;
        }
        let raw = unsafe { platform::region_reserve(capacity) };
        if raw.is_null() {
            return false;
        }
        self.capacity.store(capacity, Ordering::Relaxed);
        self.top.store(raw as usize, Ordering::Release);
        self.base.store(raw as usize, Ordering::Release);
        true
    }

    /// Grow the region by `n_bytes` and return the new range's base, or
    /// null once the reservation is exhausted. The returned memory is
    /// zero-filled.
    pub fn extend(&self, n_bytes: usize) -> *mut u8 {
        let base = self.base.load(Ordering::Acquire);
        if base == 0 {
            return ptr::null_mut();
        }
        // Call sites grow in whole pages; slab-base rounding relies on it.
        debug_assert!(n_bytes % crate::config::PAGE_SIZE == 0);

        let mut brk = self.brk.lock();
        let new_brk = match brk.checked_add(n_bytes) {
            Some(n) if n <= self.capacity.load(Ordering::Relaxed) => n,
            _ => return ptr::null_mut(),
        };
        let at = (base + *brk) as *mut u8;
        if !unsafe { platform::region_commit(at, n_bytes) } {
            return ptr::null_mut();
        }
        *brk = new_brk;
        self.top.store(base + new_brk, Ordering::Release);

        STATS.heap_extends.hit();
        STATS.heap_extend_bytes.add(n_bytes as u64);
        at
    }

    /// Low bound of the region; stable after `init`.
    #[inline]
    pub fn lo(&self) -> *mut u8 {
        self.base.load(Ordering::Acquire) as *mut u8
    }

    /// High bound of the region; moves up with every successful `extend`.
    #[inline]
    pub fn hi(&self) -> *mut u8 {
        self.top.load(Ordering::Acquire) as *mut u8
    }
}

impl Default for HeapRegion {
    fn default() -> Self {
        Self::new()
    }
}
