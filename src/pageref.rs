//! Slab descriptors and the descriptor pool.
//!
//! A `PageRef` is the out-of-band record for one slab. Descriptor storage
//! is itself carved from heap pages at cache-line stride, so neighboring
//! descriptors never share a line. The pool keeps two stacks: *fresh*
//! records whose backing slab has never been requested, and *reusable*
//! records whose slab was emptied, zeroed, and retained for rebinding.

use crate::config::{CACHELINE_SIZE, PAGE_SIZE};
use crate::heap::HeapRegion;
use crate::stats::STATS;
use core::ptr;

/// Intrusive free-list node living in the first bytes of every free block.
#[repr(C)]
pub struct FreeBlock {
    pub next: *mut FreeBlock,
}

/// Out-of-band record describing one slab.
#[repr(C)]
pub struct PageRef {
    /// Forward link in the owning (processor, class) list, or in a pool
    /// stack.
    pub next: *mut PageRef,
    /// Head of the intrusive free list of blocks inside the slab.
    pub freelist: *mut FreeBlock,
    /// Slab base address. Retained across release/acquire so the backing
    /// page is reused; null only while the record sits on the fresh stack.
    pub base: *mut u8,
    /// Blocks currently on `freelist`.
    pub num_free: u32,
}

// Records are carved at cache-line stride and must fit the slot.
const _: () = assert!(core::mem::size_of::<PageRef>() <= CACHELINE_SIZE);

/// The two descriptor stacks. Callers wrap the pool in a `SpinMutex`; both
/// stacks share that one lock.
pub struct RefPool {
    fresh: *mut PageRef,
    reusable: *mut PageRef,
}

// SAFETY: the pool is only touched through its enclosing SpinMutex, and the
// raw pointers target heap-region memory that is never unmapped.
unsafe impl Send for RefPool {}

impl RefPool {
    pub const fn new() -> Self {
        Self {
            fresh: ptr::null_mut(),
            reusable: ptr::null_mut(),
        }
    }

    /// Hand out a descriptor. The flag is true when the caller must obtain
    /// a backing slab; false means `base` still points at a zeroed slab
    /// kept from the record's previous binding. Returns `None` when a
    /// descriptor page cannot be obtained from the heap.
    ///
    /// # Safety
    /// Caller must hold the pool mutex (heap-façade locking nests inside
    /// it on the refill path).
    pub unsafe fn acquire(&mut self, heap: &HeapRegion) -> Option<(*mut PageRef, bool)> {
        if !self.reusable.is_null() {
            let rec = self.reusable;
            self.reusable = unsafe { (*rec).next };
            return Some((rec, false));
        }

        if self.fresh.is_null() {
            let page = heap.extend(PAGE_SIZE);
            if page.is_null() {
                return None;
            }
            STATS.ref_pages.hit();
            // The slot at the page base is the caller's; every later
            // cache-line slot goes onto the fresh stack. The page arrives
            // zeroed, so the new records start out clean.
            let mut off = CACHELINE_SIZE;
            while off < PAGE_SIZE {
                let rec = unsafe { page.add(off) } as *mut PageRef;
                unsafe { (*rec).next = self.fresh };
                self.fresh = rec;
                off += CACHELINE_SIZE;
            }
            return Some((page as *mut PageRef, true));
        }

        let rec = self.fresh;
        self.fresh = unsafe { (*rec).next };
        Some((rec, true))
    }

    /// Return an emptied descriptor whose slab has been zeroed; the slab
    /// stays bound to the record for its next life.
    ///
    /// # Safety
    /// Caller must hold the pool mutex; `rec` must be unlinked from its
    /// (processor, class) list.
    pub unsafe fn release(&mut self, rec: *mut PageRef) {
        unsafe {
            (*rec).next = self.reusable;
        }
        self.reusable = rec;
    }

    /// Return a descriptor that never obtained its backing slab (the heap
    /// refused the extension). It goes back on the fresh stack; the
    /// reusable stack is only for records with a retained slab.
    ///
    /// # Safety
    /// Caller must hold the pool mutex; `rec` must not be on any list.
    pub unsafe fn release_unbacked(&mut self, rec: *mut PageRef) {
        unsafe {
            (*rec).base = ptr::null_mut();
            (*rec).next = self.fresh;
        }
        self.fresh = rec;
    }
}

impl Default for RefPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    fn make_heap(pages: usize) -> &'static HeapRegion {
        let heap = Box::leak(Box::new(HeapRegion::new()));
        assert!(heap.init(pages * PAGE_SIZE));
        heap
    }

    #[test]
    fn one_page_carves_a_full_batch_of_records() {
        let heap = make_heap(8);
        let mut pool = RefPool::new();
        let per_page = PAGE_SIZE / CACHELINE_SIZE;

        let mut recs = Vec::new();
        unsafe {
            for _ in 0..per_page {
                let (rec, fresh) = pool.acquire(heap).unwrap();
                assert!(fresh);
                recs.push(rec);
            }
        }
        // All records so far came from a single extension.
        assert_eq!(heap.hi() as usize - heap.lo() as usize, PAGE_SIZE);

        // Every record is cache-line aligned within the page and distinct.
        for rec in &recs {
            assert_eq!((*rec as usize - heap.lo() as usize) % CACHELINE_SIZE, 0);
        }
        recs.sort();
        recs.dedup();
        assert_eq!(recs.len(), per_page);

        // One more record forces a second page.
        unsafe {
            let (_, fresh) = pool.acquire(heap).unwrap();
            assert!(fresh);
        }
        assert_eq!(heap.hi() as usize - heap.lo() as usize, 2 * PAGE_SIZE);
    }

    #[test]
    fn released_record_keeps_its_slab() {
        let heap = make_heap(8);
        let mut pool = RefPool::new();
        unsafe {
            let (rec, fresh) = pool.acquire(heap).unwrap();
            assert!(fresh);
            let slab = heap.extend(PAGE_SIZE);
            assert!(!slab.is_null());
            (*rec).base = slab;

            pool.release(rec);
            let (again, fresh) = pool.acquire(heap).unwrap();
            assert_eq!(again, rec);
            assert!(!fresh);
            assert_eq!((*again).base, slab);
        }
    }

    #[test]
    fn unbacked_record_goes_back_on_the_fresh_stack() {
        let heap = make_heap(8);
        let mut pool = RefPool::new();
        unsafe {
            let (rec, _) = pool.acquire(heap).unwrap();
            pool.release_unbacked(rec);
            // The same record comes back, still flagged as needing a slab.
            let (again, fresh) = pool.acquire(heap).unwrap();
            assert_eq!(again, rec);
            assert!(fresh);
            assert!((*again).base.is_null());
        }
    }
}
