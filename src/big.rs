//! Big-allocation engine: whole-page spans on one serialized free list.
//!
//! Requests above half a page are rounded to whole pages. A live span opens
//! with an 8-byte header (`-1` sentinel where a slab would keep its
//! processor index, then the page count); freed spans are threaded through
//! a record overlaid at the span base. No coalescing and no trimming:
//! large allocations are assumed rare, so first-fit reuse plus tail
//! carving is enough.

use crate::config::{BIG_SENTINEL, HDR_BYTES, PAGE_SIZE};
use crate::heap::HeapRegion;
use crate::stats::STATS;
use crate::sync::SpinMutex;
use core::ptr;

/// Free-span record overlaid at the base of a freed span.
#[repr(C)]
struct FreeSpan {
    num_pages: usize,
    next: *mut FreeSpan,
}

/// The global free list of big spans.
pub struct BigList {
    head: *mut FreeSpan,
}

// SAFETY: only touched through the enclosing SpinMutex; the spans live in
// heap-region memory that is never unmapped.
unsafe impl Send for BigList {}

impl BigList {
    pub const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
        }
    }

    /// Serve `sz` bytes (already inflated by the header) in whole pages.
    /// The list lock is dropped before asking the heap façade to grow.
    ///
    /// # Safety
    /// `heap` must be the instance every other operation uses.
    pub unsafe fn allocate(list: &SpinMutex<BigList>, sz: usize, heap: &HeapRegion) -> *mut u8 {
        let num_pages = sz.div_ceil(PAGE_SIZE);
        let Some(span_bytes) = num_pages.checked_mul(PAGE_SIZE) else {
            return ptr::null_mut();
        };

        {
            let mut big = list.lock();
            let mut curr = big.head;
            let mut prior: *mut FreeSpan = ptr::null_mut();
            while !curr.is_null() {
                unsafe {
                    if (*curr).num_pages > num_pages {
                        // Carve the tail off so the surviving record keeps
                        // its place in the list untouched.
                        (*curr).num_pages -= num_pages;
                        let tail = (curr as *mut u8).add((*curr).num_pages * PAGE_SIZE);
                        STATS.big_carves.hit();
                        return stamp(tail, num_pages);
                    }
                    if (*curr).num_pages == num_pages {
                        if prior.is_null() {
                            big.head = (*curr).next;
                        } else {
                            (*prior).next = (*curr).next;
                        }
                        STATS.big_reuse.hit();
                        return stamp(curr as *mut u8, num_pages);
                    }
                    prior = curr;
                    curr = (*curr).next;
                }
            }
        }

        // Nothing on the list fits; grow the heap with the lock released.
        let span = heap.extend(span_bytes);
        if span.is_null() {
            return ptr::null_mut();
        }
        unsafe { stamp(span, num_pages) }
    }

    /// Push the span holding `ptr` back on the free list.
    ///
    /// # Safety
    /// `ptr` must be a live big allocation from this allocator.
    pub unsafe fn free(list: &SpinMutex<BigList>, ptr: *mut u8) {
        unsafe {
            let base = ptr.sub(HDR_BYTES);
            debug_assert_eq!(ptr::read(base as *const i32), BIG_SENTINEL);
            let num_pages = ptr::read((base as *const i32).add(1)) as usize;

            let span = base as *mut FreeSpan;
            (*span).num_pages = num_pages;

            let mut big = list.lock();
            (*span).next = big.head;
            big.head = span;
        }
    }
}

impl Default for BigList {
    fn default() -> Self {
        Self::new()
    }
}

/// Write the live-span header and hand back the payload address.
unsafe fn stamp(base: *mut u8, num_pages: usize) -> *mut u8 {
    unsafe {
        ptr::write(base as *mut i32, BIG_SENTINEL);
        ptr::write((base as *mut i32).add(1), num_pages as i32);
        base.add(HDR_BYTES)
    }
}
