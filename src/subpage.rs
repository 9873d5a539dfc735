//! Sub-page engine: segregated per-processor slab lists.
//!
//! State lives at the low end of the heap, laid out by the initializer: a
//! `nproc x NUM_CLASS` table of descriptor-list heads, then one
//! cache-line padded lock per processor. A slab is bound to exactly one
//! (processor, class) pair while populated; its base carries the pair as
//! two `i32`s so a free can classify any interior address in O(1).
//!
//! Block 0 of every slab overlaps that stamp: its first 8 bytes belong to
//! the metadata, so its payload starts 8 bytes in and its usable size is
//! the class size minus 8. The allocation walk accounts for this before
//! committing to a descriptor.

use crate::config::{BIG_SENTINEL, CACHELINE_SIZE, HDR_BYTES, NUM_CLASS, PAGE_SIZE};
use crate::heap::HeapRegion;
use crate::pageref::{FreeBlock, PageRef, RefPool};
use crate::platform;
use crate::size_class;
use crate::stats::STATS;
use crate::sync::{PaddedLock, SpinMutex};
use core::ptr;

/// Per-processor slab lists over heap-resident state.
pub struct SubpageHeap {
    /// `nproc x NUM_CLASS` descriptor-list heads, processor-major.
    table: *mut *mut PageRef,
    /// One padded lock per processor, directly after the table.
    locks: *const PaddedLock,
    nproc: usize,
}

// SAFETY: the table and lock array are only mutated under the relevant
// per-processor lock, and they live in heap-region memory that is never
// unmapped.
unsafe impl Send for SubpageHeap {}
unsafe impl Sync for SubpageHeap {}

impl SubpageHeap {
    /// Placeholder for statics; unusable until replaced via [`Self::layout`].
    pub const fn empty() -> Self {
        Self {
            table: ptr::null_mut(),
            locks: ptr::null(),
            nproc: 0,
        }
    }

    /// Bytes of heap the head table and lock array occupy for `nproc`
    /// processors.
    pub const fn footprint(nproc: usize) -> usize {
        nproc * NUM_CLASS * core::mem::size_of::<*mut PageRef>() + nproc * CACHELINE_SIZE
    }

    /// Build the head table and lock array over `region`.
    ///
    /// # Safety
    /// `region` must be exclusively owned, pointer-aligned, zero-filled,
    /// and at least [`Self::footprint`]`(nproc)` bytes.
    pub unsafe fn layout(region: *mut u8, nproc: usize) -> Self {
        let table = region as *mut *mut PageRef;
        let locks =
            unsafe { region.add(nproc * NUM_CLASS * core::mem::size_of::<*mut PageRef>()) }
                as *mut PaddedLock;
        for i in 0..nproc {
            unsafe { ptr::write(locks.add(i), PaddedLock::new()) };
        }
        Self {
            table,
            locks,
            nproc,
        }
    }

    /// Arena index for the calling thread. Not stable across calls; the
    /// per-processor lock is what guarantees correctness, not affinity.
    #[inline]
    pub fn processor_index(&self) -> usize {
        platform::current_cpu() % self.nproc
    }

    #[inline]
    fn lock(&self, p: usize) -> &PaddedLock {
        unsafe { &*self.locks.add(p) }
    }

    #[inline]
    fn head_slot(&self, p: usize, c: usize) -> *mut *mut PageRef {
        unsafe { self.table.add(p * NUM_CLASS + c) }
    }

    /// Serve `sz` bytes (at most half a page) from processor `p`'s arena.
    /// Returns null when the heap is exhausted.
    ///
    /// # Safety
    /// `p` must be below the processor count this heap was laid out for,
    /// and `heap`/`pool` must be the instances all other operations use.
    pub unsafe fn allocate_on(
        &self,
        p: usize,
        sz: usize,
        heap: &HeapRegion,
        pool: &SpinMutex<RefPool>,
    ) -> *mut u8 {
        let Some(c) = size_class::class_for(sz) else {
            return ptr::null_mut();
        };
        let block = size_class::block_size(c);

        let lock = self.lock(p);
        lock.lock();

        let mut rec = unsafe { *self.head_slot(p, c) };
        while !rec.is_null() {
            unsafe {
                if (*rec).num_free > 0 {
                    let off = (*rec).freelist as usize - (*rec).base as usize;
                    if off >= block {
                        break;
                    }
                    // Head is block 0; only block - HDR_BYTES bytes usable.
                    if block - HDR_BYTES >= sz {
                        break;
                    }
                    if (*rec).num_free > 1 {
                        // Bring a full-size block to the front and keep
                        // block 0 around for a smaller request.
                        let first = (*rec).freelist;
                        let second = (*first).next;
                        debug_assert!(!second.is_null());
                        (*first).next = (*second).next;
                        (*second).next = first;
                        (*rec).freelist = second;
                        break;
                    }
                    // Only block 0 left and the request does not fit.
                }
                rec = (*rec).next;
            }
        }

        if rec.is_null() {
            rec = unsafe { self.bind_slab(p, c, heap, pool) };
            if rec.is_null() {
                lock.unlock();
                return ptr::null_mut();
            }
        }

        let mem = unsafe {
            let head = (*rec).freelist;
            (*rec).freelist = (*head).next;
            (*rec).num_free -= 1;
            let off = head as usize - (*rec).base as usize;
            if off < block {
                // Block 0's payload starts past the stamp.
                (*rec).base.add(HDR_BYTES)
            } else {
                head as *mut u8
            }
        };
        lock.unlock();
        mem
    }

    /// Acquire a descriptor, give it a backing slab if it lacks one,
    /// rebuild the slab's free list for class `c`, front-insert the record
    /// on `head[p][c]`, and stamp the slab base. Caller holds processor
    /// `p`'s lock; the pool mutex nests inside it here.
    unsafe fn bind_slab(
        &self,
        p: usize,
        c: usize,
        heap: &HeapRegion,
        pool: &SpinMutex<RefPool>,
    ) -> *mut PageRef {
        let (rec, fresh) = match pool.with(|p| unsafe { p.acquire(heap) }) {
            Some(got) => got,
            None => return ptr::null_mut(),
        };

        unsafe {
            if fresh {
                let base = heap.extend(PAGE_SIZE);
                if base.is_null() {
                    // Strict cleanup: the record never got a slab, so it
                    // must not reach the reusable stack.
                    pool.with(|p| p.release_unbacked(rec));
                    return ptr::null_mut();
                }
                (*rec).base = base;
                STATS.slabs_bound.hit();
            } else {
                STATS.slabs_rebound.hit();
            }
            let base = (*rec).base;

            // Thread every block through its next-pointer prefix, ascending,
            // push-front: block 0 ends up at the tail of the list.
            (*rec).freelist = ptr::null_mut();
            (*rec).num_free = 0;
            let block = size_class::block_size(c);
            let mut off = 0;
            while off < PAGE_SIZE {
                let fb = base.add(off) as *mut FreeBlock;
                (*fb).next = (*rec).freelist;
                (*rec).freelist = fb;
                (*rec).num_free += 1;
                off += block;
            }

            (*rec).next = *self.head_slot(p, c);
            *self.head_slot(p, c) = rec;

            // Stamp ownership last; it overlays block 0's link, which is
            // the list tail and is never followed while num_free tracks it.
            ptr::write(base as *mut i32, p as i32);
            ptr::write((base as *mut i32).add(1), c as i32);
            rec
        }
    }

    /// Return `ptr` to its slab. False means the containing page opens with
    /// the big-span sentinel and the caller should hand the pointer to the
    /// big engine.
    ///
    /// # Safety
    /// `ptr` must be a live allocation from this allocator, and `pool` the
    /// instance every other operation uses.
    pub unsafe fn free(&self, ptr: *mut u8, pool: &SpinMutex<RefPool>) -> bool {
        let base = ((ptr as usize) & !(PAGE_SIZE - 1)) as *mut u8;
        let stamped_p = unsafe { ptr::read(base as *const i32) };
        if stamped_p == BIG_SENTINEL {
            return false;
        }
        let p = stamped_p as usize;
        let c = unsafe { ptr::read((base as *const i32).add(1)) } as usize;
        debug_assert!(p < self.nproc && c < NUM_CLASS);

        let lock = self.lock(p);
        lock.lock();

        let mut rec = unsafe { *self.head_slot(p, c) };
        let mut prior: *mut PageRef = ptr::null_mut();
        while !rec.is_null() {
            if unsafe { (*rec).base } == base {
                break;
            }
            prior = rec;
            rec = unsafe { (*rec).next };
        }
        if rec.is_null() {
            // Double free or foreign pointer; the contract leaves this
            // undefined, so drop it rather than corrupt a list.
            debug_assert!(false, "free of unknown sub-page address");
            lock.unlock();
            return true;
        }

        unsafe {
            let fb = ptr as *mut FreeBlock;
            (*fb).next = (*rec).freelist;
            (*rec).freelist = fb;
            (*rec).num_free += 1;

            if (*rec).num_free as usize == size_class::blocks_per_slab(c) {
                // Slab is empty: unlink, scrub, and park the record for
                // rebinding. The stamp goes with the scrub; it is rewritten
                // on the next bind.
                if prior.is_null() {
                    *self.head_slot(p, c) = (*rec).next;
                } else {
                    (*prior).next = (*rec).next;
                }
                ptr::write_bytes(base, 0, PAGE_SIZE);
                pool.with(|p| p.release(rec));
                STATS.slabs_recycled.hit();
            }
        }
        lock.unlock();
        true
    }
}
