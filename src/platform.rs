//! OS abstraction: address-space reservation for the heap region, and the
//! CPU queries the per-processor engine is built on.
//!
//! The allocator grows a single monotonic region, so the platform layer
//! only has to reserve it once (`region_reserve`), make extended ranges
//! usable where the OS distinguishes reserve from commit (`region_commit`),
//! and answer `cpu_count`/`current_cpu`.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix as imp;
    } else if #[cfg(windows)] {
        mod windows;
        use windows as imp;
    } else {
        compile_error!("pcmalloc supports unix and windows targets");
    }
}

/// Reserve `capacity` bytes of address space aligned to the allocator page
/// size. Returns null on failure. Reserved memory consumes no physical
/// pages until touched (unix) or committed (windows).
///
/// # Safety
/// Caller owns the returned range and must only release it through
/// [`region_release`] with the same `capacity`.
#[inline]
pub unsafe fn region_reserve(capacity: usize) -> *mut u8 {
    unsafe { imp::region_reserve(capacity) }
}

/// Make `[ptr, ptr + len)` within a reservation readable and writable,
/// zero-filled. Returns false if the OS refuses.
///
/// # Safety
/// The range must lie inside a live [`region_reserve`] reservation.
#[inline]
pub unsafe fn region_commit(ptr: *mut u8, len: usize) -> bool {
    unsafe { imp::region_commit(ptr, len) }
}

/// Release a reservation created by [`region_reserve`].
///
/// # Safety
/// `ptr`/`capacity` must match the original reservation, and no live
/// allocator state may point into it.
#[inline]
pub unsafe fn region_release(ptr: *mut u8, capacity: usize) {
    unsafe { imp::region_release(ptr, capacity) }
}

/// Number of processors configured on this machine. Stable for the
/// process's lifetime; at least 1.
#[inline]
pub fn cpu_count() -> usize {
    imp::cpu_count().max(1)
}

/// The CPU the calling thread is currently running on. May change between
/// consecutive calls; callers only use it to pick an arena index.
#[inline]
pub fn current_cpu() -> usize {
    imp::current_cpu()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;

    #[test]
    fn reserve_commit_write_release() {
        unsafe {
            let cap = 16 * PAGE_SIZE;
            let ptr = region_reserve(cap);
            assert!(!ptr.is_null());
            assert_eq!(ptr as usize % PAGE_SIZE, 0);

            assert!(region_commit(ptr, 2 * PAGE_SIZE));
            // Committed memory must be zero-filled.
            for i in 0..2 * PAGE_SIZE {
                assert_eq!(*ptr.add(i), 0);
            }
            *ptr = 0xA5;
            *ptr.add(2 * PAGE_SIZE - 1) = 0x5A;
            assert_eq!(*ptr, 0xA5);
            assert_eq!(*ptr.add(2 * PAGE_SIZE - 1), 0x5A);

            region_release(ptr, cap);
        }
    }

    #[test]
    fn cpu_queries_are_sane() {
        let n = cpu_count();
        assert!(n >= 1);
        assert!(current_cpu() < 4096); // arbitrary but catches garbage ids
    }
}
