//! Spin-based locking for use inside the allocator.
//!
//! `std::sync::Mutex` allocates, so the allocator carries its own
//! test-and-test-and-set lock. `PaddedLock` is the cache-line sized variant
//! used for the per-processor lock array, which lives in allocator-managed
//! heap memory rather than in a static.

use crate::config::CACHELINE_SIZE;
use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A test-and-test-and-set spinlock.
pub struct SpinLock {
    locked: AtomicBool,
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn lock(&self) {
        while self.locked.swap(true, Ordering::Acquire) {
            // Spin on a plain load so contended waiters don't bounce the
            // line between cores.
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }

    #[inline]
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

unsafe impl Send for SpinLock {}
unsafe impl Sync for SpinLock {}

/// A spinlock padded out to one cache line so adjacent array entries never
/// share a line. The per-processor lock array is built from these, written
/// in place over zero-filled heap pages (the all-zero pattern is a valid
/// unlocked lock).
#[repr(C)]
pub struct PaddedLock {
    lock: SpinLock,
    _pad: [u8; CACHELINE_SIZE - core::mem::size_of::<SpinLock>()],
}

const _: () = assert!(core::mem::size_of::<PaddedLock>() == CACHELINE_SIZE);

impl PaddedLock {
    pub const fn new() -> Self {
        Self {
            lock: SpinLock::new(),
            _pad: [0; CACHELINE_SIZE - core::mem::size_of::<SpinLock>()],
        }
    }

    #[inline]
    pub fn lock(&self) {
        self.lock.lock();
    }

    #[inline]
    pub fn unlock(&self) {
        self.lock.unlock();
    }
}

/// A value guarded by a [`SpinLock`]. Does not allocate and can sit in a
/// `static`.
pub struct SpinMutex<T> {
    flag: SpinLock,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for SpinMutex<T> {}
unsafe impl<T: Send> Sync for SpinMutex<T> {}

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            flag: SpinLock::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Spin until the lock is free, then hand out exclusive access that
    /// lasts until the returned [`Held`] is dropped.
    #[inline]
    pub fn lock(&self) -> Held<'_, T> {
        self.flag.lock();
        Held {
            flag: &self.flag,
            value: self.value.get(),
            _marker: PhantomData,
        }
    }

    /// Run `f` with the lock held, releasing it on the way out. Reads
    /// better than a guard binding when the critical section is a single
    /// call.
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut held = self.lock();
        f(&mut *held)
    }
}

/// Exclusive access to a [`SpinMutex`]'s value. Unlocks on drop.
pub struct Held<'a, T> {
    flag: &'a SpinLock,
    value: *mut T,
    _marker: PhantomData<&'a mut T>,
}

impl<T> Deref for Held<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.value }
    }
}

impl<T> DerefMut for Held<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.value }
    }
}

impl<T> Drop for Held<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.flag.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use std::sync::Arc;

    #[test]
    fn spinlock_lock_unlock() {
        let lock = SpinLock::new();
        lock.lock();
        assert!(!lock.try_lock());
        lock.unlock();
        assert!(lock.try_lock());
        lock.unlock();
    }

    #[test]
    fn padded_lock_is_one_cacheline() {
        assert_eq!(core::mem::size_of::<PaddedLock>(), CACHELINE_SIZE);
        let l = PaddedLock::new();
        l.lock();
        l.unlock();
    }

    #[test]
    fn held_guard_releases_on_drop() {
        let mutex = SpinMutex::new(7u64);
        {
            let mut held = mutex.lock();
            *held += 1;
        }
        assert_eq!(*mutex.lock(), 8);
        assert_eq!(mutex.with(|v| *v * 2), 16);
    }

    #[test]
    fn with_serializes_across_threads() {
        let mutex = Arc::new(SpinMutex::new(0u64));
        let threads = 8;
        let iterations = 10_000;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let m = Arc::clone(&mutex);
                std::thread::spawn(move || {
                    for _ in 0..iterations {
                        m.with(|v| *v += 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(mutex.with(|v| *v), threads * iterations);
    }
}
