//! Unix backing using mmap. The CPU queries are Linux syscalls; other
//! unixes fall back to a single-arena configuration.

use core::ffi::c_void;

const PROT_READ: i32 = 0x1;
const PROT_WRITE: i32 = 0x2;
const MAP_PRIVATE: i32 = 0x02;
const MAP_ANONYMOUS: i32 = 0x20;
const MAP_NORESERVE: i32 = 0x4000;
const MAP_FAILED: *mut c_void = !0usize as *mut c_void;

/// `_SC_NPROCESSORS_CONF` on Linux.
#[cfg(target_os = "linux")]
const _SC_NPROCESSORS_CONF: i32 = 83;

unsafe extern "C" {
    fn mmap(
        addr: *mut c_void,
        length: usize,
        prot: i32,
        flags: i32,
        fd: i32,
        offset: i64,
    ) -> *mut c_void;

    fn munmap(addr: *mut c_void, length: usize) -> i32;

    #[cfg(target_os = "linux")]
    fn sysconf(name: i32) -> isize;

    #[cfg(target_os = "linux")]
    fn sched_getcpu() -> i32;
}

pub unsafe fn region_reserve(capacity: usize) -> *mut u8 {
    // mmap only guarantees system-page alignment (4 KiB). If the configured
    // PAGE_SIZE is larger, over-map and trim so slab-base rounding stays
    // valid for every address in the region.
    let align = crate::config::PAGE_SIZE;

    let raw = unsafe {
        mmap(
            core::ptr::null_mut(),
            capacity + align,
            PROT_READ | PROT_WRITE,
            MAP_PRIVATE | MAP_ANONYMOUS | MAP_NORESERVE,
            -1,
            0,
        )
    };
    if raw == MAP_FAILED {
        return core::ptr::null_mut();
    }

    let raw_addr = raw as usize;
    let aligned_addr = (raw_addr + align - 1) & !(align - 1);

    let lead = aligned_addr - raw_addr;
    if lead > 0 {
        unsafe { munmap(raw_addr as *mut c_void, lead) };
    }
    let trail = (raw_addr + capacity + align) - (aligned_addr + capacity);
    if trail > 0 {
        unsafe { munmap((aligned_addr + capacity) as *mut c_void, trail) };
    }

    aligned_addr as *mut u8
}

pub unsafe fn region_commit(_ptr: *mut u8, _len: usize) -> bool {
    // The whole reservation is already mapped read-write; fresh pages fault
    // in zero-filled on first touch.
    true
}

pub unsafe fn region_release(ptr: *mut u8, capacity: usize) {
    unsafe { munmap(ptr as *mut c_void, capacity) };
}

#[cfg(target_os = "linux")]
pub fn cpu_count() -> usize {
    let n = unsafe { sysconf(_SC_NPROCESSORS_CONF) };
    if n <= 0 { 1 } else { n as usize }
}

#[cfg(not(target_os = "linux"))]
pub fn cpu_count() -> usize {
    1
}

#[cfg(target_os = "linux")]
pub fn current_cpu() -> usize {
    let cpu = unsafe { sched_getcpu() };
    if cpu < 0 { 0 } else { cpu as usize }
}

#[cfg(not(target_os = "linux"))]
pub fn current_cpu() -> usize {
    0
}
