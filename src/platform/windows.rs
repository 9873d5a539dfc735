//! Windows backing using VirtualAlloc reserve/commit.

use core::ffi::c_void;

const MEM_COMMIT: u32 = 0x1000;
const MEM_RESERVE: u32 = 0x2000;
const MEM_RELEASE: u32 = 0x8000;
const PAGE_READWRITE: u32 = 0x04;

#[repr(C)]
struct SystemInfo {
    processor_architecture: u16,
    reserved: u16,
    page_size: u32,
    minimum_application_address: *mut c_void,
    maximum_application_address: *mut c_void,
    active_processor_mask: usize,
    number_of_processors: u32,
    processor_type: u32,
    allocation_granularity: u32,
    processor_level: u16,
    processor_revision: u16,
}

unsafe extern "system" {
    #[link_name = "VirtualAlloc"]
    fn virtual_alloc(
        lp_address: *mut c_void,
        dw_size: usize,
        fl_allocation_type: u32,
        fl_protect: u32,
    ) -> *mut c_void;

    #[link_name = "VirtualFree"]
    fn virtual_free(lp_address: *mut c_void, dw_size: usize, dw_free_type: u32) -> i32;

    #[link_name = "GetSystemInfo"]
    fn get_system_info(lp_system_info: *mut SystemInfo);

    #[link_name = "GetCurrentProcessorNumber"]
    fn get_current_processor_number() -> u32;
}

pub unsafe fn region_reserve(capacity: usize) -> *mut u8 {
    // Reservations are aligned to the 64 KiB allocation granularity, which
    // covers any supported PAGE_SIZE.
    let ptr = unsafe {
        virtual_alloc(core::ptr::null_mut(), capacity, MEM_RESERVE, PAGE_READWRITE)
    };
    ptr as *mut u8
}

pub unsafe fn region_commit(ptr: *mut u8, len: usize) -> bool {
    let committed =
        unsafe { virtual_alloc(ptr as *mut c_void, len, MEM_COMMIT, PAGE_READWRITE) };
    !committed.is_null()
}

pub unsafe fn region_release(ptr: *mut u8, _capacity: usize) {
    // MEM_RELEASE requires dwSize = 0 (releases the whole reservation).
    unsafe { virtual_free(ptr as *mut c_void, 0, MEM_RELEASE) };
}

pub fn cpu_count() -> usize {
    let mut info = unsafe { core::mem::zeroed::<SystemInfo>() };
    unsafe { get_system_info(&mut info) };
    info.number_of_processors as usize
}

pub fn current_cpu() -> usize {
    unsafe { get_current_processor_number() as usize }
}
