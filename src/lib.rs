#![no_std]

//! pcmalloc: a per-processor segregated free-list allocator.
//!
//! Requests up to half a page are served from CPU-local slab lists keyed by
//! power-of-two size class; larger requests go to a serialized whole-page
//! free list. All backing memory comes from one monotonic heap region whose
//! bounds stay published for the life of the process, and frees classify
//! their pointer in O(1) from two integers stamped at the base of every
//! slab.
//!
//! # Usage
//!
//! ```ignore
//! pcmalloc::init().expect("heap reservation");
//! let p = pcmalloc::allocate(24);
//! unsafe { pcmalloc::deallocate(p) };
//! ```
//!
//! or register the [`PcMalloc`] handle as the global allocator:
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: pcmalloc::PcMalloc = pcmalloc::PcMalloc;
//! ```

#[cfg(test)]
extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod allocator;
pub mod big;
pub mod config;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod heap;
pub mod pageref;
pub mod platform;
pub mod size_class;
pub mod stats;
pub mod subpage;
pub mod sync;

pub use allocator::{InitError, PcMalloc, allocate, deallocate, heap_bounds, init};
pub use config::{PAGE_SHIFT, PAGE_SIZE};

// Panic handler for staticlib builds (no_std has no default panic handler).
// Only active when panic="abort" (i.e., the `fast` profile), not during
// normal checks.
#[cfg(all(feature = "ffi", not(test), not(feature = "std"), panic = "abort"))]
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    unsafe extern "C" {
        fn abort() -> !;
    }
    unsafe { abort() }
}
