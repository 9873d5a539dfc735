//! Compile-time configuration.
//!
//! The raw constants are generated by `build.rs` from `pcmalloc.toml`
//! (override the file path with the `PCMALLOC_CONFIG` environment variable).

include!(concat!(env!("OUT_DIR"), "/config_gen.rs"));

/// Largest request served by the sub-page engine; anything bigger takes the
/// whole-page path.
pub const MAX_SUBPAGE: usize = PAGE_SIZE / 2;

/// Bytes of in-band metadata at a slab base (owning processor and class,
/// two `i32`s) and at a big-span base (sentinel and page count).
pub const HDR_BYTES: usize = 2 * core::mem::size_of::<i32>();

/// Value stored where a sub-page slab keeps its processor index, marking
/// the page as the start of a big span instead.
pub const BIG_SENTINEL: i32 = -1;
