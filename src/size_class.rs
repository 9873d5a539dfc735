//! Block classes: powers of two from `2^BASE_CLASS` up, `NUM_CLASS` of
//! them. With the default configuration that is 8, 16, ..., 2048 bytes.

use crate::config::{BASE_CLASS, NUM_CLASS, PAGE_SIZE};

/// Block size of class `i`.
#[inline]
pub const fn block_size(i: usize) -> usize {
    1 << (BASE_CLASS + i)
}

/// Blocks carved from one slab of class `i`.
#[inline]
pub const fn blocks_per_slab(i: usize) -> usize {
    PAGE_SIZE / block_size(i)
}

/// Smallest class whose block holds `sz` bytes, or `None` past the largest
/// class. Callers route requests above half a page elsewhere before asking;
/// `sz = 0` maps to class 0.
#[inline]
pub fn class_for(sz: usize) -> Option<usize> {
    for i in 0..NUM_CLASS {
        if block_size(i) >= sz {
            return Some(i);
        }
    }
    None
}
