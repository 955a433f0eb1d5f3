//! Fixed-width word types stored in arrays.

use std::fmt::{Debug, Display};

/// A fixed-width integer word: the element type of every array in this crate.
///
/// Implemented for `i32` ("int" arrays) and `i64` ("long" arrays). Words are stored
/// in native byte order, both on the heap and in mapped files.
pub trait Word:
    bytemuck::Pod + Ord + Default + Debug + Display + Send + Sync + 'static
{
    /// Size of one word in bytes.
    const SIZE: usize;

    /// Span (in records) below which binary search hands over to a linear scan.
    const LINEAR_SEARCH_CUTOFF: u64;

    /// `self + 1`, wrapping on overflow.
    fn wrapping_inc(self) -> Self;
}

impl Word for i32 {
    const SIZE: usize = 4;
    const LINEAR_SEARCH_CUTOFF: u64 = 64;

    #[inline]
    fn wrapping_inc(self) -> Self {
        self.wrapping_add(1)
    }
}

impl Word for i64 {
    const SIZE: usize = 8;
    const LINEAR_SEARCH_CUTOFF: u64 = 32;

    #[inline]
    fn wrapping_inc(self) -> Self {
        self.wrapping_add(1)
    }
}
