//! Partitioning schemes: how a logical word position maps to a page and an offset.

use tessera_common::{Result, result::invalid_arg};

/// Default page size in words (2^27 words, 1 GiB of `i64` words).
pub const DEFAULT_PAGE_SIZE: u64 = 1 << 27;

/// Maps logical positions to `(page, offset)` pairs for a fixed page size.
///
/// Every page except the last holds exactly [`page_size`](Self::page_size) words.
/// For all positions, `page_base(page(pos)) + offset(pos) == pos`.
pub trait PartitioningScheme: Copy + std::fmt::Debug + Send + Sync + 'static {
    /// Number of words per page.
    fn page_size(&self) -> u64;

    /// Index of the page holding `pos`.
    fn page(&self, pos: u64) -> usize;

    /// Offset of `pos` within its page.
    fn offset(&self, pos: u64) -> usize;

    /// Logical position of the first word of `page`.
    #[inline]
    fn page_base(&self, page: usize) -> u64 {
        page as u64 * self.page_size()
    }

    /// End (exclusive) of the run that starts at `pos` and stays on one page,
    /// clipped to `range_end`.
    #[inline]
    fn page_end(&self, pos: u64, range_end: u64) -> u64 {
        range_end.min(self.page_base(self.page(pos) + 1))
    }

    /// In-page offset one past the last word of the non-empty range `start..end`.
    #[inline]
    fn end_offset(&self, start: u64, end: u64) -> usize {
        debug_assert!(end > start);
        self.offset(end - 1) + 1
    }

    /// Returns `true` if the non-empty range `start..end` lies within one page.
    ///
    /// Empty ranges report `false`.
    #[inline]
    fn is_same_page(&self, start: u64, end: u64) -> bool {
        end > start && self.page(start) == self.page(end - 1)
    }

    /// Number of pages needed to hold `size` words.
    #[inline]
    fn partitions(&self, size: u64) -> usize {
        size.div_ceil(self.page_size()) as usize
    }

    /// Length of `page` in an array of `size` words.
    #[inline]
    fn required_page_size(&self, page: usize, size: u64) -> usize {
        size.saturating_sub(self.page_base(page))
            .min(self.page_size()) as usize
    }
}

/// Partitions by plain division and remainder. Accepts any positive page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequentialPartitioningScheme {
    page_size: u64,
}

impl SequentialPartitioningScheme {
    pub fn new(page_size: u64) -> Result<Self> {
        if page_size == 0 || page_size > usize::MAX as u64 {
            invalid_arg("page_size", "0 < page_size <= usize::MAX")?;
        }
        Ok(SequentialPartitioningScheme { page_size })
    }
}

impl Default for SequentialPartitioningScheme {
    fn default() -> Self {
        SequentialPartitioningScheme {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PartitioningScheme for SequentialPartitioningScheme {
    #[inline]
    fn page_size(&self) -> u64 {
        self.page_size
    }

    #[inline]
    fn page(&self, pos: u64) -> usize {
        (pos / self.page_size) as usize
    }

    #[inline]
    fn offset(&self, pos: u64) -> usize {
        (pos % self.page_size) as usize
    }
}

/// Partitions by shift and mask. The page size must be a power of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerOf2PartitioningScheme {
    shift: u32,
    mask: u64,
}

impl PowerOf2PartitioningScheme {
    pub fn new(page_size: u64) -> Result<Self> {
        if !page_size.is_power_of_two() || page_size > usize::MAX as u64 {
            invalid_arg("page_size", "page_size is a power of two")?;
        }
        Ok(PowerOf2PartitioningScheme {
            shift: page_size.trailing_zeros(),
            mask: page_size - 1,
        })
    }
}

impl Default for PowerOf2PartitioningScheme {
    fn default() -> Self {
        PowerOf2PartitioningScheme {
            shift: DEFAULT_PAGE_SIZE.trailing_zeros(),
            mask: DEFAULT_PAGE_SIZE - 1,
        }
    }
}

impl PartitioningScheme for PowerOf2PartitioningScheme {
    #[inline]
    fn page_size(&self) -> u64 {
        1 << self.shift
    }

    #[inline]
    fn page(&self, pos: u64) -> usize {
        (pos >> self.shift) as usize
    }

    #[inline]
    fn offset(&self, pos: u64) -> usize {
        (pos & self.mask) as usize
    }

    #[inline]
    fn page_base(&self, page: usize) -> u64 {
        (page as u64) << self.shift
    }
}
