//! Large word arrays split into pages, for posting lists and other index data.
//!
//! A [`PagingArray`] presents a run of heap-allocated or memory-mapped
//! [`Page`]s as a single array of 32- or 64-bit words addressed by `u64`
//! position, with a [`PartitioningScheme`] mapping positions onto pages.
//! Everything that can be done to such an array lives on the [`LogicalArray`]
//! trait, which is also implemented for plain slices and for [`ShiftedArray`]
//! windows:
//!
//! - elemental and bulk access, fill, fold and transform
//! - linear and binary search over words and fixed-width records
//! - retain/reject filtering of a sorted [`QueryBuffer`] against a sorted range
//! - insertion, quick, merge and external (file-backed) sorts
//!
//! Two-array operations (deduplicating union, value merges) are in
//! [`merge`].

pub mod array;
pub mod context;
pub mod filter;
pub mod io;
pub mod merge;
pub mod page;
pub mod paging;
pub mod query_buffer;
pub mod scheme;
pub mod search;
pub mod shifted;
pub mod sort;
pub mod word;

pub use array::LogicalArray;
pub use context::{DEFAULT_MEMORY_SORT_LIMIT, SortingContext};
pub use merge::{
    count_distinct_elements, count_distinct_elements_n, merge_array_values, merge_arrays,
    merge_arrays_n, merge_arrays2,
};
pub use page::{MapMode, Page};
pub use paging::{IntArray, LongArray, PagingArray};
pub use query_buffer::QueryBuffer;
pub use scheme::{
    DEFAULT_PAGE_SIZE, PartitioningScheme, PowerOf2PartitioningScheme,
    SequentialPartitioningScheme,
};
pub use search::{SearchResult, decode_search_miss, encode_search_miss};
pub use shifted::ShiftedArray;
pub use tessera_page_alloc::Advice;
pub use word::Word;
