//! The `LogicalArray` trait shared by slices, pages, paging arrays and views.

use std::path::Path;

use tessera_common::{Error, Result};
use tessera_page_alloc::Advice;

use crate::{
    context::SortingContext, filter, query_buffer::QueryBuffer, search, search::SearchResult,
    sort, word::Word,
};

/// An addressable sequence of words with positions in `0..size()`.
///
/// Implementors provide elemental access; every range operation has a default
/// built on it. Storage with contiguous backing overrides the range operations
/// to run directly on slices.
///
/// Positions and ranges are in words. Record-oriented (`_n`) operations view
/// the range as records of `sz` words keyed by their first word; they return
/// an error when the range is not inside the array, when `sz` is zero or when
/// the range length is not a multiple of `sz`. Search, filter and merge
/// operations require the range to be sorted by key.
///
/// # Panics
///
/// Elemental accessors panic on positions outside `0..size()`, as slice
/// indexing does; [`try_get`](Self::try_get) and [`try_set`](Self::try_set)
/// report [`IndexOutOfBounds`](tessera_common::ErrorKind::IndexOutOfBounds)
/// instead. Mutating operations panic on read-only storage, except those
/// returning `Result`, which report [`ReadOnly`](tessera_common::ErrorKind::ReadOnly).
pub trait LogicalArray {
    type Word: Word;

    fn size(&self) -> u64;

    fn get(&self, pos: u64) -> Self::Word;

    fn set(&mut self, pos: u64, value: Self::Word);

    fn try_get(&self, pos: u64) -> Result<Self::Word> {
        if pos < self.size() {
            Ok(self.get(pos))
        } else {
            Err(Error::out_of_bounds(pos, self.size(), 0, pos))
        }
    }

    fn try_set(&mut self, pos: u64, value: Self::Word) -> Result<()> {
        if pos < self.size() {
            self.set(pos, value);
            Ok(())
        } else {
            Err(Error::out_of_bounds(pos, self.size(), 0, pos))
        }
    }

    fn swap(&mut self, a: u64, b: u64) {
        let va = self.get(a);
        let vb = self.get(b);
        self.set(a, vb);
        self.set(b, va);
    }

    /// Swaps the `sz`-word records starting at `a` and `b`.
    fn swap_n(&mut self, sz: usize, a: u64, b: u64) {
        for i in 0..sz as u64 {
            self.swap(a + i, b + i);
        }
    }

    fn increment(&mut self, pos: u64) {
        let value = self.get(pos);
        self.set(pos, value.wrapping_inc());
    }

    /// Increments the word at `pos` and returns its previous value.
    fn get_and_increment(&mut self, pos: u64) -> Self::Word {
        let value = self.get(pos);
        self.set(pos, value.wrapping_inc());
        value
    }

    /// Copies `buffer.len()` words starting at `start` into `buffer`.
    fn get_range(&self, start: u64, buffer: &mut [Self::Word]) {
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = self.get(start + i as u64);
        }
    }

    /// Overwrites the words starting at `start` with `values`.
    fn set_range(&mut self, start: u64, values: &[Self::Word]) {
        for (i, &value) in values.iter().enumerate() {
            self.set(start + i as u64, value);
        }
    }

    fn fill(&mut self, start: u64, end: u64, value: Self::Word) {
        for pos in start..end {
            self.set(pos, value);
        }
    }

    fn for_each(&self, start: u64, end: u64, mut f: impl FnMut(u64, Self::Word)) {
        for pos in start..end {
            f(pos, self.get(pos));
        }
    }

    fn fold<T>(&self, start: u64, end: u64, init: T, mut f: impl FnMut(T, Self::Word) -> T) -> T {
        let mut acc = init;
        for pos in start..end {
            acc = f(acc, self.get(pos));
        }
        acc
    }

    /// [`fold`](Self::fold) with a fallible step; stops at the first error.
    fn try_fold<T>(
        &self,
        start: u64,
        end: u64,
        init: T,
        mut f: impl FnMut(T, Self::Word) -> Result<T>,
    ) -> Result<T> {
        let mut acc = init;
        for pos in start..end {
            acc = f(acc, self.get(pos))?;
        }
        Ok(acc)
    }

    /// Replaces every word in `start..end` with `f(pos, word)`.
    fn transform_each(
        &mut self,
        start: u64,
        end: u64,
        mut f: impl FnMut(u64, Self::Word) -> Self::Word,
    ) {
        for pos in start..end {
            let value = self.get(pos);
            self.set(pos, f(pos, value));
        }
    }

    /// [`transform_each`](Self::transform_each) with a fallible transform.
    ///
    /// Stops at the first error: words before the failing position keep their
    /// new values, the failing word and everything after it are left unchanged.
    fn try_transform_each(
        &mut self,
        start: u64,
        end: u64,
        mut f: impl FnMut(u64, Self::Word) -> Result<Self::Word>,
    ) -> Result<()> {
        for pos in start..end {
            let value = self.get(pos);
            self.set(pos, f(pos, value)?);
        }
        Ok(())
    }

    /// Contiguous view of `start..end`, when the storage has one.
    fn direct_range(&self, _start: u64, _end: u64) -> Option<&[Self::Word]> {
        None
    }

    fn direct_range_mut(&mut self, _start: u64, _end: u64) -> Option<&mut [Self::Word]> {
        None
    }

    fn linear_search(&self, key: Self::Word, from: u64, to: u64) -> SearchResult {
        search::linear_search(self, key, from, to)
    }

    fn linear_search_n(&self, sz: usize, key: Self::Word, from: u64, to: u64) -> Result<SearchResult> {
        search::linear_search_n(self, sz, key, from, to)
    }

    fn binary_search(&self, key: Self::Word, from: u64, to: u64) -> SearchResult {
        search::binary_search(self, key, from, to)
    }

    fn binary_search_n(&self, sz: usize, key: Self::Word, from: u64, to: u64) -> Result<SearchResult> {
        search::binary_search_n(self, sz, key, from, to)
    }

    fn linear_search_upper_bound(&self, key: Self::Word, from: u64, to: u64) -> u64 {
        search::linear_search_upper_bound(self, key, from, to)
    }

    fn binary_search_upper_bound(&self, key: Self::Word, from: u64, to: u64) -> u64 {
        search::binary_search_upper_bound(self, key, from, to)
    }

    fn binary_search_upper_bound_n(&self, sz: usize, key: Self::Word, from: u64, to: u64) -> Result<u64> {
        search::binary_search_upper_bound_n(self, sz, key, from, to)
    }

    /// Keeps the candidates of `buffer` (up to `boundary`) found in `start..end`.
    fn retain(
        &self,
        buffer: &mut QueryBuffer<Self::Word>,
        boundary: Self::Word,
        start: u64,
        end: u64,
    ) {
        filter::retain(self, buffer, boundary, start, end)
    }

    fn retain_n(
        &self,
        buffer: &mut QueryBuffer<Self::Word>,
        sz: usize,
        boundary: Self::Word,
        start: u64,
        end: u64,
    ) -> Result<()> {
        filter::retain_n(self, buffer, sz, boundary, start, end)
    }

    /// Drops the candidates of `buffer` (up to `boundary`) found in `start..end`.
    fn reject(
        &self,
        buffer: &mut QueryBuffer<Self::Word>,
        boundary: Self::Word,
        start: u64,
        end: u64,
    ) {
        filter::reject(self, buffer, boundary, start, end)
    }

    fn reject_n(
        &self,
        buffer: &mut QueryBuffer<Self::Word>,
        sz: usize,
        boundary: Self::Word,
        start: u64,
        end: u64,
    ) -> Result<()> {
        filter::reject_n(self, buffer, sz, boundary, start, end)
    }

    fn is_sorted(&self, start: u64, end: u64) -> bool {
        sort::is_sorted(self, start, end)
    }

    fn is_sorted_n(&self, sz: usize, start: u64, end: u64) -> Result<bool> {
        sort::is_sorted_n(self, sz, start, end)
    }

    fn insertion_sort(&mut self, start: u64, end: u64) {
        sort::insertion_sort(self, start, end)
    }

    fn insertion_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        sort::insertion_sort_n(self, sz, start, end)
    }

    fn quick_sort(&mut self, start: u64, end: u64) {
        sort::quick_sort(self, start, end)
    }

    fn quick_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        sort::quick_sort_n(self, sz, start, end)
    }

    fn merge_sort(&mut self, start: u64, end: u64) {
        sort::merge_sort(self, start, end)
    }

    fn merge_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        sort::merge_sort_n(self, sz, start, end)
    }

    fn merge_sort_external(&mut self, start: u64, end: u64, temp_dir: &Path) -> Result<()> {
        sort::merge_sort_external(self, start, end, temp_dir)
    }

    fn merge_sort_external_n(
        &mut self,
        sz: usize,
        start: u64,
        end: u64,
        temp_dir: &Path,
    ) -> Result<()> {
        sort::merge_sort_external_n(self, sz, start, end, temp_dir)
    }

    fn sort_large_span(&mut self, ctx: &SortingContext, start: u64, end: u64) -> Result<()> {
        sort::sort_large_span(self, ctx, start, end)
    }

    fn sort_large_span_n(
        &mut self,
        ctx: &SortingContext,
        sz: usize,
        start: u64,
        end: u64,
    ) -> Result<()> {
        sort::sort_large_span_n(self, ctx, sz, start, end)
    }

    /// Flushes modified words to the backing file, if any.
    fn force(&self) -> Result<()> {
        Ok(())
    }

    /// Access-pattern hint for the whole array.
    fn advise(&self, _advice: Advice) -> Result<()> {
        Ok(())
    }

    /// Access-pattern hint for `start..end`.
    fn advise_range(&self, _advice: Advice, _start: u64, _end: u64) -> Result<()> {
        Ok(())
    }
}

/// Slices are the contiguous case every page ultimately runs on.
impl<W: Word> LogicalArray for [W] {
    type Word = W;

    #[inline]
    fn size(&self) -> u64 {
        self.len() as u64
    }

    #[inline]
    fn get(&self, pos: u64) -> W {
        self[pos as usize]
    }

    #[inline]
    fn set(&mut self, pos: u64, value: W) {
        self[pos as usize] = value;
    }

    #[inline]
    fn swap(&mut self, a: u64, b: u64) {
        <[W]>::swap(self, a as usize, b as usize);
    }

    fn swap_n(&mut self, sz: usize, a: u64, b: u64) {
        let (a, b) = (a as usize, b as usize);
        if a == b {
            return;
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.split_at_mut(hi);
        head[lo..lo + sz].swap_with_slice(&mut tail[..sz]);
    }

    fn get_range(&self, start: u64, buffer: &mut [W]) {
        let start = start as usize;
        buffer.copy_from_slice(&self[start..start + buffer.len()]);
    }

    fn set_range(&mut self, start: u64, values: &[W]) {
        let start = start as usize;
        self[start..start + values.len()].copy_from_slice(values);
    }

    fn fill(&mut self, start: u64, end: u64, value: W) {
        <[W]>::fill(&mut self[start as usize..end as usize], value);
    }

    fn for_each(&self, start: u64, end: u64, mut f: impl FnMut(u64, W)) {
        for (i, &value) in self[start as usize..end as usize].iter().enumerate() {
            f(start + i as u64, value);
        }
    }

    fn fold<T>(&self, start: u64, end: u64, init: T, mut f: impl FnMut(T, W) -> T) -> T {
        self[start as usize..end as usize]
            .iter()
            .fold(init, |acc, &value| f(acc, value))
    }

    fn try_fold<T>(
        &self,
        start: u64,
        end: u64,
        init: T,
        mut f: impl FnMut(T, W) -> Result<T>,
    ) -> Result<T> {
        self[start as usize..end as usize]
            .iter()
            .try_fold(init, |acc, &value| f(acc, value))
    }

    fn transform_each(&mut self, start: u64, end: u64, mut f: impl FnMut(u64, W) -> W) {
        for (i, slot) in self[start as usize..end as usize].iter_mut().enumerate() {
            *slot = f(start + i as u64, *slot);
        }
    }

    fn try_transform_each(
        &mut self,
        start: u64,
        end: u64,
        mut f: impl FnMut(u64, W) -> Result<W>,
    ) -> Result<()> {
        for (i, slot) in self[start as usize..end as usize].iter_mut().enumerate() {
            *slot = f(start + i as u64, *slot)?;
        }
        Ok(())
    }

    fn direct_range(&self, start: u64, end: u64) -> Option<&[W]> {
        self.get(start as usize..end as usize)
    }

    fn direct_range_mut(&mut self, start: u64, end: u64) -> Option<&mut [W]> {
        self.get_mut(start as usize..end as usize)
    }
}
