//! Windowed views re-addressed from zero.

use std::path::Path;

use tessera_common::{Error, Result, result::verify_range};
use tessera_page_alloc::Advice;

use crate::{
    LogicalArray, context::SortingContext, query_buffer::QueryBuffer, search::SearchResult,
};

/// The words `start..end` of another array, addressed as `0..end - start`.
///
/// Every operation forwards to the underlying array with translated
/// positions, so range operations keep whatever fast path it has.
pub struct ShiftedArray<'a, A: LogicalArray + ?Sized> {
    array: &'a mut A,
    start: u64,
    end: u64,
}

impl<'a, A: LogicalArray + ?Sized> ShiftedArray<'a, A> {
    pub fn new(array: &'a mut A, start: u64, end: u64) -> Result<ShiftedArray<'a, A>> {
        verify_range(start, end, array.size())?;
        Ok(ShiftedArray { array, start, end })
    }

    /// Narrows the view to `start..end` of its own positions.
    pub fn range(self, start: u64, end: u64) -> Result<ShiftedArray<'a, A>> {
        verify_range(start, end, self.end - self.start)?;
        Ok(ShiftedArray {
            array: self.array,
            start: self.start + start,
            end: self.start + end,
        })
    }

    /// Position of the view's first word in the underlying array.
    pub fn offset(&self) -> u64 {
        self.start
    }

    #[inline]
    fn at(&self, pos: u64) -> u64 {
        if pos >= self.end - self.start {
            panic!("{}", Error::out_of_bounds(pos, self.end - self.start, 0, pos));
        }
        self.start + pos
    }

    #[inline]
    fn span(&self, start: u64, end: u64) -> (u64, u64) {
        debug_assert!(start <= end && end <= self.end - self.start);
        (self.start + start, self.start + end)
    }

    /// [`span`](Self::span) for the fallible operations, which must not reach
    /// past the window into the rest of the underlying array.
    fn checked_span(&self, start: u64, end: u64) -> Result<(u64, u64)> {
        verify_range(start, end, self.end - self.start)?;
        Ok((self.start + start, self.start + end))
    }
}

impl<A: LogicalArray + ?Sized> LogicalArray for ShiftedArray<'_, A> {
    type Word = A::Word;

    #[inline]
    fn size(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    fn get(&self, pos: u64) -> A::Word {
        self.array.get(self.at(pos))
    }

    #[inline]
    fn set(&mut self, pos: u64, value: A::Word) {
        let pos = self.at(pos);
        self.array.set(pos, value);
    }

    fn get_range(&self, start: u64, buffer: &mut [A::Word]) {
        debug_assert!(start + buffer.len() as u64 <= self.size());
        self.array.get_range(self.start + start, buffer)
    }

    fn set_range(&mut self, start: u64, values: &[A::Word]) {
        debug_assert!(start + values.len() as u64 <= self.size());
        self.array.set_range(self.start + start, values)
    }

    fn fill(&mut self, start: u64, end: u64, value: A::Word) {
        let (s, e) = self.span(start, end);
        self.array.fill(s, e, value)
    }

    fn for_each(&self, start: u64, end: u64, mut f: impl FnMut(u64, A::Word)) {
        let (s, e) = self.span(start, end);
        let shift = self.start;
        self.array.for_each(s, e, |pos, v| f(pos - shift, v))
    }

    fn fold<T>(&self, start: u64, end: u64, init: T, f: impl FnMut(T, A::Word) -> T) -> T {
        let (s, e) = self.span(start, end);
        self.array.fold(s, e, init, f)
    }

    fn try_fold<T>(
        &self,
        start: u64,
        end: u64,
        init: T,
        f: impl FnMut(T, A::Word) -> Result<T>,
    ) -> Result<T> {
        let (s, e) = self.checked_span(start, end)?;
        self.array.try_fold(s, e, init, f)
    }

    fn transform_each(
        &mut self,
        start: u64,
        end: u64,
        mut f: impl FnMut(u64, A::Word) -> A::Word,
    ) {
        let (s, e) = self.span(start, end);
        let shift = self.start;
        self.array.transform_each(s, e, |pos, v| f(pos - shift, v))
    }

    fn try_transform_each(
        &mut self,
        start: u64,
        end: u64,
        mut f: impl FnMut(u64, A::Word) -> Result<A::Word>,
    ) -> Result<()> {
        let (s, e) = self.checked_span(start, end)?;
        let shift = self.start;
        self.array.try_transform_each(s, e, |pos, v| f(pos - shift, v))
    }

    fn direct_range(&self, start: u64, end: u64) -> Option<&[A::Word]> {
        if end > self.size() {
            return None;
        }
        self.array.direct_range(self.start + start, self.start + end)
    }

    fn direct_range_mut(&mut self, start: u64, end: u64) -> Option<&mut [A::Word]> {
        if end > self.size() {
            return None;
        }
        self.array
            .direct_range_mut(self.start + start, self.start + end)
    }

    fn linear_search(&self, key: A::Word, from: u64, to: u64) -> SearchResult {
        let (s, e) = self.span(from, to);
        self.array
            .linear_search(key, s, e)
            .translate_back(self.start)
    }

    fn linear_search_n(
        &self,
        sz: usize,
        key: A::Word,
        from: u64,
        to: u64,
    ) -> Result<SearchResult> {
        let (s, e) = self.checked_span(from, to)?;
        Ok(self
            .array
            .linear_search_n(sz, key, s, e)?
            .translate_back(self.start))
    }

    fn binary_search(&self, key: A::Word, from: u64, to: u64) -> SearchResult {
        let (s, e) = self.span(from, to);
        self.array
            .binary_search(key, s, e)
            .translate_back(self.start)
    }

    fn binary_search_n(
        &self,
        sz: usize,
        key: A::Word,
        from: u64,
        to: u64,
    ) -> Result<SearchResult> {
        let (s, e) = self.checked_span(from, to)?;
        Ok(self
            .array
            .binary_search_n(sz, key, s, e)?
            .translate_back(self.start))
    }

    fn linear_search_upper_bound(&self, key: A::Word, from: u64, to: u64) -> u64 {
        let (s, e) = self.span(from, to);
        self.array.linear_search_upper_bound(key, s, e) - self.start
    }

    fn binary_search_upper_bound(&self, key: A::Word, from: u64, to: u64) -> u64 {
        let (s, e) = self.span(from, to);
        self.array.binary_search_upper_bound(key, s, e) - self.start
    }

    fn binary_search_upper_bound_n(
        &self,
        sz: usize,
        key: A::Word,
        from: u64,
        to: u64,
    ) -> Result<u64> {
        let (s, e) = self.checked_span(from, to)?;
        Ok(self.array.binary_search_upper_bound_n(sz, key, s, e)? - self.start)
    }

    fn retain(&self, buffer: &mut QueryBuffer<A::Word>, boundary: A::Word, start: u64, end: u64) {
        let (s, e) = self.span(start, end);
        self.array.retain(buffer, boundary, s, e)
    }

    fn retain_n(
        &self,
        buffer: &mut QueryBuffer<A::Word>,
        sz: usize,
        boundary: A::Word,
        start: u64,
        end: u64,
    ) -> Result<()> {
        let (s, e) = self.checked_span(start, end)?;
        self.array.retain_n(buffer, sz, boundary, s, e)
    }

    fn reject(&self, buffer: &mut QueryBuffer<A::Word>, boundary: A::Word, start: u64, end: u64) {
        let (s, e) = self.span(start, end);
        self.array.reject(buffer, boundary, s, e)
    }

    fn reject_n(
        &self,
        buffer: &mut QueryBuffer<A::Word>,
        sz: usize,
        boundary: A::Word,
        start: u64,
        end: u64,
    ) -> Result<()> {
        let (s, e) = self.checked_span(start, end)?;
        self.array.reject_n(buffer, sz, boundary, s, e)
    }

    fn is_sorted(&self, start: u64, end: u64) -> bool {
        let (s, e) = self.span(start, end);
        self.array.is_sorted(s, e)
    }

    fn is_sorted_n(&self, sz: usize, start: u64, end: u64) -> Result<bool> {
        let (s, e) = self.checked_span(start, end)?;
        self.array.is_sorted_n(sz, s, e)
    }

    fn insertion_sort(&mut self, start: u64, end: u64) {
        let (s, e) = self.span(start, end);
        self.array.insertion_sort(s, e)
    }

    fn insertion_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        let (s, e) = self.checked_span(start, end)?;
        self.array.insertion_sort_n(sz, s, e)
    }

    fn quick_sort(&mut self, start: u64, end: u64) {
        let (s, e) = self.span(start, end);
        self.array.quick_sort(s, e)
    }

    fn quick_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        let (s, e) = self.checked_span(start, end)?;
        self.array.quick_sort_n(sz, s, e)
    }

    fn merge_sort(&mut self, start: u64, end: u64) {
        let (s, e) = self.span(start, end);
        self.array.merge_sort(s, e)
    }

    fn merge_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        let (s, e) = self.checked_span(start, end)?;
        self.array.merge_sort_n(sz, s, e)
    }

    fn merge_sort_external(&mut self, start: u64, end: u64, temp_dir: &Path) -> Result<()> {
        let (s, e) = self.checked_span(start, end)?;
        self.array.merge_sort_external(s, e, temp_dir)
    }

    fn merge_sort_external_n(
        &mut self,
        sz: usize,
        start: u64,
        end: u64,
        temp_dir: &Path,
    ) -> Result<()> {
        let (s, e) = self.checked_span(start, end)?;
        self.array.merge_sort_external_n(sz, s, e, temp_dir)
    }

    fn sort_large_span(&mut self, ctx: &SortingContext, start: u64, end: u64) -> Result<()> {
        let (s, e) = self.checked_span(start, end)?;
        self.array.sort_large_span(ctx, s, e)
    }

    fn sort_large_span_n(
        &mut self,
        ctx: &SortingContext,
        sz: usize,
        start: u64,
        end: u64,
    ) -> Result<()> {
        let (s, e) = self.checked_span(start, end)?;
        self.array.sort_large_span_n(ctx, sz, s, e)
    }

    fn force(&self) -> Result<()> {
        self.array.force()
    }

    fn advise(&self, advice: Advice) -> Result<()> {
        self.array.advise_range(advice, self.start, self.end)
    }

    fn advise_range(&self, advice: Advice, start: u64, end: u64) -> Result<()> {
        let end = end.min(self.size());
        if start >= end {
            return Ok(());
        }
        self.array
            .advise_range(advice, self.start + start, self.start + end)
    }
}

#[cfg(test)]
mod tests {
    use super::ShiftedArray;
    use crate::{LogicalArray, LongArray, PowerOf2PartitioningScheme, QueryBuffer, SearchResult};

    fn array(values: &[i64]) -> LongArray {
        LongArray::from_words(PowerOf2PartitioningScheme::new(16).unwrap(), values).unwrap()
    }

    #[test]
    fn test_shifted_addressing() {
        let mut base = array(&(0..100).collect::<Vec<_>>());
        let mut view = ShiftedArray::new(&mut base, 30, 70).unwrap();
        assert_eq!(view.size(), 40);
        assert_eq!(view.get(0), 30);
        assert_eq!(view.offset(), 30);
        view.set(39, -1);
        assert!(view.try_get(40).is_err());

        let mut seen = Vec::new();
        view.for_each(0, 3, |pos, v| seen.push((pos, v)));
        assert_eq!(seen, vec![(0, 30), (1, 31), (2, 32)]);

        LogicalArray::fill(&mut view, 10, 12, 0);
        drop(view);
        assert_eq!(base.get(69), -1);
        assert_eq!(base.get(40), 0);
        assert_eq!(base.get(42), 42);
    }

    #[test]
    fn test_shifted_search_is_view_relative() {
        let mut base = array(&(0..100).map(|i| i * 2).collect::<Vec<_>>());
        let view = ShiftedArray::new(&mut base, 20, 80).unwrap();
        assert_eq!(LogicalArray::binary_search(&view, 60, 0, 60), SearchResult::Found(10));
        assert_eq!(LogicalArray::binary_search(&view, 61, 0, 60), SearchResult::NotFound(11));
        assert_eq!(view.binary_search_upper_bound(0, 0, 60), 0);
        assert_eq!(view.linear_search_upper_bound(1000, 0, 60), 60);

        let mut buffer = QueryBuffer::from_slice(&[0, 40, 41, 42, 200]);
        view.retain(&mut buffer, i64::MAX, 0, 60);
        buffer.finalize_filtering();
        assert_eq!(buffer.as_slice(), &[40, 42]);
    }

    #[test]
    fn test_shifted_sort_and_narrow() {
        let mut base = array(&(0..64).rev().collect::<Vec<_>>());
        let view = ShiftedArray::new(&mut base, 8, 56).unwrap();
        let mut inner = view.range(8, 40).unwrap();
        assert_eq!(inner.offset(), 16);
        inner.quick_sort(0, 32);
        assert!(LogicalArray::is_sorted(&inner, 0, 32));
        assert_eq!(inner.direct_range(0, 16).map(|w| w[0]), Some(16));
        drop(inner);
        assert_eq!(base.get(15), 48);
        assert_eq!(base.get(16), 16);
        assert_eq!(base.get(47), 47);
        assert_eq!(base.get(48), 15);
    }

    #[test]
    fn test_shifted_rejects_bad_window() {
        let mut base = array(&[1, 2, 3]);
        assert!(ShiftedArray::new(&mut base, 2, 4).is_err());
        let view = ShiftedArray::new(&mut base, 1, 3).unwrap();
        assert!(view.range(1, 3).is_err());
    }

    #[test]
    fn test_shifted_fallible_ops_stay_in_window() {
        let mut base = array(&(0..64).collect::<Vec<_>>());
        let mut view = ShiftedArray::new(&mut base, 10, 30).unwrap();

        assert!(view.quick_sort_n(2, 0, 22).is_err());
        assert!(view.binary_search_n(0, 12, 0, 20).is_err());
        assert!(view.try_fold(0, 21, 0i64, |acc, v| Ok(acc + v)).is_err());
        assert_eq!(
            view.binary_search_n(2, 16, 0, 20).unwrap(),
            SearchResult::Found(6)
        );
        assert_eq!(view.binary_search_upper_bound_n(2, 17, 0, 20).unwrap(), 8);

        let mut seen = Vec::new();
        let err = view.try_transform_each(4, 20, |pos, v| {
            seen.push(pos);
            if pos == 6 {
                Err(tessera_common::Error::invalid_arg("pos", "pos != 6"))
            } else {
                Ok(v + 100)
            }
        });
        assert!(err.is_err());
        assert_eq!(seen, vec![4, 5, 6]);
        drop(view);
        assert_eq!(base.get(13), 13);
        assert_eq!(base.get(14), 114);
        assert_eq!(base.get(15), 115);
        assert_eq!(base.get(16), 16);
    }
}
