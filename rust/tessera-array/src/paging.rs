//! Arrays larger than one page, addressed through a partitioning scheme.

use std::{
    fs::{File, OpenOptions},
    io::BufWriter,
    io::Write,
    path::Path,
};

use tessera_common::{
    Error, Result,
    result::{invalid_arg, verify_range},
};
use tessera_page_alloc::Advice;

use crate::{
    LogicalArray,
    context::SortingContext,
    io::{read_words_at, write_words},
    page::{MapMode, Page},
    query_buffer::QueryBuffer,
    scheme::{PartitioningScheme, PowerOf2PartitioningScheme},
    search::{self, SearchResult},
    sort,
    word::Word,
};

/// One logical array over an ordered, fixed list of pages.
///
/// Range operations confined to a single page run directly on that page's
/// words; ranges spanning pages fall back to element-wise access through the
/// scheme, or are split at page boundaries where the operation allows it.
pub struct PagingArray<W: Word, S: PartitioningScheme = PowerOf2PartitioningScheme> {
    scheme: S,
    pages: Vec<Page<W>>,
    size: u64,
}

/// Array of 64-bit words.
pub type LongArray<S = PowerOf2PartitioningScheme> = PagingArray<i64, S>;

/// Array of 32-bit words.
pub type IntArray<S = PowerOf2PartitioningScheme> = PagingArray<i32, S>;

impl<W: Word> PagingArray<W> {
    /// Zeroed heap array using the default partitioning scheme.
    pub fn on_heap(size: u64) -> Result<Self> {
        Self::new_on_heap(PowerOf2PartitioningScheme::default(), size)
    }
}

impl<W: Word, S: PartitioningScheme> PagingArray<W, S> {
    /// Zeroed heap array of `size` words.
    pub fn new_on_heap(scheme: S, size: u64) -> Result<Self> {
        let pages = (0..scheme.partitions(size))
            .map(|i| Page::on_heap(scheme.required_page_size(i, size)))
            .collect::<Result<Vec<_>>>()?;
        Ok(PagingArray {
            scheme,
            pages,
            size,
        })
    }

    /// Heap array initialized with a copy of `values`.
    pub fn from_words(scheme: S, values: &[W]) -> Result<Self> {
        let mut array = Self::new_on_heap(scheme, values.len() as u64)?;
        array.set_range(0, values);
        Ok(array)
    }

    /// Maps a whole file read-only; its size must be a multiple of the word size.
    pub fn map_file_read_only(scheme: S, path: &Path) -> Result<Self> {
        Self::map_whole_file(scheme, path, MapMode::ReadOnly)
    }

    /// Maps a whole existing file read-write.
    pub fn map_file_read_write(scheme: S, path: &Path) -> Result<Self> {
        Self::map_whole_file(scheme, path, MapMode::ReadWrite)
    }

    /// Maps the first `size` words of `path` read-write, creating the file or
    /// growing it (zero-filled) when it is shorter.
    pub fn map_file_read_write_with_size(scheme: S, path: &Path, size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        Self::map_file(scheme, &file, path, 0, size, MapMode::ReadWrite)
    }

    /// Maps `size` words of `path` starting at word `word_offset`.
    ///
    /// A read-write mapping grows the file when it is too short; a read-only
    /// mapping fails instead.
    pub fn map_file_range(
        scheme: S,
        path: &Path,
        word_offset: u64,
        size: u64,
        mode: MapMode,
    ) -> Result<Self> {
        let file = open(path, mode)?;
        Self::map_file(scheme, &file, path, word_offset, size, mode)
    }

    fn map_whole_file(scheme: S, path: &Path, mode: MapMode) -> Result<Self> {
        let file = open(path, mode)?;
        let bytes = file_len(&file, path)?;
        if bytes % W::SIZE as u64 != 0 {
            invalid_arg("path", "file size is a multiple of the word size")?;
        }
        Self::map_file(scheme, &file, path, 0, bytes / W::SIZE as u64, mode)
    }

    fn map_file(
        scheme: S,
        file: &File,
        path: &Path,
        word_offset: u64,
        size: u64,
        mode: MapMode,
    ) -> Result<Self> {
        let required = word_offset
            .checked_add(size)
            .and_then(|words| words.checked_mul(W::SIZE as u64))
            .ok_or_else(|| Error::invalid_arg("size", "mapped range overflows u64"))?;
        let available = file_len(file, path)?;
        if available < required {
            if !mode.is_writable() {
                return Err(Error::invalid_arg(
                    "size",
                    format!("{} is {available} bytes, {required} required", path.display()),
                ));
            }
            file.set_len(required)
                .map_err(|e| Error::io(path.display().to_string(), e))?;
        }

        log::debug!(
            "mapping {size} words of {} at word offset {word_offset} ({mode:?})",
            path.display()
        );
        let pages = (0..scheme.partitions(size))
            .map(|i| {
                Page::map(
                    file,
                    word_offset + scheme.page_base(i),
                    scheme.required_page_size(i, size),
                    mode,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PagingArray {
            scheme,
            pages,
            size,
        })
    }

    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    pub fn pages(&self) -> &[Page<W>] {
        &self.pages
    }

    pub fn is_writable(&self) -> bool {
        self.pages.iter().all(Page::is_writable)
    }

    /// Writes every word, in order, to a new or truncated file at `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let io_err = |e| Error::io(path.display().to_string(), e);
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        for page in &self.pages {
            write_words(&mut writer, page.words()).map_err(io_err)?;
        }
        writer.flush().map_err(io_err)?;
        writer.get_ref().sync_all().map_err(io_err)?;
        Ok(())
    }

    /// Reads `end - start` words from `file`, starting at word `source_start`,
    /// into `start..end`.
    pub fn transfer_from(&mut self, file: &File, source_start: u64, start: u64, end: u64) -> Result<()> {
        verify_range(start, end, self.size)?;
        for range in self.page_ranges(start, end) {
            let words = &mut self.pages[range.page].words_mut()?
                [range.start as usize..range.end as usize];
            read_words_at(file, source_start + (range.logical - start), words)
                .map_err(|e| Error::io("transfer from file", e))?;
        }
        Ok(())
    }

    /// Page-local pieces of `start..end`.
    fn page_ranges(&self, start: u64, end: u64) -> PageRanges<S> {
        PageRanges {
            scheme: self.scheme,
            pos: start,
            end,
        }
    }

    /// `(page, start, end)` when `start..end` is non-empty, in bounds and on
    /// one page.
    #[inline]
    fn single_page(&self, start: u64, end: u64) -> Option<(usize, u64, u64)> {
        if end <= self.size && self.scheme.is_same_page(start, end) {
            Some((
                self.scheme.page(start),
                self.scheme.offset(start) as u64,
                self.scheme.end_offset(start, end) as u64,
            ))
        } else {
            None
        }
    }

    /// Fails with `ReadOnly` when any page overlapping `start..end` is read-only.
    fn check_writable(&self, start: u64, end: u64) -> Result<()> {
        let read_only = self
            .page_ranges(start, end.min(self.size))
            .any(|range| !self.pages[range.page].is_writable());
        if read_only {
            return Err(Error::read_only(format!("range {start}..{end}")));
        }
        Ok(())
    }

    #[inline]
    fn base(&self, page: usize) -> u64 {
        self.scheme.page_base(page)
    }

    #[cold]
    fn out_of_bounds(&self, pos: u64) -> Error {
        Error::out_of_bounds(
            pos,
            self.size,
            self.scheme.page(pos),
            self.scheme.offset(pos) as u64,
        )
    }

    /// Retain/reject one page at a time. Every page but the last is bounded by
    /// its own last key, so each candidate is decided against the page that
    /// could hold it.
    fn filter_by_page(
        &self,
        buffer: &mut QueryBuffer<W>,
        boundary: W,
        start: u64,
        end: u64,
        keep_present: bool,
    ) {
        let mut ranges = self.page_ranges(start, end).peekable();
        while let Some(range) = ranges.next() {
            if !buffer.has_more() {
                break;
            }
            let page = &self.pages[range.page];
            let page_boundary = if ranges.peek().is_some() {
                boundary.min(page.get(range.end - 1))
            } else {
                boundary
            };
            if keep_present {
                page.retain(buffer, page_boundary, range.start, range.end);
            } else {
                page.reject(buffer, page_boundary, range.start, range.end);
            }
        }
    }
}

fn open(path: &Path, mode: MapMode) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(mode.is_writable())
        .open(path)
        .map_err(|e| Error::io(path.display().to_string(), e))
}

fn file_len(file: &File, path: &Path) -> Result<u64> {
    Ok(file
        .metadata()
        .map_err(|e| Error::io(path.display().to_string(), e))?
        .len())
}

/// Piece of a logical range that lies on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageRange {
    page: usize,
    /// Page-local start.
    start: u64,
    /// Page-local end (exclusive).
    end: u64,
    /// Logical position of `start`.
    logical: u64,
}

struct PageRanges<S> {
    scheme: S,
    pos: u64,
    end: u64,
}

impl<S: PartitioningScheme> Iterator for PageRanges<S> {
    type Item = PageRange;

    fn next(&mut self) -> Option<PageRange> {
        if self.pos >= self.end {
            return None;
        }
        let page_end = self.scheme.page_end(self.pos, self.end);
        let range = PageRange {
            page: self.scheme.page(self.pos),
            start: self.scheme.offset(self.pos) as u64,
            end: self.scheme.end_offset(self.pos, page_end) as u64,
            logical: self.pos,
        };
        self.pos = page_end;
        Some(range)
    }
}

impl<W: Word, S: PartitioningScheme> LogicalArray for PagingArray<W, S> {
    type Word = W;

    #[inline]
    fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    fn get(&self, pos: u64) -> W {
        if pos >= self.size {
            panic!("{}", self.out_of_bounds(pos));
        }
        self.pages[self.scheme.page(pos)].get(self.scheme.offset(pos) as u64)
    }

    #[inline]
    fn set(&mut self, pos: u64, value: W) {
        if pos >= self.size {
            panic!("{}", self.out_of_bounds(pos));
        }
        let page = self.scheme.page(pos);
        let offset = self.scheme.offset(pos) as u64;
        self.pages[page].set(offset, value);
    }

    fn try_get(&self, pos: u64) -> Result<W> {
        if pos < self.size {
            Ok(self.get(pos))
        } else {
            Err(self.out_of_bounds(pos))
        }
    }

    fn try_set(&mut self, pos: u64, value: W) -> Result<()> {
        if pos >= self.size {
            return Err(self.out_of_bounds(pos));
        }
        let page = self.scheme.page(pos);
        let offset = self.scheme.offset(pos);
        self.pages[page].words_mut()?[offset] = value;
        Ok(())
    }

    fn get_range(&self, start: u64, buffer: &mut [W]) {
        let end = start + buffer.len() as u64;
        for range in self.page_ranges(start, end) {
            let at = (range.logical - start) as usize;
            let len = (range.end - range.start) as usize;
            self.pages[range.page].get_range(range.start, &mut buffer[at..at + len]);
        }
    }

    fn set_range(&mut self, start: u64, values: &[W]) {
        let end = start + values.len() as u64;
        for range in self.page_ranges(start, end) {
            let at = (range.logical - start) as usize;
            let len = (range.end - range.start) as usize;
            self.pages[range.page].set_range(range.start, &values[at..at + len]);
        }
    }

    fn fill(&mut self, start: u64, end: u64, value: W) {
        for range in self.page_ranges(start, end) {
            LogicalArray::fill(&mut self.pages[range.page], range.start, range.end, value);
        }
    }

    fn for_each(&self, start: u64, end: u64, mut f: impl FnMut(u64, W)) {
        for range in self.page_ranges(start, end) {
            let shift = range.logical - range.start;
            self.pages[range.page].for_each(range.start, range.end, |pos, v| f(pos + shift, v));
        }
    }

    fn fold<T>(&self, start: u64, end: u64, init: T, mut f: impl FnMut(T, W) -> T) -> T {
        let mut acc = init;
        for range in self.page_ranges(start, end) {
            acc = self.pages[range.page].fold(range.start, range.end, acc, &mut f);
        }
        acc
    }

    fn try_fold<T>(
        &self,
        start: u64,
        end: u64,
        init: T,
        mut f: impl FnMut(T, W) -> Result<T>,
    ) -> Result<T> {
        let mut acc = init;
        for range in self.page_ranges(start, end) {
            acc = self.pages[range.page].try_fold(range.start, range.end, acc, &mut f)?;
        }
        Ok(acc)
    }

    fn transform_each(&mut self, start: u64, end: u64, mut f: impl FnMut(u64, W) -> W) {
        for range in self.page_ranges(start, end) {
            let shift = range.logical - range.start;
            self.pages[range.page]
                .transform_each(range.start, range.end, |pos, v| f(pos + shift, v));
        }
    }

    fn try_transform_each(
        &mut self,
        start: u64,
        end: u64,
        mut f: impl FnMut(u64, W) -> Result<W>,
    ) -> Result<()> {
        for range in self.page_ranges(start, end) {
            let shift = range.logical - range.start;
            self.pages[range.page]
                .try_transform_each(range.start, range.end, |pos, v| f(pos + shift, v))?;
        }
        Ok(())
    }

    fn direct_range(&self, start: u64, end: u64) -> Option<&[W]> {
        let (page, s, e) = self.single_page(start, end)?;
        self.pages[page].direct_range(s, e)
    }

    fn direct_range_mut(&mut self, start: u64, end: u64) -> Option<&mut [W]> {
        let (page, s, e) = self.single_page(start, end)?;
        self.pages[page].direct_range_mut(s, e)
    }

    fn linear_search(&self, key: W, from: u64, to: u64) -> SearchResult {
        match self.single_page(from, to) {
            Some((page, s, e)) => self.pages[page]
                .linear_search(key, s, e)
                .translate(self.base(page)),
            None => search::linear_search(self, key, from, to),
        }
    }

    fn linear_search_n(&self, sz: usize, key: W, from: u64, to: u64) -> Result<SearchResult> {
        match self.single_page(from, to) {
            Some((page, s, e)) => Ok(self.pages[page]
                .linear_search_n(sz, key, s, e)?
                .translate(self.base(page))),
            None => search::linear_search_n(self, sz, key, from, to),
        }
    }

    fn binary_search(&self, key: W, from: u64, to: u64) -> SearchResult {
        match self.single_page(from, to) {
            Some((page, s, e)) => LogicalArray::binary_search(&self.pages[page], key, s, e)
                .translate(self.base(page)),
            None => search::binary_search(self, key, from, to),
        }
    }

    fn binary_search_n(&self, sz: usize, key: W, from: u64, to: u64) -> Result<SearchResult> {
        match self.single_page(from, to) {
            Some((page, s, e)) => Ok(self.pages[page]
                .binary_search_n(sz, key, s, e)?
                .translate(self.base(page))),
            None => search::binary_search_n(self, sz, key, from, to),
        }
    }

    fn linear_search_upper_bound(&self, key: W, from: u64, to: u64) -> u64 {
        match self.single_page(from, to) {
            Some((page, s, e)) => {
                self.pages[page].linear_search_upper_bound(key, s, e) + self.base(page)
            }
            None => search::linear_search_upper_bound(self, key, from, to),
        }
    }

    fn binary_search_upper_bound(&self, key: W, from: u64, to: u64) -> u64 {
        match self.single_page(from, to) {
            Some((page, s, e)) => {
                self.pages[page].binary_search_upper_bound(key, s, e) + self.base(page)
            }
            None => search::binary_search_upper_bound(self, key, from, to),
        }
    }

    fn binary_search_upper_bound_n(&self, sz: usize, key: W, from: u64, to: u64) -> Result<u64> {
        match self.single_page(from, to) {
            Some((page, s, e)) => Ok(self.pages[page]
                .binary_search_upper_bound_n(sz, key, s, e)?
                + self.base(page)),
            None => search::binary_search_upper_bound_n(self, sz, key, from, to),
        }
    }

    fn retain(&self, buffer: &mut QueryBuffer<W>, boundary: W, start: u64, end: u64) {
        if start >= end {
            return;
        }
        if end > self.size {
            panic!("{}", self.out_of_bounds(end - 1));
        }
        self.filter_by_page(buffer, boundary, start, end, true);
    }

    fn retain_n(
        &self,
        buffer: &mut QueryBuffer<W>,
        sz: usize,
        boundary: W,
        start: u64,
        end: u64,
    ) -> Result<()> {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].retain_n(buffer, sz, boundary, s, e),
            None => crate::filter::retain_n(self, buffer, sz, boundary, start, end),
        }
    }

    fn reject(&self, buffer: &mut QueryBuffer<W>, boundary: W, start: u64, end: u64) {
        if start >= end {
            return;
        }
        if end > self.size {
            panic!("{}", self.out_of_bounds(end - 1));
        }
        self.filter_by_page(buffer, boundary, start, end, false);
    }

    fn reject_n(
        &self,
        buffer: &mut QueryBuffer<W>,
        sz: usize,
        boundary: W,
        start: u64,
        end: u64,
    ) -> Result<()> {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].reject_n(buffer, sz, boundary, s, e),
            None => crate::filter::reject_n(self, buffer, sz, boundary, start, end),
        }
    }

    fn is_sorted(&self, start: u64, end: u64) -> bool {
        match self.single_page(start, end) {
            Some((page, s, e)) => LogicalArray::is_sorted(&self.pages[page], s, e),
            None => sort::is_sorted(self, start, end),
        }
    }

    fn is_sorted_n(&self, sz: usize, start: u64, end: u64) -> Result<bool> {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].is_sorted_n(sz, s, e),
            None => sort::is_sorted_n(self, sz, start, end),
        }
    }

    fn insertion_sort(&mut self, start: u64, end: u64) {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].insertion_sort(s, e),
            None => sort::insertion_sort(self, start, end),
        }
    }

    fn insertion_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].insertion_sort_n(sz, s, e),
            None => {
                self.check_writable(start, end)?;
                sort::insertion_sort_n(self, sz, start, end)
            }
        }
    }

    fn quick_sort(&mut self, start: u64, end: u64) {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].quick_sort(s, e),
            None => sort::quick_sort(self, start, end),
        }
    }

    fn quick_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].quick_sort_n(sz, s, e),
            None => {
                self.check_writable(start, end)?;
                sort::quick_sort_n(self, sz, start, end)
            }
        }
    }

    fn merge_sort(&mut self, start: u64, end: u64) {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].merge_sort(s, e),
            None => sort::merge_sort(self, start, end),
        }
    }

    fn merge_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].merge_sort_n(sz, s, e),
            None => {
                self.check_writable(start, end)?;
                sort::merge_sort_n(self, sz, start, end)
            }
        }
    }

    fn merge_sort_external(&mut self, start: u64, end: u64, temp_dir: &Path) -> Result<()> {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].merge_sort_external(s, e, temp_dir),
            None => {
                self.check_writable(start, end)?;
                sort::merge_sort_external(self, start, end, temp_dir)
            }
        }
    }

    fn merge_sort_external_n(
        &mut self,
        sz: usize,
        start: u64,
        end: u64,
        temp_dir: &Path,
    ) -> Result<()> {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].merge_sort_external_n(sz, s, e, temp_dir),
            None => {
                self.check_writable(start, end)?;
                sort::merge_sort_external_n(self, sz, start, end, temp_dir)
            }
        }
    }

    fn sort_large_span(&mut self, ctx: &SortingContext, start: u64, end: u64) -> Result<()> {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].sort_large_span(ctx, s, e),
            None => {
                self.check_writable(start, end)?;
                sort::sort_large_span(self, ctx, start, end)
            }
        }
    }

    fn sort_large_span_n(
        &mut self,
        ctx: &SortingContext,
        sz: usize,
        start: u64,
        end: u64,
    ) -> Result<()> {
        match self.single_page(start, end) {
            Some((page, s, e)) => self.pages[page].sort_large_span_n(ctx, sz, s, e),
            None => {
                self.check_writable(start, end)?;
                sort::sort_large_span_n(self, ctx, sz, start, end)
            }
        }
    }

    fn force(&self) -> Result<()> {
        self.pages.iter().try_for_each(LogicalArray::force)
    }

    fn advise(&self, advice: Advice) -> Result<()> {
        self.pages.iter().try_for_each(|page| page.advise(advice))
    }

    fn advise_range(&self, advice: Advice, start: u64, end: u64) -> Result<()> {
        for range in self.page_ranges(start, end.min(self.size)) {
            self.pages[range.page].advise_range(advice, range.start, range.end)?;
        }
        Ok(())
    }
}

impl<W: Word, S: PartitioningScheme> std::fmt::Debug for PagingArray<W, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagingArray")
            .field("scheme", &self.scheme)
            .field("size", &self.size)
            .field("pages", &self.pages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests;
