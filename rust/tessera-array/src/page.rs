//! Pages: bounded word arrays backed by anonymous memory or a file mapping.

use std::{fs::File, marker::PhantomData, path::Path};

use memmap2::{Mmap, MmapMut, MmapOptions};
use tessera_common::{Error, Result};
use tessera_page_alloc::{Advice, MmapBuffer};

use crate::{
    LogicalArray, context::SortingContext, query_buffer::QueryBuffer, search::SearchResult,
    word::Word,
};

/// Access mode of a file mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    ReadOnly,
    ReadWrite,
}

impl MapMode {
    #[inline]
    pub fn is_writable(&self) -> bool {
        matches!(self, MapMode::ReadWrite)
    }
}

enum Storage {
    Heap(MmapBuffer),
    Mapped(MmapMut),
    MappedReadOnly(Mmap),
}

/// A contiguous run of words owned by one backing buffer.
///
/// Heap pages start zeroed. Mapped pages view a region of a file as raw
/// native-endian words; writes to a read-write mapping reach the file, at the
/// latest on [`force`](LogicalArray::force) or when the page is dropped.
pub struct Page<W: Word> {
    storage: Storage,
    len: usize,
    _marker: PhantomData<W>,
}

impl<W: Word> Page<W> {
    /// Allocates a zeroed page of `len` words.
    pub fn on_heap(len: usize) -> Result<Page<W>> {
        let buffer = MmapBuffer::allocate_zeroed::<W>(len)
            .map_err(|e| Error::io(format!("allocate page of {len} words"), e))?;
        Ok(Page {
            storage: Storage::Heap(buffer),
            len,
            _marker: PhantomData,
        })
    }

    pub fn from_words(values: &[W]) -> Result<Page<W>> {
        let mut page = Page::on_heap(values.len())?;
        page.words_mut()?.copy_from_slice(values);
        Ok(page)
    }

    /// Maps `len` words of `file`, starting at word `word_offset`.
    ///
    /// The file must already be long enough. An empty page is allocated on the
    /// heap instead of mapping zero bytes.
    pub fn map(file: &File, word_offset: u64, len: usize, mode: MapMode) -> Result<Page<W>> {
        if len == 0 {
            return Page::on_heap(0);
        }
        let byte_offset = word_offset
            .checked_mul(W::SIZE as u64)
            .ok_or_else(|| Error::invalid_arg("word_offset", "byte offset overflows u64"))?;
        let byte_len = len
            .checked_mul(W::SIZE)
            .ok_or_else(|| Error::invalid_arg("len", "byte length overflows usize"))?;

        let mut options = MmapOptions::new();
        options.offset(byte_offset).len(byte_len);

        // SAFETY: the array owning this page is the only writer of the mapped
        // region for the page's lifetime; external modification of the file is
        // outside the contract.
        let storage = match mode {
            MapMode::ReadOnly => {
                Storage::MappedReadOnly(unsafe { options.map(file) }.map_err(map_error)?)
            }
            MapMode::ReadWrite => {
                Storage::Mapped(unsafe { options.map_mut(file) }.map_err(map_error)?)
            }
        };
        log::trace!("mapped {len} words at word offset {word_offset} ({mode:?})");

        Ok(Page {
            storage,
            len,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self.storage, Storage::MappedReadOnly(_))
    }

    pub fn is_mapped(&self) -> bool {
        !matches!(self.storage, Storage::Heap(_))
    }

    #[inline]
    pub fn words(&self) -> &[W] {
        match &self.storage {
            Storage::Heap(buffer) => buffer.as_slice(),
            Storage::Mapped(map) => bytemuck::cast_slice(&map[..]),
            Storage::MappedReadOnly(map) => bytemuck::cast_slice(&map[..]),
        }
    }

    #[inline]
    pub fn words_mut(&mut self) -> Result<&mut [W]> {
        match &mut self.storage {
            Storage::Heap(buffer) => Ok(buffer.as_mut_slice()),
            Storage::Mapped(map) => Ok(bytemuck::cast_slice_mut(&mut map[..])),
            Storage::MappedReadOnly(_) => Err(Error::read_only("read-only page")),
        }
    }

    /// Mutable words for operations that cannot report errors.
    #[inline]
    fn writable(&mut self) -> &mut [W] {
        match self.words_mut() {
            Ok(words) => words,
            Err(e) => panic!("{e}"),
        }
    }
}

fn map_error(e: std::io::Error) -> Error {
    Error::io("map page", e)
}

#[cfg(unix)]
fn map_advice(advice: Advice) -> memmap2::Advice {
    match advice {
        Advice::Normal => memmap2::Advice::Normal,
        Advice::Sequential => memmap2::Advice::Sequential,
        Advice::Random => memmap2::Advice::Random,
        Advice::WillNeed => memmap2::Advice::WillNeed,
    }
}

impl<W: Word> LogicalArray for Page<W> {
    type Word = W;

    #[inline]
    fn size(&self) -> u64 {
        self.len as u64
    }

    #[inline]
    fn get(&self, pos: u64) -> W {
        self.words()[pos as usize]
    }

    #[inline]
    fn set(&mut self, pos: u64, value: W) {
        self.writable()[pos as usize] = value;
    }

    fn swap(&mut self, a: u64, b: u64) {
        LogicalArray::swap(self.writable(), a, b)
    }

    fn swap_n(&mut self, sz: usize, a: u64, b: u64) {
        self.writable().swap_n(sz, a, b)
    }

    fn get_range(&self, start: u64, buffer: &mut [W]) {
        self.words().get_range(start, buffer)
    }

    fn set_range(&mut self, start: u64, values: &[W]) {
        self.writable().set_range(start, values)
    }

    fn fill(&mut self, start: u64, end: u64, value: W) {
        LogicalArray::fill(self.writable(), start, end, value)
    }

    fn for_each(&self, start: u64, end: u64, f: impl FnMut(u64, W)) {
        self.words().for_each(start, end, f)
    }

    fn fold<T>(&self, start: u64, end: u64, init: T, f: impl FnMut(T, W) -> T) -> T {
        self.words().fold(start, end, init, f)
    }

    fn try_fold<T>(
        &self,
        start: u64,
        end: u64,
        init: T,
        f: impl FnMut(T, W) -> Result<T>,
    ) -> Result<T> {
        self.words().try_fold(start, end, init, f)
    }

    fn transform_each(&mut self, start: u64, end: u64, f: impl FnMut(u64, W) -> W) {
        self.writable().transform_each(start, end, f)
    }

    fn try_transform_each(
        &mut self,
        start: u64,
        end: u64,
        f: impl FnMut(u64, W) -> Result<W>,
    ) -> Result<()> {
        self.words_mut()?.try_transform_each(start, end, f)
    }

    fn direct_range(&self, start: u64, end: u64) -> Option<&[W]> {
        self.words().direct_range(start, end)
    }

    fn direct_range_mut(&mut self, start: u64, end: u64) -> Option<&mut [W]> {
        self.words_mut().ok()?.direct_range_mut(start, end)
    }

    fn linear_search(&self, key: W, from: u64, to: u64) -> SearchResult {
        self.words().linear_search(key, from, to)
    }

    fn linear_search_n(&self, sz: usize, key: W, from: u64, to: u64) -> Result<SearchResult> {
        self.words().linear_search_n(sz, key, from, to)
    }

    fn binary_search(&self, key: W, from: u64, to: u64) -> SearchResult {
        LogicalArray::binary_search(self.words(), key, from, to)
    }

    fn binary_search_n(&self, sz: usize, key: W, from: u64, to: u64) -> Result<SearchResult> {
        self.words().binary_search_n(sz, key, from, to)
    }

    fn linear_search_upper_bound(&self, key: W, from: u64, to: u64) -> u64 {
        self.words().linear_search_upper_bound(key, from, to)
    }

    fn binary_search_upper_bound(&self, key: W, from: u64, to: u64) -> u64 {
        self.words().binary_search_upper_bound(key, from, to)
    }

    fn binary_search_upper_bound_n(&self, sz: usize, key: W, from: u64, to: u64) -> Result<u64> {
        self.words().binary_search_upper_bound_n(sz, key, from, to)
    }

    fn retain(&self, buffer: &mut QueryBuffer<W>, boundary: W, start: u64, end: u64) {
        self.words().retain(buffer, boundary, start, end)
    }

    fn retain_n(
        &self,
        buffer: &mut QueryBuffer<W>,
        sz: usize,
        boundary: W,
        start: u64,
        end: u64,
    ) -> Result<()> {
        self.words().retain_n(buffer, sz, boundary, start, end)
    }

    fn reject(&self, buffer: &mut QueryBuffer<W>, boundary: W, start: u64, end: u64) {
        self.words().reject(buffer, boundary, start, end)
    }

    fn reject_n(
        &self,
        buffer: &mut QueryBuffer<W>,
        sz: usize,
        boundary: W,
        start: u64,
        end: u64,
    ) -> Result<()> {
        self.words().reject_n(buffer, sz, boundary, start, end)
    }

    fn is_sorted(&self, start: u64, end: u64) -> bool {
        LogicalArray::is_sorted(self.words(), start, end)
    }

    fn is_sorted_n(&self, sz: usize, start: u64, end: u64) -> Result<bool> {
        self.words().is_sorted_n(sz, start, end)
    }

    fn insertion_sort(&mut self, start: u64, end: u64) {
        self.writable().insertion_sort(start, end)
    }

    fn insertion_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        self.words_mut()?.insertion_sort_n(sz, start, end)
    }

    fn quick_sort(&mut self, start: u64, end: u64) {
        self.writable().quick_sort(start, end)
    }

    fn quick_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        self.words_mut()?.quick_sort_n(sz, start, end)
    }

    fn merge_sort(&mut self, start: u64, end: u64) {
        self.writable().merge_sort(start, end)
    }

    fn merge_sort_n(&mut self, sz: usize, start: u64, end: u64) -> Result<()> {
        self.words_mut()?.merge_sort_n(sz, start, end)
    }

    fn merge_sort_external(&mut self, start: u64, end: u64, temp_dir: &Path) -> Result<()> {
        self.words_mut()?.merge_sort_external(start, end, temp_dir)
    }

    fn merge_sort_external_n(
        &mut self,
        sz: usize,
        start: u64,
        end: u64,
        temp_dir: &Path,
    ) -> Result<()> {
        self.words_mut()?
            .merge_sort_external_n(sz, start, end, temp_dir)
    }

    fn sort_large_span(&mut self, ctx: &SortingContext, start: u64, end: u64) -> Result<()> {
        self.words_mut()?.sort_large_span(ctx, start, end)
    }

    fn sort_large_span_n(
        &mut self,
        ctx: &SortingContext,
        sz: usize,
        start: u64,
        end: u64,
    ) -> Result<()> {
        self.words_mut()?.sort_large_span_n(ctx, sz, start, end)
    }

    fn force(&self) -> Result<()> {
        match &self.storage {
            Storage::Mapped(map) => map.flush().map_err(|e| Error::io("flush page", e)),
            Storage::Heap(_) | Storage::MappedReadOnly(_) => Ok(()),
        }
    }

    fn advise(&self, advice: Advice) -> Result<()> {
        self.advise_range(advice, 0, self.len as u64)
    }

    fn advise_range(&self, advice: Advice, start: u64, end: u64) -> Result<()> {
        if end <= start {
            return Ok(());
        }
        let offset = start as usize * W::SIZE;
        let len = (end - start) as usize * W::SIZE;
        let res = match &self.storage {
            Storage::Heap(buffer) => buffer.advise_range(advice, offset, len),
            #[cfg(unix)]
            Storage::Mapped(map) => map.advise_range(map_advice(advice), offset, len),
            #[cfg(unix)]
            Storage::MappedReadOnly(map) => map.advise_range(map_advice(advice), offset, len),
            #[cfg(not(unix))]
            Storage::Mapped(_) | Storage::MappedReadOnly(_) => Ok(()),
        };
        res.map_err(|e| Error::io("advise page", e))
    }
}

impl<W: Word> std::fmt::Debug for Page<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.storage {
            Storage::Heap(_) => "heap",
            Storage::Mapped(_) => "mapped",
            Storage::MappedReadOnly(_) => "mapped-ro",
        };
        f.debug_struct("Page")
            .field("kind", &kind)
            .field("len", &self.len)
            .finish()
    }
}
