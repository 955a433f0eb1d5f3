//! In-place sorting of word ranges and of fixed-width records.
//!
//! Record variants (`_n`) treat `sz` consecutive words as one record, order
//! records by their first word and move them as a unit. They check the range
//! against the array size and the stride before touching any word; the plain
//! variants index like slices and panic on positions outside the array.

use std::path::Path;

use tessera_common::{Result, result::verify_records};

use crate::{LogicalArray, context::SortingContext};

mod external;

pub use external::ScratchFile;

/// Spans shorter than this (in words) skip quicksort entirely.
pub const INSERTION_SORT_LIMIT: u64 = 64;

/// Quicksort partitions shorter than this (in records) finish with insertion sort.
pub const SMALL_PARTITION_RECORDS: u64 = 32;

/// Chunk limit (in records) of the plain merge sort entry points.
pub const DEFAULT_MERGE_CHUNK: u64 = 1 << 16;

pub fn is_sorted<A>(arr: &A, start: u64, end: u64) -> bool
where
    A: LogicalArray + ?Sized,
{
    sorted_records(arr, 1, start, end)
}

/// Whether the record keys of `start..end` are ascending.
///
/// Fails when the range is not inside the array or does not span whole
/// `sz`-word records.
pub fn is_sorted_n<A>(arr: &A, sz: usize, start: u64, end: u64) -> Result<bool>
where
    A: LogicalArray + ?Sized,
{
    verify_records(start, end, arr.size(), sz)?;
    Ok(sorted_records(arr, sz as u64, start, end))
}

fn sorted_records<A>(arr: &A, sz: u64, start: u64, end: u64) -> bool
where
    A: LogicalArray + ?Sized,
{
    if end <= start + sz {
        return true;
    }
    let mut prev = arr.get(start);
    let mut pos = start + sz;
    while pos < end {
        let value = arr.get(pos);
        if value < prev {
            return false;
        }
        prev = value;
        pos += sz;
    }
    true
}

pub fn insertion_sort<A>(arr: &mut A, start: u64, end: u64)
where
    A: LogicalArray + ?Sized,
{
    for i in start.saturating_add(1)..end {
        let key = arr.get(i);
        let mut j = i;
        while j > start {
            let prev = arr.get(j - 1);
            if prev <= key {
                break;
            }
            arr.set(j, prev);
            j -= 1;
        }
        arr.set(j, key);
    }
}

pub fn insertion_sort_n<A>(arr: &mut A, sz: usize, start: u64, end: u64) -> Result<()>
where
    A: LogicalArray + ?Sized,
{
    verify_records(start, end, arr.size(), sz)?;
    insert_records(arr, sz, start, end);
    Ok(())
}

fn insert_records<A>(arr: &mut A, sz: usize, start: u64, end: u64)
where
    A: LogicalArray + ?Sized,
{
    if sz == 1 {
        return insertion_sort(arr, start, end);
    }
    let step = sz as u64;
    let mut i = start + step;
    while i < end {
        let mut j = i;
        while j > start && arr.get(j - step) > arr.get(j) {
            arr.swap_n(sz, j - step, j);
            j -= step;
        }
        i += step;
    }
}

pub fn quick_sort<A>(arr: &mut A, start: u64, end: u64)
where
    A: LogicalArray + ?Sized,
{
    if end <= start {
        return;
    }
    if end - start < INSERTION_SORT_LIMIT {
        insertion_sort(arr, start, end);
    } else {
        hoare_sort(arr, 1, start, end - 1);
    }
}

pub fn quick_sort_n<A>(arr: &mut A, sz: usize, start: u64, end: u64) -> Result<()>
where
    A: LogicalArray + ?Sized,
{
    verify_records(start, end, arr.size(), sz)?;
    sort_records(arr, sz, start, end);
    Ok(())
}

/// Quicksort of `start..end`, which must span whole records.
fn sort_records<A>(arr: &mut A, sz: usize, start: u64, end: u64)
where
    A: LogicalArray + ?Sized,
{
    if sz == 1 {
        return quick_sort(arr, start, end);
    }
    let step = sz as u64;
    if end < start + step {
        return;
    }
    hoare_sort(arr, sz, start, end - step);
}

/// Quicksort over the records starting at `low..=high`.
///
/// Recurses into the smaller partition and iterates on the larger one, which
/// keeps the stack depth logarithmic.
fn hoare_sort<A>(arr: &mut A, sz: usize, mut low: u64, mut high: u64)
where
    A: LogicalArray + ?Sized,
{
    let step = sz as u64;
    while low < high {
        if (high - low) / step < SMALL_PARTITION_RECORDS {
            insert_records(arr, sz, low, high + step);
            return;
        }

        let p = hoare_partition(arr, sz, low, high);
        if p - low < high - p {
            hoare_sort(arr, sz, low, p);
            low = p + step;
        } else {
            hoare_sort(arr, sz, p + step, high);
            high = p;
        }
    }
}

/// Partitions `low..=high` around the midpoint record and returns the start of
/// the last record of the lower half. The result is always `< high`.
fn hoare_partition<A>(arr: &mut A, sz: usize, low: u64, high: u64) -> u64
where
    A: LogicalArray + ?Sized,
{
    let step = sz as u64;
    let mid = low + ((high - low) / step / 2) * step;
    let pivot = arr.get(mid);

    let mut i = low;
    let mut j = high;
    loop {
        while arr.get(i) < pivot {
            i += step;
        }
        while arr.get(j) > pivot {
            j -= step;
        }
        if i >= j {
            return j;
        }
        if sz == 1 {
            arr.swap(i, j);
        } else {
            arr.swap_n(sz, i, j);
        }
        i += step;
        j -= step;
    }
}

pub fn merge_sort<A>(arr: &mut A, start: u64, end: u64)
where
    A: LogicalArray + ?Sized,
{
    if end <= start {
        return;
    }
    let mut scratch = vec![A::Word::default(); (end - start) as usize];
    merge_sort_with(arr, 1, start, end, &mut scratch, DEFAULT_MERGE_CHUNK);
}

/// Bottom-up merge sort with a heap scratch buffer as large as the span.
pub fn merge_sort_n<A>(arr: &mut A, sz: usize, start: u64, end: u64) -> Result<()>
where
    A: LogicalArray + ?Sized,
{
    verify_records(start, end, arr.size(), sz)?;
    if end > start {
        let mut scratch = vec![A::Word::default(); (end - start) as usize];
        merge_sort_with(arr, sz, start, end, &mut scratch, DEFAULT_MERGE_CHUNK);
    }
    Ok(())
}

pub fn merge_sort_external<A>(arr: &mut A, start: u64, end: u64, temp_dir: &Path) -> Result<()>
where
    A: LogicalArray + ?Sized,
{
    merge_sort_external_n(arr, 1, start, end, temp_dir)
}

/// Bottom-up merge sort whose scratch buffer is a memory-mapped file in
/// `temp_dir`. The file is removed when the sort returns, on success or error.
pub fn merge_sort_external_n<A>(
    arr: &mut A,
    sz: usize,
    start: u64,
    end: u64,
    temp_dir: &Path,
) -> Result<()>
where
    A: LogicalArray + ?Sized,
{
    merge_sort_external_with(arr, sz, start, end, temp_dir, DEFAULT_MERGE_CHUNK)
}

fn merge_sort_external_with<A>(
    arr: &mut A,
    sz: usize,
    start: u64,
    end: u64,
    temp_dir: &Path,
    chunk_limit: u64,
) -> Result<()>
where
    A: LogicalArray + ?Sized,
{
    verify_records(start, end, arr.size(), sz)?;
    if (end - start) / (sz as u64) <= 1 {
        return Ok(());
    }

    let started = std::time::Instant::now();
    log::debug!("external sort of {start}..{end} (stride {sz}) in {}", temp_dir.display());

    let mut scratch = ScratchFile::create::<A::Word>(temp_dir, start, end)?;
    merge_sort_with(arr, sz, start, end, scratch.words_mut(), chunk_limit);

    log::debug!("external sort of {start}..{end} done in {:?}", started.elapsed());
    Ok(())
}

/// Sorts `start..end`, in memory below the context's memory sort limit and with
/// an external merge sort at or above it.
pub fn sort_large_span<A>(arr: &mut A, ctx: &SortingContext, start: u64, end: u64) -> Result<()>
where
    A: LogicalArray + ?Sized,
{
    sort_large_span_n(arr, ctx, 1, start, end)
}

pub fn sort_large_span_n<A>(
    arr: &mut A,
    ctx: &SortingContext,
    sz: usize,
    start: u64,
    end: u64,
) -> Result<()>
where
    A: LogicalArray + ?Sized,
{
    verify_records(start, end, arr.size(), sz)?;

    let records = (end - start) / sz as u64;
    if records < ctx.memory_sort_limit() {
        sort_records(arr, sz, start, end);
        Ok(())
    } else {
        merge_sort_external_with(
            arr,
            sz,
            start,
            end,
            ctx.temp_dir(),
            ctx.memory_sort_limit(),
        )
    }
}

/// Quicksorts chunks of the largest power of two records not above
/// `min(records, chunk_limit)`, then merges adjacent runs of doubling width
/// through `scratch` until one run covers the span.
///
/// `scratch` must hold at least `end - start` words.
fn merge_sort_with<A>(
    arr: &mut A,
    sz: usize,
    start: u64,
    end: u64,
    scratch: &mut [A::Word],
    chunk_limit: u64,
) where
    A: LogicalArray + ?Sized,
{
    let step = sz as u64;
    let len = end - start;
    let records = len / step;
    if records <= 1 {
        return;
    }
    debug_assert!(scratch.len() as u64 >= len);

    let chunk_words = (1u64 << records.min(chunk_limit.max(1)).ilog2()) * step;

    let mut chunk_start = start;
    while chunk_start < end {
        let chunk_end = (chunk_start + chunk_words).min(end);
        if sz == 1 {
            arr.quick_sort(chunk_start, chunk_end);
        } else {
            sort_records(arr, sz, chunk_start, chunk_end);
        }
        chunk_start = chunk_end;
    }

    let scratch = &mut scratch[..len as usize];
    let mut width = chunk_words;
    while width < len {
        let mut left = 0;
        while left < len {
            let mid = (left + width).min(len);
            let right = (left + 2 * width).min(len);
            merge_runs(arr, sz, start, left, mid, right, scratch);
            left = right;
        }
        arr.set_range(start, scratch);
        width *= 2;
    }
}

/// Merges the sorted runs `left..mid` and `mid..right` (offsets from `base`)
/// into `scratch[left..right]`.
fn merge_runs<A>(
    arr: &A,
    sz: usize,
    base: u64,
    left: u64,
    mid: u64,
    right: u64,
    scratch: &mut [A::Word],
) where
    A: LogicalArray + ?Sized,
{
    let step = sz as u64;
    let (mut l, mut r) = (left, mid);
    let mut out = left as usize;
    while out < right as usize {
        let take_left = l < mid && (r >= right || arr.get(base + l) <= arr.get(base + r));
        let src = if take_left { &mut l } else { &mut r };
        for k in 0..step {
            scratch[out] = arr.get(base + *src + k);
            out += 1;
        }
        *src += step;
    }
}
