//! Operations combining two sorted arrays: deduplicating unions, value merges
//! and union cardinality.
//!
//! Inputs are sorted (by record key, for record variants) and free of
//! duplicate keys within each range. When every involved range is contiguous
//! (see [`LogicalArray::direct_range`]) the work runs on plain slices; otherwise
//! it goes through element-wise access.
//!
//! Range and stride arguments are always validated. Input sortedness is
//! verified in debug builds and with the `strict-checks` feature.

use std::ops::Range;

use tessera_common::{
    Error, Result,
    result::{verify_range, verify_records},
};

use crate::{LogicalArray, word::Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    First,
    Second,
}

/// Writes the sorted union of `a[a_range]` and `b[b_range]` to `out` starting
/// at `out_range.start`, dropping duplicates. Returns the number of words
/// written.
pub fn merge_arrays<O, A, B>(
    out: &mut O,
    a: &A,
    b: &B,
    out_range: Range<u64>,
    a_range: Range<u64>,
    b_range: Range<u64>,
) -> Result<u64>
where
    O: LogicalArray + ?Sized,
    A: LogicalArray<Word = O::Word> + ?Sized,
    B: LogicalArray<Word = O::Word> + ?Sized,
{
    merge_arrays_n(out, a, b, 1, out_range, a_range, b_range)
}

/// [`merge_arrays_n`] over `(key, value)` pairs.
pub fn merge_arrays2<O, A, B>(
    out: &mut O,
    a: &A,
    b: &B,
    out_range: Range<u64>,
    a_range: Range<u64>,
    b_range: Range<u64>,
) -> Result<u64>
where
    O: LogicalArray + ?Sized,
    A: LogicalArray<Word = O::Word> + ?Sized,
    B: LogicalArray<Word = O::Word> + ?Sized,
{
    merge_arrays_n(out, a, b, 2, out_range, a_range, b_range)
}

/// Union of two ranges of `sz`-word records, ordered by key. When both inputs
/// hold a record with the same key, the record from `a` is kept.
///
/// Fails with `DestBufferTooSmall` once the union outgrows `out_range`; the
/// records written so far stay in place.
pub fn merge_arrays_n<O, A, B>(
    out: &mut O,
    a: &A,
    b: &B,
    sz: usize,
    out_range: Range<u64>,
    a_range: Range<u64>,
    b_range: Range<u64>,
) -> Result<u64>
where
    O: LogicalArray + ?Sized,
    A: LogicalArray<Word = O::Word> + ?Sized,
    B: LogicalArray<Word = O::Word> + ?Sized,
{
    verify_range(out_range.start, out_range.end, out.size())?;
    verify_inputs(a, b, sz, &a_range, &b_range)?;
    let required = (a_range.end - a_range.start).max(b_range.end - b_range.start);
    let available = out_range.end - out_range.start;
    if available < required {
        return Err(Error::dest_too_small(required, available));
    }

    if let (Some(o), Some(x), Some(y)) = (
        out.direct_range_mut(out_range.start, out_range.end),
        a.direct_range(a_range.start, a_range.end),
        b.direct_range(b_range.start, b_range.end),
    ) {
        let (out_len, x_len, y_len) = (o.len() as u64, x.len() as u64, y.len() as u64);
        return merge_records(o, x, y, sz, 0..out_len, 0..x_len, 0..y_len);
    }
    merge_records(out, a, b, sz, out_range, a_range, b_range)
}

/// Combines the values of `(key, value)` pairs present in both ranges:
/// `dest`'s value becomes `reducer(dest_value, source_value)`. Keys found in
/// only one range are left alone. Returns the number of combined pairs.
pub fn merge_array_values<D, S>(
    dest: &mut D,
    source: &S,
    reducer: impl FnMut(D::Word, D::Word) -> D::Word,
    dest_range: Range<u64>,
    source_range: Range<u64>,
) -> Result<u64>
where
    D: LogicalArray + ?Sized,
    S: LogicalArray<Word = D::Word> + ?Sized,
{
    verify_records(dest_range.start, dest_range.end, dest.size(), 2)?;
    verify_records(source_range.start, source_range.end, source.size(), 2)?;
    check_sorted(dest, 2, &dest_range)?;
    check_sorted(source, 2, &source_range)?;

    if let (Some(d), Some(s)) = (
        dest.direct_range_mut(dest_range.start, dest_range.end),
        source.direct_range(source_range.start, source_range.end),
    ) {
        let (d_len, s_len) = (d.len() as u64, s.len() as u64);
        return Ok(combine_values(d, s, reducer, 0..d_len, 0..s_len));
    }
    Ok(combine_values(dest, source, reducer, dest_range, source_range))
}

/// Number of distinct words in the union of `a[a_range]` and `b[b_range]`:
/// the output size [`merge_arrays`] needs.
pub fn count_distinct_elements<A, B>(
    a: &A,
    b: &B,
    a_range: Range<u64>,
    b_range: Range<u64>,
) -> Result<u64>
where
    A: LogicalArray + ?Sized,
    B: LogicalArray<Word = A::Word> + ?Sized,
{
    count_distinct_elements_n(a, b, 1, a_range, b_range)
}

/// Number of distinct record keys in the union of two ranges of `sz`-word
/// records. [`merge_arrays_n`] writes `sz` times as many words.
pub fn count_distinct_elements_n<A, B>(
    a: &A,
    b: &B,
    sz: usize,
    a_range: Range<u64>,
    b_range: Range<u64>,
) -> Result<u64>
where
    A: LogicalArray + ?Sized,
    B: LogicalArray<Word = A::Word> + ?Sized,
{
    verify_inputs(a, b, sz, &a_range, &b_range)?;

    let mut count = 0;
    let mut tally = |_: Source, _: u64| -> Result<()> {
        count += 1;
        Ok(())
    };
    if let (Some(x), Some(y)) = (
        a.direct_range(a_range.start, a_range.end),
        b.direct_range(b_range.start, b_range.end),
    ) {
        for_each_distinct(x, y, sz, 0..x.len() as u64, 0..y.len() as u64, &mut tally)?;
    } else {
        for_each_distinct(a, b, sz, a_range, b_range, &mut tally)?;
    }
    Ok(count)
}

fn verify_inputs<A, B>(
    a: &A,
    b: &B,
    sz: usize,
    a_range: &Range<u64>,
    b_range: &Range<u64>,
) -> Result<()>
where
    A: LogicalArray + ?Sized,
    B: LogicalArray<Word = A::Word> + ?Sized,
{
    verify_records(a_range.start, a_range.end, a.size(), sz)?;
    verify_records(b_range.start, b_range.end, b.size(), sz)?;
    check_sorted(a, sz, a_range)?;
    check_sorted(b, sz, b_range)
}

#[inline]
fn check_sorted<A>(arr: &A, sz: usize, range: &Range<u64>) -> Result<()>
where
    A: LogicalArray + ?Sized,
{
    if cfg!(any(debug_assertions, feature = "strict-checks"))
        && !arr.is_sorted_n(sz, range.start, range.end)?
    {
        return Err(Error::not_sorted(range.start, range.end));
    }
    Ok(())
}

/// Calls `emit` once per distinct key of the union, in key order, with the
/// record holding it (from `a` when both do).
fn for_each_distinct<A, B>(
    a: &A,
    b: &B,
    sz: usize,
    a_range: Range<u64>,
    b_range: Range<u64>,
    mut emit: impl FnMut(Source, u64) -> Result<()>,
) -> Result<()>
where
    A: LogicalArray + ?Sized,
    B: LogicalArray<Word = A::Word> + ?Sized,
{
    let step = sz as u64;
    let (mut a_pos, mut b_pos) = (a_range.start, b_range.start);
    let mut last: Option<A::Word> = None;

    loop {
        let (source, pos, key) = if a_pos < a_range.end && b_pos < b_range.end {
            let a_key = a.get(a_pos);
            let b_key = b.get(b_pos);
            if a_key < b_key {
                a_pos += step;
                (Source::First, a_pos - step, a_key)
            } else if b_key < a_key {
                b_pos += step;
                (Source::Second, b_pos - step, b_key)
            } else {
                a_pos += step;
                b_pos += step;
                (Source::First, a_pos - step, a_key)
            }
        } else if a_pos < a_range.end {
            a_pos += step;
            (Source::First, a_pos - step, a.get(a_pos - step))
        } else if b_pos < b_range.end {
            b_pos += step;
            (Source::Second, b_pos - step, b.get(b_pos - step))
        } else {
            break;
        };

        if last != Some(key) {
            emit(source, pos)?;
            last = Some(key);
        }
    }
    Ok(())
}

fn merge_records<O, A, B>(
    out: &mut O,
    a: &A,
    b: &B,
    sz: usize,
    out_range: Range<u64>,
    a_range: Range<u64>,
    b_range: Range<u64>,
) -> Result<u64>
where
    O: LogicalArray + ?Sized,
    A: LogicalArray<Word = O::Word> + ?Sized,
    B: LogicalArray<Word = O::Word> + ?Sized,
{
    let step = sz as u64;
    let mut out_pos = out_range.start;
    for_each_distinct(a, b, sz, a_range, b_range, |source, pos| {
        if out_pos + step > out_range.end {
            return Err(Error::dest_too_small(
                out_pos + step - out_range.start,
                out_range.end - out_range.start,
            ));
        }
        for i in 0..step {
            let value = match source {
                Source::First => a.get(pos + i),
                Source::Second => b.get(pos + i),
            };
            out.set(out_pos + i, value);
        }
        out_pos += step;
        Ok(())
    })?;
    Ok(out_pos - out_range.start)
}

fn combine_values<D, S, W>(
    dest: &mut D,
    source: &S,
    mut reducer: impl FnMut(W, W) -> W,
    dest_range: Range<u64>,
    source_range: Range<u64>,
) -> u64
where
    W: Word,
    D: LogicalArray<Word = W> + ?Sized,
    S: LogicalArray<Word = W> + ?Sized,
{
    let (mut dest_pos, mut source_pos) = (dest_range.start, source_range.start);
    let mut combined = 0;
    while dest_pos < dest_range.end && source_pos < source_range.end {
        let dest_key = dest.get(dest_pos);
        let source_key = source.get(source_pos);
        if dest_key < source_key {
            dest_pos += 2;
        } else if source_key < dest_key {
            source_pos += 2;
        } else {
            let merged = reducer(dest.get(dest_pos + 1), source.get(source_pos + 1));
            dest.set(dest_pos + 1, merged);
            combined += 1;
            dest_pos += 2;
            source_pos += 2;
        }
    }
    combined
}
