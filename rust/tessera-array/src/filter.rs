//! Set filtering of a [`QueryBuffer`] against a sorted backing range.
//!
//! `retain` keeps the candidates present in the backing range (intersection),
//! `reject` keeps the ones absent from it (difference). Both consume candidates
//! up to and including `boundary`; larger candidates stay unvisited so that a
//! caller can filter against a long posting list one chunk at a time, passing
//! the chunk's last key as the boundary.
//!
//! The record variants (`_n`) compare candidates against the first word of each
//! `sz`-word record and fail, leaving the buffer untouched, when the range is not
//! inside the array or does not span whole records.

use tessera_common::{Result, result::verify_records};

use crate::{LogicalArray, query_buffer::QueryBuffer};

pub fn retain<A>(arr: &A, buffer: &mut QueryBuffer<A::Word>, boundary: A::Word, start: u64, end: u64)
where
    A: LogicalArray + ?Sized,
{
    filter(arr, buffer, 1, boundary, start, end, true);
}

pub fn retain_n<A>(
    arr: &A,
    buffer: &mut QueryBuffer<A::Word>,
    sz: usize,
    boundary: A::Word,
    start: u64,
    end: u64,
) -> Result<()>
where
    A: LogicalArray + ?Sized,
{
    verify_records(start, end, arr.size(), sz)?;
    filter(arr, buffer, sz as u64, boundary, start, end, true);
    Ok(())
}

pub fn reject<A>(arr: &A, buffer: &mut QueryBuffer<A::Word>, boundary: A::Word, start: u64, end: u64)
where
    A: LogicalArray + ?Sized,
{
    filter(arr, buffer, 1, boundary, start, end, false);
}

pub fn reject_n<A>(
    arr: &A,
    buffer: &mut QueryBuffer<A::Word>,
    sz: usize,
    boundary: A::Word,
    start: u64,
    end: u64,
) -> Result<()>
where
    A: LogicalArray + ?Sized,
{
    verify_records(start, end, arr.size(), sz)?;
    filter(arr, buffer, sz as u64, boundary, start, end, false);
    Ok(())
}

/// Merge walk between the cursor and the record keys of `start..end`.
///
/// `keep_present` selects the fate of candidates found in the backing range;
/// absent candidates get the opposite one.
fn filter<A>(
    arr: &A,
    buffer: &mut QueryBuffer<A::Word>,
    sz: u64,
    boundary: A::Word,
    start: u64,
    end: u64,
    keep_present: bool,
) where
    A: LogicalArray + ?Sized,
{
    if start >= end {
        return;
    }

    let mut pos = start;
    let mut backing = arr.get(pos);

    while buffer.has_more() {
        let candidate = buffer.current_value();
        if candidate > boundary {
            break;
        }

        if candidate == backing {
            advance(buffer, keep_present);
        } else if candidate < backing {
            advance(buffer, !keep_present);
        } else {
            pos += sz;
            if pos >= end {
                // backing range exhausted: nothing up to the boundary can match
                while buffer.has_more() && buffer.current_value() <= boundary {
                    advance(buffer, !keep_present);
                }
                break;
            }
            backing = arr.get(pos);
        }
    }
}

#[inline]
fn advance<W: crate::Word>(buffer: &mut QueryBuffer<W>, keep: bool) {
    if keep {
        buffer.retain_and_advance();
    } else {
        buffer.reject_and_advance();
    }
}
