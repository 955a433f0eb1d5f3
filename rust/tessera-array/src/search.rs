//! Searches over ascending-sorted ranges.
//!
//! All functions take a half-open word range `from..to` that the caller
//! guarantees to be sorted (by record key, for the stride-`sz` variants, where a
//! record is `sz` consecutive words and its key is the first word).
//!
//! The record variants check `from..to` against the array size and the
//! stride, and fail with an error instead of searching a misaligned range.
//!
//! A miss reports the insertion point: the position of the first record whose
//! key is greater than the searched key, or `to` when there is none.

use tessera_common::{Result, result::verify_records};

use crate::{LogicalArray, word::Word};

/// Outcome of a point search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchResult {
    /// Position of a record whose key equals the searched key.
    Found(u64),
    /// Position where the key would have to be inserted to keep the range sorted.
    NotFound(u64),
}

impl SearchResult {
    #[inline]
    pub fn is_found(&self) -> bool {
        matches!(self, SearchResult::Found(_))
    }

    #[inline]
    pub fn found(&self) -> Option<u64> {
        match *self {
            SearchResult::Found(pos) => Some(pos),
            SearchResult::NotFound(_) => None,
        }
    }

    /// The position either variant points at.
    #[inline]
    pub fn position(&self) -> u64 {
        match *self {
            SearchResult::Found(pos) | SearchResult::NotFound(pos) => pos,
        }
    }

    /// Shifts the reported position by `base`, e.g. from page-local to logical
    /// addressing.
    #[inline]
    pub fn translate(self, base: u64) -> SearchResult {
        match self {
            SearchResult::Found(pos) => SearchResult::Found(pos + base),
            SearchResult::NotFound(pos) => SearchResult::NotFound(pos + base),
        }
    }

    /// Inverse of [`translate`](Self::translate).
    #[inline]
    pub fn translate_back(self, base: u64) -> SearchResult {
        match self {
            SearchResult::Found(pos) => SearchResult::Found(pos - base),
            SearchResult::NotFound(pos) => SearchResult::NotFound(pos - base),
        }
    }

    /// Packs the result into the signed form used by existing index files:
    /// found positions as-is, misses through [`encode_search_miss`].
    pub fn encode(self, stride: usize) -> i64 {
        match self {
            SearchResult::Found(pos) => pos as i64,
            SearchResult::NotFound(pos) => encode_search_miss(stride, pos as i64),
        }
    }

    /// Unpacks a value produced by [`encode`](Self::encode).
    pub fn decode(stride: usize, raw: i64) -> SearchResult {
        if raw >= 0 {
            SearchResult::Found(raw as u64)
        } else {
            SearchResult::NotFound(decode_search_miss(stride, raw) as u64)
        }
    }
}

/// Encodes a miss at `value` as a strictly negative number.
///
/// Negative values are clamped to zero before encoding.
#[inline]
pub fn encode_search_miss(stride: usize, value: i64) -> i64 {
    -(stride as i64) - value.max(0)
}

#[inline]
pub fn decode_search_miss(stride: usize, raw: i64) -> i64 {
    -raw - stride as i64
}

pub fn linear_search<A>(arr: &A, key: A::Word, from: u64, to: u64) -> SearchResult
where
    A: LogicalArray + ?Sized,
{
    for pos in from..to {
        let value = arr.get(pos);
        if value == key {
            return SearchResult::Found(pos);
        }
        if value > key {
            return SearchResult::NotFound(pos);
        }
    }
    SearchResult::NotFound(to)
}

/// Linear search over the keys of `sz`-word records.
///
/// Fails when `from..to` is not inside the array or does not span whole records.
pub fn linear_search_n<A>(
    arr: &A,
    sz: usize,
    key: A::Word,
    from: u64,
    to: u64,
) -> Result<SearchResult>
where
    A: LogicalArray + ?Sized,
{
    verify_records(from, to, arr.size(), sz)?;
    Ok(scan_records(arr, sz as u64, key, from, to))
}

fn scan_records<A>(arr: &A, sz: u64, key: A::Word, from: u64, to: u64) -> SearchResult
where
    A: LogicalArray + ?Sized,
{
    let mut pos = from;
    while pos < to {
        let value = arr.get(pos);
        if value == key {
            return SearchResult::Found(pos);
        }
        if value > key {
            return SearchResult::NotFound(pos);
        }
        pos += sz;
    }
    SearchResult::NotFound(to)
}

pub fn binary_search<A>(arr: &A, key: A::Word, from: u64, to: u64) -> SearchResult
where
    A: LogicalArray + ?Sized,
{
    bisect(arr, 1, key, from, to)
}

/// Binary search over records of `sz` words, narrowing until fewer than
/// [`Word::LINEAR_SEARCH_CUTOFF`] records remain and scanning those linearly.
pub fn binary_search_n<A>(
    arr: &A,
    sz: usize,
    key: A::Word,
    from: u64,
    to: u64,
) -> Result<SearchResult>
where
    A: LogicalArray + ?Sized,
{
    verify_records(from, to, arr.size(), sz)?;
    Ok(bisect(arr, sz as u64, key, from, to))
}

fn bisect<A>(arr: &A, sz: u64, key: A::Word, from: u64, to: u64) -> SearchResult
where
    A: LogicalArray + ?Sized,
{
    if to <= from {
        return SearchResult::NotFound(from);
    }
    // record indices relative to `from`
    let mut low = 0u64;
    let mut high = (to - from) / sz;

    while high - low >= A::Word::LINEAR_SEARCH_CUTOFF {
        let mid = low + (high - low) / 2;
        let value = arr.get(from + mid * sz);
        if value < key {
            low = mid + 1;
        } else if value > key {
            high = mid;
        } else {
            return SearchResult::Found(from + mid * sz);
        }
    }

    // a miss past the residual span lands on `high`, whose key (if any) is greater
    scan_records(arr, sz, key, from + low * sz, from + high * sz)
}

/// Position of the first word `>= key` in `from..to`, or `to`.
pub fn linear_search_upper_bound<A>(arr: &A, key: A::Word, from: u64, to: u64) -> u64
where
    A: LogicalArray + ?Sized,
{
    (from..to).find(|&pos| arr.get(pos) >= key).unwrap_or(to)
}

pub fn binary_search_upper_bound<A>(arr: &A, key: A::Word, from: u64, to: u64) -> u64
where
    A: LogicalArray + ?Sized,
{
    lower_bound(arr, 1, key, from, to)
}

/// Start of the first record whose key is `>= key`, or `to` when every key is
/// smaller. Duplicates resolve to the first of the run.
pub fn binary_search_upper_bound_n<A>(
    arr: &A,
    sz: usize,
    key: A::Word,
    from: u64,
    to: u64,
) -> Result<u64>
where
    A: LogicalArray + ?Sized,
{
    verify_records(from, to, arr.size(), sz)?;
    Ok(lower_bound(arr, sz as u64, key, from, to))
}

fn lower_bound<A>(arr: &A, sz: u64, key: A::Word, from: u64, to: u64) -> u64
where
    A: LogicalArray + ?Sized,
{
    if to <= from {
        return from;
    }
    let mut low = 0u64;
    let mut high = (to - from) / sz;

    while high - low >= A::Word::LINEAR_SEARCH_CUTOFF {
        let mid = low + (high - low) / 2;
        if arr.get(from + mid * sz) < key {
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    while low < high && arr.get(from + low * sz) < key {
        low += 1;
    }
    if low == (to - from) / sz {
        to
    } else {
        from + low * sz
    }
}

#[cfg(test)]
mod tests {
    use tessera_common::ErrorKind;

    use super::{SearchResult, decode_search_miss, encode_search_miss};
    use crate::LogicalArray;

    fn sorted_values(n: usize, seed: u64) -> Vec<i64> {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut values: Vec<i64> = (0..n).map(|_| rng.i64(0..(n as i64 * 3 + 1))).collect();
        values.sort_unstable();
        values
    }

    #[test]
    fn test_miss_round_trip() {
        for stride in 1..6 {
            for v in [0i64, 1, 2, 17, 1 << 40] {
                let raw = encode_search_miss(stride, v);
                assert!(raw < 0);
                assert_eq!(decode_search_miss(stride, raw), v);
            }
        }
        assert_eq!(encode_search_miss(2, -5), -2);
    }

    #[test]
    fn test_result_encoding() {
        assert_eq!(SearchResult::Found(12).encode(1), 12);
        assert_eq!(SearchResult::decode(1, 12), SearchResult::Found(12));
        let raw = SearchResult::NotFound(7).encode(2);
        assert_eq!(raw, -9);
        assert_eq!(SearchResult::decode(2, raw), SearchResult::NotFound(7));
        assert_eq!(SearchResult::NotFound(0).translate(100), SearchResult::NotFound(100));
        assert_eq!(SearchResult::Found(3).translate(10).translate_back(10), SearchResult::Found(3));
    }

    #[test]
    fn test_binary_search_matches_linear() {
        for n in [0usize, 1, 2, 31, 32, 33, 100, 1000] {
            let values = sorted_values(n, n as u64);
            let arr = values.as_slice();
            let len = n as u64;
            for key in -1..(n as i64 * 3 + 2) {
                let bin = LogicalArray::binary_search(arr, key, 0, len);
                let lin = LogicalArray::linear_search(arr, key, 0, len);
                let insertion = values.partition_point(|&v| v < key) as u64;
                match bin {
                    SearchResult::Found(pos) => assert_eq!(values[pos as usize], key),
                    SearchResult::NotFound(pos) => {
                        assert!(!values.contains(&key));
                        assert_eq!(pos, insertion, "key {key} n {n}");
                    }
                }
                assert_eq!(bin.is_found(), lin.is_found());
                if !lin.is_found() {
                    assert_eq!(lin.position(), insertion);
                }
            }
        }
    }

    #[test]
    fn test_upper_bound_with_duplicates() {
        let values: Vec<i64> = (0..500).map(|i| i / 7).collect();
        let arr = values.as_slice();
        for key in -1..80 {
            let expected = values.partition_point(|&v| v < key) as u64;
            assert_eq!(LogicalArray::binary_search_upper_bound(arr, key, 0, 500), expected);
            assert_eq!(LogicalArray::linear_search_upper_bound(arr, key, 0, 500), expected);
        }
        assert_eq!(LogicalArray::binary_search_upper_bound(arr, 5, 10, 10), 10);
    }

    #[test]
    fn test_stride_search() {
        // (key, value) records with keys 0, 2, 4, ...
        let mut words = vec![0i32; 400];
        for i in 0..200 {
            words[2 * i] = 2 * i as i32;
            words[2 * i + 1] = -(i as i32);
        }
        let arr = words.as_slice();
        for key in -1..402 {
            let result = LogicalArray::binary_search_n(arr, 2, key, 0, 400).unwrap();
            let expected_pos = 2 * words.chunks(2).take_while(|r| r[0] < key).count() as u64;
            if key >= 0 && key % 2 == 0 && key < 400 {
                assert_eq!(result, SearchResult::Found(expected_pos));
                assert_eq!(words[expected_pos as usize + 1], -(key / 2));
            } else {
                assert_eq!(result, SearchResult::NotFound(expected_pos), "key {key}");
            }
            assert_eq!(
                LogicalArray::binary_search_upper_bound_n(arr, 2, key, 0, 400).unwrap(),
                expected_pos
            );
            assert_eq!(
                LogicalArray::linear_search_n(arr, 2, key, 0, 400)
                    .unwrap()
                    .position(),
                expected_pos
            );
        }
    }

    #[test]
    fn test_search_subrange() {
        let values: Vec<i64> = (0..100).map(|i| i * 10).collect();
        let arr = values.as_slice();
        assert_eq!(LogicalArray::binary_search(arr, 500, 20, 80), SearchResult::Found(50));
        assert_eq!(LogicalArray::binary_search(arr, 100, 20, 80), SearchResult::NotFound(20));
        assert_eq!(LogicalArray::binary_search(arr, 5000, 20, 80), SearchResult::NotFound(80));
        assert_eq!(LogicalArray::binary_search(arr, 5, 30, 30), SearchResult::NotFound(30));
    }

    #[test]
    fn test_stride_search_rejects_bad_records() {
        let values = [1i64, 2, 3, 4, 5, 6, 7];
        let arr = &values[..];

        let err = LogicalArray::binary_search_n(arr, 0, 3, 0, 4).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
        let err = LogicalArray::linear_search_n(arr, 0, 3, 0, 4).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));

        // 7 words are three and a half pairs
        let err = LogicalArray::binary_search_n(arr, 2, 100, 0, 7).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::StrideMismatch { len: 7, stride: 2 }
        ));
        let err = LogicalArray::binary_search_upper_bound_n(arr, 2, 100, 0, 7).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StrideMismatch { .. }));

        let err = LogicalArray::binary_search_n(arr, 2, 3, 0, 8).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));

        assert_eq!(
            LogicalArray::binary_search_n(arr, 2, 100, 1, 7).unwrap(),
            SearchResult::NotFound(7)
        );
    }
}
